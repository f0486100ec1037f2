//! Result cache and rotation ledger over an injected [`KvStore`].
//!
//! Both are advisory: a read failure is a miss, a write failure is logged and
//! ignored. Concurrent cycles for the same user may race; last write wins.

use crate::recommend::ContributionPick;
use chrono::{DateTime, Utc};
use repopicks_state::KvStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CACHE_PREFIX: &str = "contribution-picks";
const LEDGER_PREFIX: &str = "contribution-picks-shown";

/// Cache key for the picks computed for `(identity, handle)`.
pub fn cache_key(identity: &str, handle: &str) -> String {
    format!("{CACHE_PREFIX}:{identity}:{}", handle.to_lowercase())
}

/// Ledger key for the names shown to `(identity, handle)`.
pub fn ledger_key(identity: &str, handle: &str) -> String {
    format!("{LEDGER_PREFIX}:{identity}:{}", handle.to_lowercase())
}

/// A stored list of picks and when it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPicks {
    pub computed_at: DateTime<Utc>,
    pub picks: Vec<ContributionPick>,
}

/// One previously shown repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub full_name: String,
    pub shown_at: DateTime<Utc>,
}

/// Append `names` shown at `shown_at`. A re-shown name moves to the end;
/// the oldest entries are dropped beyond `cap`.
pub fn append_shown<'a, I>(
    entries: &mut Vec<LedgerEntry>,
    names: I,
    shown_at: DateTime<Utc>,
    cap: usize,
) where
    I: IntoIterator<Item = &'a str>,
{
    for name in names {
        entries.retain(|e| e.full_name != name);
        entries.push(LedgerEntry {
            full_name: name.to_string(),
            shown_at,
        });
    }
    if entries.len() > cap {
        let overflow = entries.len() - cap;
        entries.drain(..overflow);
    }
}

/// Cached picks still worth returning on a normal request.
///
/// Without a ledger the cached list is returned unchanged. Otherwise picks
/// recorded by a cycle older than the cache entry are removed, and the
/// remainder is returned only when at least `min_remaining` survive.
pub fn filter_cached(
    cached: &CachedPicks,
    ledger: Option<&[LedgerEntry]>,
    min_remaining: usize,
    limit: usize,
) -> Option<Vec<ContributionPick>> {
    let Some(ledger) = ledger else {
        return Some(cached.picks.iter().take(limit).cloned().collect());
    };
    let stale: HashSet<&str> = ledger
        .iter()
        .filter(|e| e.shown_at < cached.computed_at)
        .map(|e| e.full_name.as_str())
        .collect();
    let fresh: Vec<ContributionPick> = cached
        .picks
        .iter()
        .filter(|p| !stale.contains(p.full_name()))
        .cloned()
        .collect();
    if fresh.len() >= min_remaining {
        Some(fresh.into_iter().take(limit).collect())
    } else {
        None
    }
}

/// Computed picks per `(identity, handle)`.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn load(&self, key: &str) -> Option<CachedPicks> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "result cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "result cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable result cache entry");
                None
            }
        }
    }

    pub async fn save(&self, key: &str, cached: &CachedPicks) {
        let raw = match serde_json::to_string(cached) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to encode result cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, raw, self.ttl).await {
            warn!(key, error = %e, "result cache write failed");
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "result cache invalidation failed");
        }
    }
}

/// Rolling record of names shown per `(identity, handle)`.
#[derive(Clone)]
pub struct RotationLedger {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    cap: usize,
}

impl RotationLedger {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration, cap: usize) -> Self {
        Self { store, ttl, cap }
    }

    /// `None` when no ledger exists (or it cannot be read).
    pub async fn load(&self, key: &str) -> Option<Vec<LedgerEntry>> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!(key, error = %e, "discarding unreadable rotation ledger");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "rotation ledger read failed");
                None
            }
        }
    }

    /// Append `names` to the stored ledger and write it back.
    pub async fn record<'a, I>(&self, key: &str, names: I, shown_at: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entries = self.load(key).await.unwrap_or_default();
        append_shown(&mut entries, names, shown_at, self.cap);
        let raw = match serde_json::to_string(&entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to encode rotation ledger");
                return;
            }
        };
        if let Err(e) = self.store.set(key, raw, self.ttl).await {
            warn!(key, error = %e, "rotation ledger write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::fallback_pick;
    use crate::test_support::repo;
    use chrono::Duration as ChronoDuration;
    use repopicks_state::MemoryKvStore;

    fn picks(names: &[&str]) -> Vec<ContributionPick> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| fallback_pick(&repo(i as u64 + 1, n, Some("Rust"), 1_000, 1)))
            .collect()
    }

    fn entry(name: &str, shown_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            full_name: name.into(),
            shown_at,
        }
    }

    #[test]
    fn test_keys_are_namespaced_and_case_folded() {
        assert_eq!(cache_key("u1", "Octo"), "contribution-picks:u1:octo");
        assert_eq!(
            ledger_key("guest:octo", "octo"),
            "contribution-picks-shown:guest:octo:octo"
        );
    }

    #[test]
    fn test_append_moves_reshown_names_and_caps() {
        let t0 = Utc::now();
        let t1 = t0 + ChronoDuration::minutes(1);
        let mut entries = vec![entry("a/a", t0), entry("b/b", t0), entry("c/c", t0)];

        append_shown(&mut entries, ["a/a", "d/d"], t1, 3);

        let names: Vec<&str> = entries.iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(names, vec!["c/c", "a/a", "d/d"]);
        assert_eq!(entries[1].shown_at, t1);
    }

    #[test]
    fn test_filter_without_ledger_returns_cache_as_is() {
        let cached = CachedPicks {
            computed_at: Utc::now(),
            picks: picks(&["a/a", "b/b"]),
        };
        let out = filter_cached(&cached, None, 5, 10).unwrap();
        assert_eq!(out, cached.picks);
    }

    #[test]
    fn test_filter_keeps_entries_recorded_by_the_cached_cycle() {
        let computed_at = Utc::now();
        let cached = CachedPicks {
            computed_at,
            picks: picks(&["a/a", "b/b", "c/c", "d/d", "e/e", "f/f"]),
        };
        let ledger: Vec<LedgerEntry> = cached
            .picks
            .iter()
            .map(|p| entry(p.full_name(), computed_at))
            .collect();

        let out = filter_cached(&cached, Some(&ledger), 5, 10).unwrap();
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn test_filter_drops_older_shown_and_requires_minimum() {
        let computed_at = Utc::now();
        let earlier = computed_at - ChronoDuration::hours(3);
        let cached = CachedPicks {
            computed_at,
            picks: picks(&["a/a", "b/b", "c/c", "d/d", "e/e", "f/f"]),
        };

        let one_old = vec![entry("a/a", earlier)];
        let out = filter_cached(&cached, Some(&one_old), 5, 10).unwrap();
        assert!(out.iter().all(|p| p.full_name() != "a/a"));
        assert_eq!(out.len(), 5);

        let two_old = vec![entry("a/a", earlier), entry("b/b", earlier)];
        assert!(filter_cached(&cached, Some(&two_old), 5, 10).is_none());
    }

    #[tokio::test]
    async fn test_cache_round_trip_and_invalidate() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let cache = ResultCache::new(store, Duration::from_secs(60));
        let cached = CachedPicks {
            computed_at: Utc::now(),
            picks: picks(&["a/a"]),
        };

        cache.save("k", &cached).await;
        assert_eq!(cache.load("k").await, Some(cached));
        cache.invalidate("k").await;
        assert!(cache.load("k").await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_entries_are_misses() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .set("k", "not json".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let shared: Arc<dyn KvStore> = store;
        assert!(ResultCache::new(shared.clone(), Duration::from_secs(60))
            .load("k")
            .await
            .is_none());
        assert!(RotationLedger::new(shared, Duration::from_secs(60), 50)
            .load("k")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_ledger_record_accumulates_across_cycles() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let ledger = RotationLedger::new(store, Duration::from_secs(60), 50);
        let t0 = Utc::now();

        assert!(ledger.load("l").await.is_none());
        ledger.record("l", ["a/a", "b/b"], t0).await;
        ledger
            .record("l", ["c/c"], t0 + ChronoDuration::seconds(5))
            .await;

        let entries = ledger.load("l").await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].full_name, "c/c");
    }
}
