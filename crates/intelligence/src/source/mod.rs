//! Candidate sourcing: bounded searches merged into one filtered pool.

use crate::config::PicksConfig;
use crate::github::{CandidateRepository, GitHubApi, SearchQuery, SearchSort};
use crate::profile::UserProfile;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

const LANGUAGE_QUERY_SIZE: u32 = 30;
const ORG_QUERY_SIZE: u32 = 30;
const BROAD_QUERY_SIZE: u32 = 50;
const KEYWORD_POINTS: u32 = 10;
const KEYWORD_SCORE_CAP: u32 = 100;

/// Search queries in merge order: per-language, allow-listed orgs, broad.
pub fn build_queries(
    profile: &UserProfile,
    config: &PicksConfig,
    now: DateTime<Utc>,
) -> Vec<SearchQuery> {
    let window_start = (now - Duration::days(i64::from(config.pushed_within_days))).date_naive();
    let recent_start = (now - Duration::days(i64::from(config.recently_active_days))).date_naive();

    let mut queries: Vec<SearchQuery> = profile
        .top_languages(config.top_languages)
        .iter()
        .map(|language| {
            SearchQuery::new()
                .language(language)
                .min_stars(config.min_stars)
                .pushed_since(window_start)
                .not_archived()
                .sort(SearchSort::Stars)
                .per_page(LANGUAGE_QUERY_SIZE)
        })
        .collect();

    if !config.org_allowlist.is_empty() {
        queries.push(
            SearchQuery::new()
                .orgs(&config.org_allowlist)
                .min_stars(config.min_stars)
                .pushed_since(recent_start)
                .not_archived()
                .sort(SearchSort::Updated)
                .per_page(ORG_QUERY_SIZE),
        );
    }

    queries.push(
        SearchQuery::new()
            .min_stars(config.min_stars_outside_allowlist)
            .pushed_since(window_start)
            .not_archived()
            .sort(SearchSort::Updated)
            .per_page(BROAD_QUERY_SIZE),
    );
    queries
}

/// Whether `repo` may enter the candidate pool.
pub fn passes_filters(
    repo: &CandidateRepository,
    exclusions: &HashSet<String>,
    config: &PicksConfig,
    now: DateTime<Utc>,
) -> bool {
    if repo.archived || exclusions.contains(&repo.full_name) {
        return false;
    }
    match repo.days_since_activity(now) {
        Some(days) if days <= i64::from(config.pushed_within_days) => {}
        _ => return false,
    }
    if repo.stargazers_count < config.min_stars {
        return false;
    }
    repo.stargazers_count >= config.min_stars_outside_allowlist
        || config.is_allowlisted(&repo.owner.login)
}

/// +10 per distinct keyword found in the lowercased name, description and
/// topics, capped at 100.
pub fn keyword_match_score(repo: &CandidateRepository, keywords: &BTreeSet<String>) -> u32 {
    if keywords.is_empty() {
        return 0;
    }
    let mut haystack = repo.name.to_lowercase();
    haystack.push(' ');
    haystack.push_str(&repo.description.as_deref().unwrap_or_default().to_lowercase());
    for topic in &repo.topics {
        haystack.push(' ');
        haystack.push_str(&topic.to_lowercase());
    }

    let hits = keywords
        .iter()
        .filter(|kw| haystack.contains(kw.to_lowercase().as_str()))
        .count() as u32;
    (hits * KEYWORD_POINTS).min(KEYWORD_SCORE_CAP)
}

/// Order the pool: keyword score then recency when keywords exist,
/// otherwise recently-active first then recency.
pub fn rank_pool(
    pool: &mut [CandidateRepository],
    keywords: &BTreeSet<String>,
    config: &PicksConfig,
    now: DateTime<Utc>,
) {
    if keywords.is_empty() {
        let recent = |r: &CandidateRepository| {
            r.days_since_activity(now)
                .is_some_and(|d| d <= i64::from(config.recently_active_days))
        };
        pool.sort_by(|a, b| {
            recent(b)
                .cmp(&recent(a))
                .then_with(|| b.last_activity().cmp(&a.last_activity()))
        });
    } else {
        pool.sort_by_cached_key(|r| {
            (
                std::cmp::Reverse(keyword_match_score(r, keywords)),
                std::cmp::Reverse(r.last_activity()),
            )
        });
    }
}

/// Issue every query concurrently and build the ranked, deduplicated pool.
///
/// A failed query contributes nothing; an empty pool is a normal outcome.
pub async fn source_candidates(
    api: &dyn GitHubApi,
    profile: &UserProfile,
    exclusions: &HashSet<String>,
    keywords: &BTreeSet<String>,
    config: &PicksConfig,
    now: DateTime<Utc>,
) -> Vec<CandidateRepository> {
    let queries = build_queries(profile, config, now);
    let results = join_all(queries.iter().map(|query| async move {
        match api.search_repositories(query).await {
            Ok(items) => {
                debug!(query = %query.query_string(), count = items.len(), "search returned");
                items
            }
            Err(e) => {
                warn!(query = %query.query_string(), error = %e, "search query failed");
                Vec::new()
            }
        }
    }))
    .await;

    let mut seen = HashSet::new();
    let mut pool: Vec<CandidateRepository> = results
        .into_iter()
        .flatten()
        .filter(|repo| seen.insert(repo.full_name.clone()))
        .filter(|repo| passes_filters(repo, exclusions, config, now))
        .collect();
    rank_pool(&mut pool, keywords, config, now);

    info!(
        queries = queries.len(),
        candidates = pool.len(),
        "sourced candidate pool"
    );
    pool
}
