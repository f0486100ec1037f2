use crate::store::{KvStore, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    /// Unix seconds after which the entry is dead.
    expires_at: u64,
}

type Snapshot = HashMap<String, FileEntry>;

/// JSON-file backed store so cached picks survive across CLI runs.
///
/// Every operation reads the snapshot, mutates it, and writes it back through
/// a temporary file and a rename. Expired entries are pruned on each write.
/// The async mutex serializes access from within one process; concurrent
/// processes race with last-write-wins, which is acceptable for a cache.
pub struct FileKvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes every entry.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write_snapshot(&Snapshot::new()).await
    }

    async fn read_snapshot(&self) -> Result<Snapshot, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Snapshot::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(snapshot)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let snapshot = self.read_snapshot().await?;
        let now = unix_now();
        Ok(snapshot
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut snapshot = match self.read_snapshot().await {
            Ok(s) => s,
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cache file corrupt; starting over");
                Snapshot::new()
            }
            Err(e) => return Err(e),
        };
        let now = unix_now();
        snapshot.retain(|_, entry| entry.expires_at > now);
        snapshot.insert(
            key.to_string(),
            FileEntry {
                value,
                expires_at: now.saturating_add(ttl.as_secs()),
            },
        );
        self.write_snapshot(&snapshot).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;
        if snapshot.remove(key).is_some() {
            self.write_snapshot(&snapshot).await?;
        }
        Ok(())
    }
}
