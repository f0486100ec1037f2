use repopicks_state::{FileKvStore, KvStore, MemoryKvStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

async fn exercise(store: Arc<dyn KvStore>) {
    let ttl = Duration::from_secs(600);
    store
        .set("contribution-picks:u1:octo", "[]".into(), ttl)
        .await
        .unwrap();
    store
        .set("contribution-picks-shown:u1:octo", "[\"a/b\"]".into(), ttl)
        .await
        .unwrap();

    assert_eq!(
        store.get("contribution-picks:u1:octo").await.unwrap().as_deref(),
        Some("[]")
    );
    store.delete("contribution-picks:u1:octo").await.unwrap();
    store.delete("never-written").await.unwrap();
    assert!(store.get("contribution-picks:u1:octo").await.unwrap().is_none());
    assert!(store
        .get("contribution-picks-shown:u1:octo")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn memory_and_file_stores_behave_alike() {
    exercise(Arc::new(MemoryKvStore::new())).await;

    let tmp = tempdir().unwrap();
    exercise(Arc::new(FileKvStore::new(tmp.path().join("cache.json")))).await;
}

#[tokio::test]
async fn file_store_reopens_with_live_entries_only() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("cache.json");
    {
        let store = FileKvStore::new(&path);
        store
            .set("live", "1".into(), Duration::from_secs(600))
            .await
            .unwrap();
        store.set("dead", "2".into(), Duration::ZERO).await.unwrap();
    }

    let reopened = FileKvStore::new(&path);
    assert_eq!(reopened.get("live").await.unwrap().as_deref(), Some("1"));
    assert!(reopened.get("dead").await.unwrap().is_none());
}
