use std::sync::Arc;

use sigrelay_cortex::{
    HashEmbeddingClient, LookupOutcome, SemanticCache, SimilarityThresholds, SledCacheRepository,
    StandardSemanticCache,
};

fn open(path: &std::path::Path) -> StandardSemanticCache {
    StandardSemanticCache::new(
        Arc::new(HashEmbeddingClient::default()),
        Arc::new(SledCacheRepository::open(path).unwrap()),
    )
}

#[tokio::test]
async fn test_cache_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let cache = open(dir.path());
        cache.store("show disk usage", "df -h", "reports free space").await.unwrap()
    };

    let cache = open(dir.path());
    assert_eq!(cache.count().await.unwrap(), 1);
    match cache.lookup("show disk usage").await.unwrap() {
        LookupOutcome::Hit { id: hit, command, explanation, similarity } => {
            assert_eq!(hit, id);
            assert_eq!(command, "df -h");
            assert_eq!(explanation, "reports free space");
            assert!(similarity >= 0.99);
        }
        other => panic!("expected hit, got {:?}", other),
    }
    assert!(cache.record_hit(id).await.unwrap());
}

#[tokio::test]
async fn test_unrelated_request_misses_with_strict_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open(dir.path()).with_thresholds(SimilarityThresholds::new(0.999, 0.998).unwrap());
    cache.store("show disk usage", "df -h", "").await.unwrap();
    assert_eq!(cache.lookup("reboot the machine").await.unwrap(), LookupOutcome::Miss);
}

#[tokio::test]
async fn test_cleanup_keeps_recent_entries() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open(dir.path());
    cache.store("list files", "ls", "").await.unwrap();
    cache.store("show processes", "ps aux", "").await.unwrap();
    assert_eq!(cache.cleanup_older_than(30).await.unwrap(), 0);
    assert_eq!(cache.count().await.unwrap(), 2);
}
