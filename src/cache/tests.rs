use super::{
    CacheStore, Clock, DirectoryStore, FingerprintCache, ManualClock, MemoryStore, StoredEntry,
    fingerprint,
};
use crate::config::CacheSettings;
use crate::error::CacheError;
use crate::file_record::FileRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const MIB: usize = 1024 * 1024;
const START: i64 = 1_700_000_000_000;

fn file(n: usize) -> FileRecord {
    FileRecord::new(format!("archivo_{n}.png"), "image/png", format!("contenido-{n}").into_bytes())
}

fn cache_with_clock(settings: &CacheSettings) -> (FingerprintCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let cache = FingerprintCache::in_memory(settings).with_clock(clock.clone());
    (cache, clock)
}

#[tokio::test]
async fn entry_count_is_capped_keeping_newest() {
    let (cache, clock) = cache_with_clock(&CacheSettings::default());

    for n in 0..150 {
        cache.set(&file(n), &[n as u8]).await;
        clock.advance(Duration::from_millis(1));
    }

    let stats = cache.stats().await;
    assert_eq!(stats.entry_count, 100);
    assert_eq!(stats.total_bytes, 100);

    for n in 0..50 {
        assert_eq!(cache.get(&file(n)).await, None, "la entrada {n} debió expulsarse");
    }
    for n in 50..150 {
        assert_eq!(cache.get(&file(n)).await, Some(vec![n as u8]));
    }
}

#[tokio::test]
async fn stored_bytes_are_capped_keeping_newest() {
    let (cache, clock) = cache_with_clock(&CacheSettings::default());
    let payload = vec![0xAB; 5 * MIB];

    for n in 0..16 {
        cache.set(&file(n), &payload).await;
        clock.advance(Duration::from_millis(1));
    }

    let stats = cache.stats().await;
    assert!(stats.total_bytes <= 50 * MIB as u64);
    assert_eq!(stats.entry_count, 10);

    assert_eq!(cache.get(&file(5)).await, None);
    assert_eq!(cache.get(&file(6)).await.map(|data| data.len()), Some(5 * MIB));
    assert!(cache.get(&file(15)).await.is_some());
}

#[tokio::test]
async fn expired_entry_is_a_miss_and_is_removed() {
    let (cache, clock) = cache_with_clock(&CacheSettings::default());
    cache.set(&file(1), b"limpio").await;

    clock.advance(Duration::from_secs(23 * 60 * 60));
    assert_eq!(cache.get(&file(1)).await, Some(b"limpio".to_vec()));

    clock.advance(Duration::from_secs(2 * 60 * 60));
    assert_eq!(cache.get(&file(1)).await, None);
    assert_eq!(cache.stats().await.entry_count, 0);
}

#[tokio::test]
async fn reads_do_not_refresh_write_time() {
    let settings = CacheSettings {
        max_entries: 2,
        ..CacheSettings::default()
    };
    let (cache, clock) = cache_with_clock(&settings);

    cache.set(&file(1), b"a").await;
    clock.advance(Duration::from_millis(5));
    cache.set(&file(2), b"b").await;
    clock.advance(Duration::from_millis(5));

    assert!(cache.get(&file(1)).await.is_some());
    cache.set(&file(3), b"c").await;

    assert_eq!(cache.get(&file(1)).await, None);
    assert!(cache.get(&file(2)).await.is_some());
    assert!(cache.get(&file(3)).await.is_some());
}

#[tokio::test]
async fn overwrite_replaces_entry_without_double_counting() {
    let settings = CacheSettings {
        max_entries: 2,
        ..CacheSettings::default()
    };
    let (cache, clock) = cache_with_clock(&settings);

    cache.set(&file(1), b"uno").await;
    clock.advance(Duration::from_millis(1));
    cache.set(&file(2), b"dos").await;
    clock.advance(Duration::from_millis(1));
    cache.set(&file(2), b"dos-bis").await;

    let stats = cache.stats().await;
    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.total_bytes, 10);
    assert_eq!(cache.get(&file(1)).await, Some(b"uno".to_vec()));
    assert_eq!(cache.get(&file(2)).await, Some(b"dos-bis".to_vec()));
}

#[tokio::test]
async fn payload_larger_than_capacity_is_not_stored() {
    let settings = CacheSettings {
        max_bytes: 4,
        ..CacheSettings::default()
    };
    let (cache, _clock) = cache_with_clock(&settings);

    cache.set(&file(1), b"1234").await;
    cache.set(&file(2), b"12345").await;

    assert!(cache.get(&file(1)).await.is_some());
    assert_eq!(cache.get(&file(2)).await, None);
}

#[tokio::test]
async fn disabled_cache_never_hits() {
    let settings = CacheSettings {
        enabled: false,
        ..CacheSettings::default()
    };
    let (cache, _clock) = cache_with_clock(&settings);

    cache.set(&file(1), b"x").await;
    assert_eq!(cache.get(&file(1)).await, None);
    assert_eq!(cache.stats().await.entry_count, 0);
}

struct BrokenStore;

fn broken() -> CacheError {
    CacheError::Io(std::io::Error::other("disco no disponible"))
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<StoredEntry>, CacheError> {
        Err(broken())
    }

    async fn set(&self, _key: &str, _entry: StoredEntry) -> Result<(), CacheError> {
        Err(broken())
    }

    async fn remove(&self, _keys: &[String]) -> Result<(), CacheError> {
        Err(broken())
    }

    async fn entries(&self, _prefix: &str) -> Result<Vec<(String, StoredEntry)>, CacheError> {
        Err(broken())
    }
}

#[tokio::test]
async fn store_failures_degrade_to_miss() {
    let cache = FingerprintCache::new(Arc::new(BrokenStore), &CacheSettings::default());

    cache.set(&file(1), b"x").await;
    assert_eq!(cache.get(&file(1)).await, None);
    cache.clear().await;

    let stats = cache.stats().await;
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.max_entries, 100);
}

#[tokio::test]
async fn corrupt_payload_is_a_miss() -> Result<(), CacheError> {
    let store = Arc::new(MemoryStore::new());
    let settings = CacheSettings::default();
    let key = format!("{}:{}", settings.namespace, fingerprint(&file(1).bytes));
    store
        .set(
            &key,
            StoredEntry {
                data: "***".into(),
                timestamp: chrono::Utc::now().timestamp_millis(),
                size: 3,
            },
        )
        .await?;

    let cache = FingerprintCache::new(store, &settings);
    assert_eq!(cache.get(&file(1)).await, None);
    Ok(())
}

#[tokio::test]
async fn clear_only_touches_its_namespace() -> Result<(), CacheError> {
    let store = Arc::new(MemoryStore::new());
    let foreign = StoredEntry {
        data: String::new(),
        timestamp: 0,
        size: 0,
    };
    store.set("otra-app:ajena", foreign).await?;

    let cache = FingerprintCache::new(store.clone(), &CacheSettings::default());
    cache.set(&file(1), b"x").await;
    cache.set(&file(2), b"y").await;
    assert_eq!(cache.stats().await.entry_count, 2);

    cache.clear().await;
    assert_eq!(cache.stats().await.entry_count, 0);
    assert!(store.get("otra-app:ajena").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn directory_store_persists_between_instances() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = CacheSettings {
        directory: Some(dir.path().join("cache")),
        ..CacheSettings::default()
    };

    FingerprintCache::from_settings(&settings)
        .set(&file(7), b"persistido")
        .await;

    let reopened = FingerprintCache::from_settings(&settings);
    assert_eq!(reopened.get(&file(7)).await, Some(b"persistido".to_vec()));
    assert_eq!(reopened.stats().await.entry_count, 1);

    std::fs::write(dir.path().join("cache").join("basura.json"), b"{no es json")?;
    assert_eq!(reopened.stats().await.entry_count, 1);

    reopened.clear().await;
    assert_eq!(reopened.get(&file(7)).await, None);
    Ok(())
}

#[tokio::test]
async fn directory_store_ignores_missing_root() -> Result<(), CacheError> {
    let store = DirectoryStore::new("/nonexistent/scrubgate-cache");
    assert!(store.entries("").await?.is_empty());
    assert_eq!(store.get("k").await?, None);
    store.remove(&["k".to_string()]).await?;
    Ok(())
}

#[test]
fn manual_clock_moves_only_when_told() {
    let clock = ManualClock::new(10);
    assert_eq!(clock.now_millis(), 10);
    clock.advance(Duration::from_secs(1));
    assert_eq!(clock.now_millis(), 1010);
    clock.set(5);
    assert_eq!(clock.now_millis(), 5);
}
