//! Cached object storage tests over an in-memory object store.

use std::sync::Arc;

use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use batchbroker_storage::{BackingStorage, CachedObjectStorage, Error, TopicStorage};

fn setup() -> (Arc<InMemory>, CachedObjectStorage, tempfile::TempDir) {
    let remote = Arc::new(InMemory::new());
    let cache_dir = tempfile::tempdir().unwrap();
    let storage = CachedObjectStorage::new(remote.clone(), cache_dir.path());
    (remote, storage, cache_dir)
}

async fn read_all(storage: &CachedObjectStorage, path: &str) -> Vec<u8> {
    let mut rdr = storage.reader(path).await.unwrap();
    let mut buf = Vec::new();
    rdr.read_to_end(&mut buf).await.unwrap();
    buf
}

// Committing a writer uploads the file to the remote store and leaves a
// cache copy behind.
#[tokio::test]
async fn test_commit_uploads_and_caches() {
    let (remote, storage, cache_dir) = setup();

    let path = "t/000000000000.record-batch";
    let mut sink = storage.writer(path).await.unwrap();
    sink.write_all(b"batch contents").await.unwrap();
    sink.commit().await.unwrap();

    let uploaded = remote
        .get(&ObjectPath::from(path))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(uploaded, Bytes::from_static(b"batch contents"));

    let cached = std::fs::read(cache_dir.path().join(path)).unwrap();
    assert_eq!(cached, b"batch contents");
}

// The batch ID is supposed to be unique: a second writer for the same
// path fails.
#[tokio::test]
async fn test_writer_duplicate_path_fails() {
    let (_remote, storage, _cache_dir) = setup();

    let path = "t/000000000000.record-batch";
    let mut sink = storage.writer(path).await.unwrap();
    sink.write_all(b"x").await.unwrap();
    sink.commit().await.unwrap();

    let err = match storage.writer(path).await {
        Err(e) => e,
        Ok(_) => panic!("expected writer() to fail for a duplicate path"),
    };
    assert!(matches!(err, Error::AlreadyExists(_)));
}

// An uncommitted writer already claims the cache path.
#[tokio::test]
async fn test_writer_duplicate_path_fails_before_commit() {
    let (_remote, storage, _cache_dir) = setup();

    let path = "t/000000000000.record-batch";
    let _sink = storage.writer(path).await.unwrap();

    let err = match storage.writer(path).await {
        Err(e) => e,
        Ok(_) => panic!("expected writer() to fail for a duplicate path"),
    };
    assert!(matches!(err, Error::AlreadyExists(_)));
}

// After the first read of an uncached key, subsequent reads are served
// from the cache: deleting the remote object does not affect them.
#[tokio::test]
async fn test_reader_promotes_to_cache() {
    let (remote, storage, cache_dir) = setup();

    let path = "t/000000000005.record-batch";
    remote
        .put(&ObjectPath::from(path), Bytes::from_static(b"remote bytes"))
        .await
        .unwrap();

    assert_eq!(read_all(&storage, path).await, b"remote bytes");
    assert!(cache_dir.path().join(path).exists());

    remote.delete(&ObjectPath::from(path)).await.unwrap();

    // Still readable, byte-identical, with no remote object left to fetch.
    assert_eq!(read_all(&storage, path).await, b"remote bytes");
}

#[tokio::test]
async fn test_reader_missing_object_fails() {
    let (_remote, storage, _cache_dir) = setup();

    assert!(storage.reader("t/missing.record-batch").await.is_err());
}

// Listing consults the remote store only: local-only cache files are not
// reported, and the extension filter applies.
#[tokio::test]
async fn test_list_files_uses_remote_only() {
    let (remote, storage, cache_dir) = setup();

    for key in ["t/000000000000.record-batch", "t/000000000007.record-batch"] {
        remote
            .put(&ObjectPath::from(key), Bytes::from_static(b"x"))
            .await
            .unwrap();
    }
    remote
        .put(&ObjectPath::from("t/manifest.json"), Bytes::from_static(b"{}"))
        .await
        .unwrap();

    // Stray local file that never made it to the remote store.
    std::fs::create_dir_all(cache_dir.path().join("t")).unwrap();
    std::fs::write(
        cache_dir.path().join("t/000000000099.record-batch"),
        b"local-only",
    )
    .unwrap();

    let mut files = storage.list_files("t", ".record-batch").await.unwrap();
    files.sort();
    assert_eq!(
        files,
        vec![
            "t/000000000000.record-batch".to_string(),
            "t/000000000007.record-batch".to_string(),
        ]
    );
}

// A coordinator with a cold cache recovers everything from the remote
// store alone.
#[tokio::test]
async fn test_cold_cache_recovery() {
    let remote: Arc<InMemory> = Arc::new(InMemory::new());

    let batches: Vec<Vec<Bytes>> = vec![
        (0..5u8).map(|i| Bytes::from(vec![i])).collect(),
        (5..8u8).map(|i| Bytes::from(vec![i])).collect(),
    ];

    {
        let cache_dir = tempfile::tempdir().unwrap();
        let backing = Arc::new(CachedObjectStorage::new(remote.clone(), cache_dir.path()));
        let storage = TopicStorage::new(backing, "data", "orders").await.unwrap();
        for batch in &batches {
            storage.add_record_batch(batch).await.unwrap();
        }
    }

    // Fresh cache directory: every byte must come from the remote store.
    let cache_dir = tempfile::tempdir().unwrap();
    let backing = Arc::new(CachedObjectStorage::new(remote, cache_dir.path()));
    let storage = TopicStorage::new(backing, "data", "orders").await.unwrap();

    assert_eq!(storage.next_record_id().await, 8);
    for (record_id, record) in batches.iter().flatten().enumerate() {
        let got = storage.read_record(record_id as u64).await.unwrap();
        assert_eq!(&got, record, "mismatch at record ID {}", record_id);
    }
    assert!(storage.read_record(8).await.unwrap_err().is_out_of_bounds());
}
