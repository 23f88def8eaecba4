//! Topic storage tests over the local-disk backing.

use std::sync::Arc;

use bytes::Bytes;
use rand::Rng;

use batchbroker_storage::{
    BatcherConfig, BlockingBatcher, DiskStorage, Error, TopicStorage,
};

const ROOT_DIR: &str = "data";
const TOPIC: &str = "my-topic";

async fn open_topic(dir: &std::path::Path) -> Arc<TopicStorage> {
    let backing = Arc::new(DiskStorage::new(dir));
    Arc::new(TopicStorage::new(backing, ROOT_DIR, TOPIC).await.unwrap())
}

fn make_random_records(count: usize) -> Vec<Bytes> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1..=64);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            Bytes::from(payload)
        })
        .collect()
}

// Reading from an empty topic yields out-of-bounds.
#[tokio::test]
async fn test_empty_topic_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    let err = storage.read_record(0).await.unwrap_err();
    assert!(err.is_out_of_bounds());
}

// All records of a single batch can be read back; reads past the end
// yield out-of-bounds.
#[tokio::test]
async fn test_single_batch_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    let records: Vec<Bytes> = (0..5u8).map(|i| Bytes::from(vec![i])).collect();
    storage.add_record_batch(&records).await.unwrap();

    for (record_id, record) in records.iter().enumerate() {
        let got = storage.read_record(record_id as u64).await.unwrap();
        assert_eq!(&got, record);
    }

    assert!(storage.read_record(5).await.unwrap_err().is_out_of_bounds());
    assert!(storage.read_record(10).await.unwrap_err().is_out_of_bounds());
}

// Batch files are named by the ID of their first record, zero-padded to
// 12 digits; record IDs span batches contiguously.
#[tokio::test]
async fn test_two_batches_ids_and_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    let batch1 = make_random_records(5);
    let batch2 = make_random_records(3);
    storage.add_record_batch(&batch1).await.unwrap();
    storage.add_record_batch(&batch2).await.unwrap();

    let topic_dir = dir.path().join(ROOT_DIR).join(TOPIC);
    assert!(topic_dir.join("000000000000.record-batch").exists());
    assert!(topic_dir.join("000000000005.record-batch").exists());

    for (record_id, record) in batch1.iter().chain(batch2.iter()).enumerate() {
        let got = storage.read_record(record_id as u64).await.unwrap();
        assert_eq!(&got, record, "mismatch at record ID {}", record_id);
    }

    // Last record of the second batch.
    assert_eq!(storage.read_record(7).await.unwrap(), batch2[2]);
    assert!(storage.read_record(8).await.unwrap_err().is_out_of_bounds());
}

// A coordinator opened over a directory populated by another coordinator
// yields identical reads for every valid record ID.
#[tokio::test]
async fn test_reopen_existing_storage() {
    let dir = tempfile::tempdir().unwrap();

    let mut rng = rand::thread_rng();
    let batches: Vec<Vec<Bytes>> = (0..50)
        .map(|_| make_random_records(rng.gen_range(1..=5)))
        .collect();
    let total_records: usize = batches.iter().map(|b| b.len()).sum();

    {
        let storage = open_topic(dir.path()).await;
        for batch in &batches {
            storage.add_record_batch(batch).await.unwrap();
        }
    }

    let reopened = open_topic(dir.path()).await;
    assert_eq!(reopened.next_record_id().await, total_records as u64);

    let mut record_id = 0u64;
    for batch in &batches {
        for record in batch {
            let got = reopened.read_record(record_id).await.unwrap();
            assert_eq!(&got, record, "mismatch at record ID {}", record_id);
            record_id += 1;
        }
    }

    assert!(reopened
        .read_record(total_records as u64)
        .await
        .unwrap_err()
        .is_out_of_bounds());
    assert!(reopened
        .read_record(total_records as u64 + 1)
        .await
        .unwrap_err()
        .is_out_of_bounds());
}

// Repeated reads of the same record ID return identical bytes.
#[tokio::test]
async fn test_idempotent_reads() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    let records = make_random_records(4);
    storage.add_record_batch(&records).await.unwrap();

    for _ in 0..3 {
        for (record_id, record) in records.iter().enumerate() {
            assert_eq!(&storage.read_record(record_id as u64).await.unwrap(), record);
        }
    }
}

// Zero-length records survive the round trip.
#[tokio::test]
async fn test_empty_records_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    let records = vec![Bytes::new(), Bytes::from("x"), Bytes::new()];
    storage.add_record_batch(&records).await.unwrap();

    assert!(storage.read_record(0).await.unwrap().is_empty());
    assert_eq!(storage.read_record(1).await.unwrap(), Bytes::from("x"));
    assert!(storage.read_record(2).await.unwrap().is_empty());
}

// An empty batch writes a valid zero-record file but assigns no record
// IDs and advances no state.
#[tokio::test]
async fn test_empty_batch_is_inert() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    storage.add_record_batch(&[]).await.unwrap();

    assert_eq!(storage.next_record_id().await, 0);
    assert!(storage.read_record(0).await.unwrap_err().is_out_of_bounds());
    assert!(dir
        .path()
        .join(ROOT_DIR)
        .join(TOPIC)
        .join("000000000000.record-batch")
        .exists());
}

// A failed write leaves the in-memory state untouched.
#[tokio::test]
async fn test_failed_write_does_not_advance_state() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    storage.add_record_batch(&make_random_records(3)).await.unwrap();

    // Force a writer collision by pre-creating the next batch file.
    let topic_dir = dir.path().join(ROOT_DIR).join(TOPIC);
    std::fs::write(topic_dir.join("000000000003.record-batch"), b"junk").unwrap();

    let err = storage
        .add_record_batch(&make_random_records(2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    assert_eq!(storage.next_record_id().await, 3);
    assert!(storage.read_record(3).await.unwrap_err().is_out_of_bounds());
}

// K producers each add one record through the batcher: exactly K records
// are persisted, each exactly once, with IDs {0, .., K-1}.
#[tokio::test]
async fn test_concurrent_producers_through_batcher() {
    const PRODUCERS: usize = 100;

    let dir = tempfile::tempdir().unwrap();
    let storage = open_topic(dir.path()).await;

    let flush_storage = storage.clone();
    let batcher = BlockingBatcher::new(
        BatcherConfig {
            window_deadline: std::time::Duration::from_millis(50),
            window_hard_limit: std::time::Duration::from_secs(10),
        },
        move |records| {
            let storage = flush_storage.clone();
            async move { storage.add_record_batch(&records).await }
        },
    );

    let tasks: Vec<_> = (0..PRODUCERS)
        .map(|i| {
            let batcher = batcher.clone();
            tokio::spawn(async move { batcher.add(Bytes::from(format!("record-{}", i))).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(storage.next_record_id().await, PRODUCERS as u64);

    let mut seen = std::collections::HashSet::new();
    for record_id in 0..PRODUCERS as u64 {
        let record = storage.read_record(record_id).await.unwrap();
        assert!(seen.insert(record), "duplicate record at ID {}", record_id);
    }
    assert_eq!(seen.len(), PRODUCERS);

    assert!(storage
        .read_record(PRODUCERS as u64)
        .await
        .unwrap_err()
        .is_out_of_bounds());
}
