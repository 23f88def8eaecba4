//! Topic Storage Coordinator
//!
//! [`TopicStorage`] owns the write and read paths for a single topic. It
//! assigns monotonic record IDs, names batch files, locates the batch that
//! contains a given record, and drives the record-batch codec through a
//! [`BackingStorage`].
//!
//! ## State
//!
//! Per topic the coordinator tracks the sorted list of batch IDs (each
//! batch ID equals the record ID of the first record in that batch) and
//! `next_record_id`, the ID the next persisted record will receive. Batch
//! files are named after their ID, so both are rebuilt at startup from the
//! file listing plus the newest batch's header - there is no separate
//! metadata store.
//!
//! ## Concurrency
//!
//! `add_record_batch` must not run concurrently with itself; the batcher
//! already serializes writes, so the coordinator assumes a single-writer
//! discipline. Readers run concurrently with each other and with the
//! writer: they snapshot the state under a read lock and do all I/O outside
//! it, and the writer publishes `{batch_ids, next_record_id}` under the
//! write lock only after the batch file has been durably committed. A
//! reader therefore never observes a record ID whose batch is not yet
//! readable.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, info};

use batchbroker_core::batch::{self, Header, RecordBatch};

use crate::backend::BackingStorage;
use crate::error::{Error, Result};

/// File name suffix for record-batch files
pub const BATCH_FILE_EXTENSION: &str = ".record-batch";

/// Storage coordinator for a single topic.
pub struct TopicStorage {
    backing: Arc<dyn BackingStorage>,
    topic_path: String,
    state: RwLock<TopicState>,
}

#[derive(Debug, Default)]
struct TopicState {
    /// Batch IDs, sorted ascending. Each equals the record ID of the
    /// batch's first record.
    batch_ids: Vec<u64>,

    /// The ID the next persisted record will be assigned.
    next_record_id: u64,
}

impl TopicStorage {
    /// Open the topic under `root_dir`/`topic`, rebuilding in-memory state
    /// from the batch file listing and the newest batch's header.
    pub async fn new(
        backing: Arc<dyn BackingStorage>,
        root_dir: &str,
        topic: &str,
    ) -> Result<Self> {
        let topic_path = join_topic_path(root_dir, topic);

        let mut batch_ids = list_batch_ids(backing.as_ref(), &topic_path).await?;
        batch_ids.sort_unstable();

        let mut next_record_id = 0;
        if let Some(&newest) = batch_ids.last() {
            let header =
                read_batch_header(backing.as_ref(), &batch_file_path(&topic_path, newest)).await?;
            next_record_id = newest + u64::from(header.num_records);
        }

        info!(
            topic_path,
            batches = batch_ids.len(),
            next_record_id,
            "opened topic storage"
        );

        Ok(Self {
            backing,
            topic_path,
            state: RwLock::new(TopicState {
                batch_ids,
                next_record_id,
            }),
        })
    }

    /// Persist `records` as one batch file.
    ///
    /// Must not be called concurrently with itself; the blocking batcher
    /// serializes flushes. On any failure the in-memory state is left
    /// untouched and the records are considered not persisted. An empty
    /// slice writes a valid zero-record file that carries no records and
    /// does not advance any state; callers are expected to avoid it.
    pub async fn add_record_batch(&self, records: &[Bytes]) -> Result<()> {
        let batch_id = self.state.read().await.next_record_id;
        let path = batch_file_path(&self.topic_path, batch_id);

        let mut sink = self.backing.writer(&path).await?;
        batch::write(&mut sink, records).await?;
        sink.commit().await?;

        if records.is_empty() {
            debug!(path, "committed zero-record batch file");
            return Ok(());
        }

        let mut state = self.state.write().await;
        state.batch_ids.push(batch_id);
        state.next_record_id = batch_id + records.len() as u64;

        debug!(
            path,
            batch_id,
            records = records.len(),
            next_record_id = state.next_record_id,
            "committed record batch"
        );

        Ok(())
    }

    /// Read the record with the given ID.
    pub async fn read_record(&self, record_id: u64) -> Result<Bytes> {
        let batch_id = {
            let state = self.state.read().await;

            if record_id >= state.next_record_id {
                return Err(Error::OutOfBounds {
                    record_id,
                    next_record_id: state.next_record_id,
                });
            }

            // The record lives in the batch with the greatest ID <= record_id.
            let pos = state.batch_ids.partition_point(|&id| id <= record_id);
            if pos == 0 {
                return Err(Error::OutOfBounds {
                    record_id,
                    next_record_id: state.next_record_id,
                });
            }
            state.batch_ids[pos - 1]
        };

        let path = batch_file_path(&self.topic_path, batch_id);
        let rdr = self.backing.reader(&path).await?;
        let mut batch = RecordBatch::parse(rdr).await?;

        let record = batch.record((record_id - batch_id) as u32).await?;
        Ok(record)
    }

    /// The ID that will be assigned to the next persisted record.
    pub async fn next_record_id(&self) -> u64 {
        self.state.read().await.next_record_id
    }
}

fn join_topic_path(root_dir: &str, topic: &str) -> String {
    let root = root_dir.trim_matches('/');
    if root.is_empty() {
        topic.to_string()
    } else {
        format!("{}/{}", root, topic)
    }
}

fn batch_file_path(topic_path: &str, batch_id: u64) -> String {
    format!("{}/{:012}{}", topic_path, batch_id, BATCH_FILE_EXTENSION)
}

async fn list_batch_ids(backing: &dyn BackingStorage, topic_path: &str) -> Result<Vec<u64>> {
    let paths = backing.list_files(topic_path, BATCH_FILE_EXTENSION).await?;

    let mut batch_ids = Vec::with_capacity(paths.len());
    for path in paths {
        let leaf = path.rsplit('/').next().unwrap_or(&path);
        let id = leaf
            .strip_suffix(BATCH_FILE_EXTENSION)
            .and_then(|stem| stem.parse::<u64>().ok())
            .ok_or_else(|| Error::InvalidBatchFileName(path.clone()))?;
        batch_ids.push(id);
    }

    Ok(batch_ids)
}

async fn read_batch_header(backing: &dyn BackingStorage, path: &str) -> Result<Header> {
    let rdr = backing.reader(path).await?;
    let batch = RecordBatch::parse(rdr).await?;
    Ok(batch.header().clone())
}
