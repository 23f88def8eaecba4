//! Blocking Batcher
//!
//! [`BlockingBatcher`] coalesces single-record submissions from many
//! concurrent producers into one bulk flush per *batching window*.
//!
//! ## How it works
//!
//! A single flusher task owns a queue of pending submissions. A window
//! opens when the first submission arrives while the batcher is idle and
//! closes when the window deadline elapses - or, independently, when the
//! hard limit elapses, which caps the window even if the deadline is
//! misconfigured to something longer. The accumulated records are then
//! handed to the flush callback as one ordered batch, and every producer
//! that contributed a record is released with the flush outcome.
//!
//! ```text
//! Idle -> Accumulating -> Flushing -> Idle
//! ```
//!
//! Submissions that arrive while a flush is in progress stay queued and
//! join the next window. Flushes never overlap, so the storage write path
//! below sees a single-writer discipline.
//!
//! ## Usage
//!
//! ```ignore
//! let batcher = BlockingBatcher::new(BatcherConfig::default(), move |records| {
//!     let storage = storage.clone();
//!     async move { storage.add_record_batch(&records).await }
//! });
//!
//! // Blocks until the record's batch has been flushed.
//! batcher.add(Bytes::from("payload")).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Bounds on the batching window.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Nominal duration of a batching window, measured from the first
    /// submission of the window (default: 2s).
    pub window_deadline: Duration,

    /// Upper bound on the window independent of the nominal deadline
    /// (default: 10s).
    pub window_hard_limit: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            window_deadline: Duration::from_secs(2),
            window_hard_limit: Duration::from_secs(10),
        }
    }
}

struct Submission {
    record: Bytes,
    done: oneshot::Sender<std::result::Result<(), Arc<Error>>>,
}

/// Coalesces concurrent single-record submissions into bulk flushes.
///
/// Cloning is cheap; all clones feed the same flusher task. The task exits
/// once every clone has been dropped, after flushing what it has.
#[derive(Clone)]
pub struct BlockingBatcher {
    tx: mpsc::UnboundedSender<Submission>,
}

impl BlockingBatcher {
    /// Spawn the flusher task. `flush` receives each window's records in
    /// arrival order and is never invoked concurrently with itself.
    pub fn new<F, Fut>(config: BatcherConfig, flush: F) -> Self
    where
        F: Fn(Vec<Bytes>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(config, rx, flush));
        Self { tx }
    }

    /// Submit one record, blocking until the batch containing it has been
    /// flushed. Every producer whose record was part of the same batch
    /// receives the same flush outcome.
    pub async fn add(&self, record: Bytes) -> Result<()> {
        let (done, outcome) = oneshot::channel();

        self.tx
            .send(Submission { record, done })
            .map_err(|_| Error::BatcherClosed)?;

        match outcome.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Error::Flush(err)),
            Err(_) => Err(Error::BatcherClosed),
        }
    }
}

async fn run<F, Fut>(config: BatcherConfig, mut rx: mpsc::UnboundedReceiver<Submission>, flush: F)
where
    F: Fn(Vec<Bytes>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    // Idle until the first submission of a window arrives.
    while let Some(first) = rx.recv().await {
        let mut records = vec![first.record];
        let mut waiters = vec![first.done];

        let deadline = time::sleep(config.window_deadline);
        let hard_limit = time::sleep(config.window_hard_limit);
        tokio::pin!(deadline, hard_limit);

        // Accumulate until the window closes or every producer handle is gone.
        loop {
            tokio::select! {
                submission = rx.recv() => match submission {
                    Some(submission) => {
                        records.push(submission.record);
                        waiters.push(submission.done);
                    }
                    None => break,
                },
                _ = &mut deadline => break,
                _ = &mut hard_limit => break,
            }
        }

        debug!(records = records.len(), "batch window closed, flushing");

        let outcome = flush(records).await.map_err(Arc::new);
        if let Err(err) = &outcome {
            warn!(error = %err, waiters = waiters.len(), "flush failed");
        }

        for done in waiters {
            let _ = done.send(outcome.clone());
        }
    }
}
