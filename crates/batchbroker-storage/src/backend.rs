//! Backing Storage Abstraction
//!
//! The capability set the topic coordinator consumes: open a batch file for
//! writing, open one for reading, list committed batch files. Two
//! implementations exist: [`crate::DiskStorage`] maps paths straight onto a
//! local directory, [`crate::CachedObjectStorage`] backs them with a remote
//! object store fronted by a local cache.
//!
//! Paths are storage-relative, `/`-separated strings; for the object-store
//! variant the path doubles as the remote key.
//!
//! Errors surface transport faults verbatim. Whether an operation is worth
//! retrying is the caller's decision; no retries happen behind this trait.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::error::Result;

/// A sink for one batch file. Bytes written are not durable until
/// `commit` succeeds; for remote-backed storage, `commit` is where the
/// upload happens. On failure the caller discards the batch.
#[async_trait]
pub trait BatchSink: AsyncWrite + Send + Unpin {
    /// Durably commit everything written so far and release the sink.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// A seekable reader over a previously committed batch file, positioned at
/// offset 0.
pub trait BatchSource: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> BatchSource for T {}

/// Durable byte storage for batch files.
#[async_trait]
pub trait BackingStorage: Send + Sync + 'static {
    /// Open a new batch file for writing under `path`.
    ///
    /// Fails if a batch file already exists under `path`; batch IDs are
    /// unique, so a collision indicates a bug in the caller.
    async fn writer(&self, path: &str) -> Result<Box<dyn BatchSink>>;

    /// Open the batch file committed under `path` for reading.
    async fn reader(&self, path: &str) -> Result<Box<dyn BatchSource>>;

    /// List committed paths under `topic_path` whose name ends with
    /// `extension`. Order is unspecified; callers sort.
    async fn list_files(&self, topic_path: &str, extension: &str) -> Result<Vec<String>>;
}
