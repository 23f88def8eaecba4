//! Storage Error Types
//!
//! This module defines all error types that can occur during storage
//! operations.
//!
//! ## Error Categories
//!
//! ### Read Errors
//! - `OutOfBounds`: the requested record ID has not been assigned yet
//! - `Batch`: the batch file is unreadable or corrupt
//!
//! ### Backing Storage Errors
//! - `Io`: local filesystem operation failed
//! - `ObjectStore`: remote object store operation failed
//! - `AlreadyExists`: attempt to create a batch file under a path that
//!   already exists - batch IDs are unique, so this indicates a bug
//!
//! ### Write-Path Errors
//! - `Flush`: the batcher's flush failed; every producer whose record was
//!   part of the batch receives the same underlying error
//! - `BatcherClosed`: submission after the batcher shut down
//!
//! Errors propagate synchronously to the caller of `add` or `read_record`;
//! there is no retry loop in this crate. Retry policy belongs to the
//! adapter or the operator.

use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record batch error: {0}")]
    Batch(#[from] batchbroker_core::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Batch file already exists: {0}")]
    AlreadyExists(String),

    #[error("Record ID {record_id} does not exist, next record ID is {next_record_id}")]
    OutOfBounds { record_id: u64, next_record_id: u64 },

    #[error("Invalid batch file name: {0}")]
    InvalidBatchFileName(String),

    #[error("Flush failed: {0}")]
    Flush(Arc<Error>),

    #[error("Batcher is closed")]
    BatcherClosed,
}

impl Error {
    /// Whether this error means the requested record ID is not (yet)
    /// assigned. The HTTP adapter maps these to 404.
    pub fn is_out_of_bounds(&self) -> bool {
        match self {
            Error::OutOfBounds { .. } => true,
            Error::Batch(batchbroker_core::Error::OutOfBounds { .. }) => true,
            _ => false,
        }
    }
}
