//! Error Types for batchbroker
//!
//! This module defines all error types that can occur while encoding or
//! decoding record-batch files.
//!
//! ## Error Categories
//!
//! ### I/O Errors
//! - File system operations
//! - Short reads while parsing a batch file
//!
//! ### Data Integrity Errors
//! - `InvalidMagic`: Batch file doesn't start with the expected magic bytes ("smb!")
//! - `UnsupportedVersion`: Batch was written by a newer format version
//! - `InvalidBatch`: Malformed batch data
//!
//! ### Query Errors
//! - `OutOfBounds`: Requested record index doesn't exist in the batch
//!
//! ## Usage
//! All functions in batchbroker-core return `Result<T>` which is aliased to
//! `Result<T, Error>`. This allows using `?` operator for error propagation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(i16),

    #[error("{count} records available, record index {index} does not exist")]
    OutOfBounds { index: u32, count: u32 },

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
