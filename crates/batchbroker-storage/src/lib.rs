//! batchbroker Storage Layer
//!
//! This crate implements the storage engine for batchbroker - everything
//! between the HTTP adapter and the bytes on disk or in S3.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐
//! │  Producers  │  (HTTP adapter calls add())
//! └──────┬──────┘
//!        │ single records
//!        ▼
//! ┌──────────────────┐
//! │ BlockingBatcher  │  Coalesces concurrent submissions into one
//! │                  │  flush per batching window
//! └────────┬─────────┘
//!          │ Vec<Bytes> per window
//!          ▼
//! ┌──────────────────┐
//! │ TopicStorage     │  Assigns monotonic record IDs, names batch
//! │                  │  files, locates the batch for a record ID
//! └────────┬─────────┘
//!          │ batch files
//!          ▼
//! ┌──────────────────┐
//! │ BackingStorage   │  DiskStorage (filesystem) or
//! │                  │  CachedObjectStorage (S3 + local cache)
//! └──────────────────┘
//! ```
//!
//! ## Main Components
//!
//! ### BlockingBatcher
//! Accepts single-record submissions from many concurrent producers and
//! hands them to a single flush callback in bulk. Every producer blocks
//! until its batch has been flushed and observes the flush outcome.
//!
//! ### TopicStorage
//! The coordinator for a single topic. Record IDs are dense from 0; each
//! batch file is named after the ID of its first record, so the file
//! listing alone is enough to rebuild the topic state at startup.
//!
//! ### DiskStorage / CachedObjectStorage
//! Two implementations of the `BackingStorage` capability set. The cached
//! variant mirrors every batch file it writes or reads into a local cache
//! directory; batch files are immutable, so a present cache entry is by
//! construction correct.

pub mod backend;
pub mod batcher;
pub mod config;
pub mod disk;
pub mod error;
pub mod remote;
pub mod topic;

pub use backend::{BackingStorage, BatchSink, BatchSource};
pub use batcher::{BatcherConfig, BlockingBatcher};
pub use config::BrokerConfig;
pub use disk::DiskStorage;
pub use error::{Error, Result};
pub use remote::CachedObjectStorage;
pub use topic::{TopicStorage, BATCH_FILE_EXTENSION};
