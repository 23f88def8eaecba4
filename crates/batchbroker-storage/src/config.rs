//! Broker Configuration
//!
//! This module defines configuration for the storage engine.
//!
//! ## BrokerConfig
//!
//! - **bucket_name**: object-store bucket holding the batch files
//! - **local_cache_root**: directory mirroring remote batch files
//! - **root_dir**: key prefix under which topics live
//! - **topic**: topic name (one sequence of batches)
//! - **batch_window_deadline_ms**: nominal batching window (default: 2s)
//! - **batch_window_hard_limit_ms**: unconditional cap on the window
//!   (default: 10s)
//! - **s3_region** / **s3_endpoint**: object-store construction (endpoint
//!   for MinIO/localstack)
//!
//! ## Usage
//!
//! ```ignore
//! use batchbroker_storage::BrokerConfig;
//!
//! // Production config (AWS S3)
//! let config = BrokerConfig {
//!     bucket_name: "my-broker-bucket".to_string(),
//!     topic: "events".to_string(),
//!     ..Default::default()
//! };
//!
//! // Development config (MinIO)
//! let config = BrokerConfig {
//!     s3_endpoint: Some("http://localhost:9000".to_string()),
//!     batch_window_deadline_ms: 100, // faster feedback while testing
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batcher::BatcherConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Object-store bucket name
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,

    /// Local directory mirroring remote batch files
    #[serde(default = "default_local_cache_root")]
    pub local_cache_root: String,

    /// Storage key prefix under which topics live
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Topic name
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Nominal batching window in milliseconds (default: 2000)
    #[serde(default = "default_batch_window_deadline_ms")]
    pub batch_window_deadline_ms: u64,

    /// Unconditional cap on the batching window in milliseconds
    /// (default: 10000)
    #[serde(default = "default_batch_window_hard_limit_ms")]
    pub batch_window_hard_limit_ms: u64,

    /// Object-store region
    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// Optional custom object-store endpoint (for MinIO/localstack)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bucket_name: default_bucket_name(),
            local_cache_root: default_local_cache_root(),
            root_dir: default_root_dir(),
            topic: default_topic(),
            batch_window_deadline_ms: default_batch_window_deadline_ms(),
            batch_window_hard_limit_ms: default_batch_window_hard_limit_ms(),
            s3_region: default_s3_region(),
            s3_endpoint: None,
        }
    }
}

impl BrokerConfig {
    /// Get the batch window deadline as a Duration.
    pub fn batch_window_deadline(&self) -> Duration {
        Duration::from_millis(self.batch_window_deadline_ms)
    }

    /// Get the batch window hard limit as a Duration.
    pub fn batch_window_hard_limit(&self) -> Duration {
        Duration::from_millis(self.batch_window_hard_limit_ms)
    }

    /// Batcher window bounds derived from this config.
    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            window_deadline: self.batch_window_deadline(),
            window_hard_limit: self.batch_window_hard_limit(),
        }
    }
}

fn default_bucket_name() -> String {
    "batchbroker".to_string()
}

fn default_local_cache_root() -> String {
    "./data/cache".to_string()
}

fn default_root_dir() -> String {
    "data".to_string()
}

fn default_topic() -> String {
    "default".to_string()
}

fn default_batch_window_deadline_ms() -> u64 {
    2_000
}

fn default_batch_window_hard_limit_ms() -> u64 {
    10_000
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}
