//! batchbroker HTTP Server
//!
//! Main entry point for the batchbroker broker.
//!
//! ## Configuration
//! All configuration is done via environment variables:
//!
//! ### Server Settings
//! - `BATCHBROKER_ADDR`: Server bind address (default: 127.0.0.1:8080)
//!
//! ### Storage Settings
//! - `BATCHBROKER_BUCKET`: Object-store bucket name (default: batchbroker)
//! - `BATCHBROKER_CACHE`: Local cache directory (default: ./data/cache)
//! - `BATCHBROKER_ROOT`: Key prefix under which topics live (default: data)
//! - `BATCHBROKER_TOPIC`: Topic name (default: default)
//! - `AWS_REGION`: AWS region (default: us-east-1)
//! - `S3_ENDPOINT`: Custom S3 endpoint URL, e.g. MinIO (optional)
//!
//! ### Local Development
//! - `USE_LOCAL_STORAGE`: Use the local filesystem backend instead of the
//!   cached object store (any value)
//! - `LOCAL_STORAGE_PATH`: Path for local storage (default: ./data/storage)
//!
//! ### Batching
//! - `BATCHBROKER_WINDOW_MS`: Batching window deadline (default: 2000)
//! - `BATCHBROKER_WINDOW_HARD_LIMIT_MS`: Hard cap on the window
//!   (default: 10000)
//!
//! ## Logging
//! Controlled via `RUST_LOG`:
//! ```bash
//! RUST_LOG=debug cargo run -p batchbroker-server
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use batchbroker_server::{create_router, AppState};
use batchbroker_storage::{
    BackingStorage, BlockingBatcher, BrokerConfig, CachedObjectStorage, DiskStorage, TopicStorage,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Configuration
    let bind_addr: SocketAddr = env_or("BATCHBROKER_ADDR", "127.0.0.1:8080").parse()?;

    let config = BrokerConfig {
        bucket_name: env_or("BATCHBROKER_BUCKET", "batchbroker"),
        local_cache_root: env_or("BATCHBROKER_CACHE", "./data/cache"),
        root_dir: env_or("BATCHBROKER_ROOT", "data"),
        topic: env_or("BATCHBROKER_TOPIC", "default"),
        batch_window_deadline_ms: env_or("BATCHBROKER_WINDOW_MS", "2000").parse()?,
        batch_window_hard_limit_ms: env_or("BATCHBROKER_WINDOW_HARD_LIMIT_MS", "10000").parse()?,
        s3_region: env_or("AWS_REGION", "us-east-1"),
        s3_endpoint: std::env::var("S3_ENDPOINT").ok(),
    };

    // Initialize backing storage
    let backing: Arc<dyn BackingStorage> = if std::env::var("USE_LOCAL_STORAGE").is_ok() {
        let local_path = env_or("LOCAL_STORAGE_PATH", "./data/storage");
        tracing::info!("Using local disk storage at {}", local_path);
        Arc::new(DiskStorage::new(local_path))
    } else {
        tracing::info!("Using object store (bucket: {})", config.bucket_name);
        let mut builder = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket_name)
            .with_region(&config.s3_region);
        if let Some(endpoint) = &config.s3_endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let store = Arc::new(builder.build()?);
        Arc::new(CachedObjectStorage::new(store, &config.local_cache_root))
    };

    // Open the topic
    tracing::info!(
        "Opening topic '{}' under '{}'",
        config.topic,
        config.root_dir
    );
    let storage = Arc::new(TopicStorage::new(backing, &config.root_dir, &config.topic).await?);

    // Wire the batcher to the storage write path
    let flush_storage = storage.clone();
    let batcher = BlockingBatcher::new(config.batcher_config(), move |records| {
        let storage = flush_storage.clone();
        async move {
            let started = tokio::time::Instant::now();
            let count = records.len();
            let result = storage.add_record_batch(&records).await;
            tracing::debug!(records = count, elapsed = ?started.elapsed(), "persisted record batch");
            result
        }
    });

    let app = create_router(AppState { batcher, storage });

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("batchbroker listening on {}", bind_addr);
    tracing::info!("Configuration:");
    tracing::info!("  Topic: {}/{}", config.root_dir, config.topic);
    tracing::info!(
        "  Batch window: {}ms (hard limit {}ms)",
        config.batch_window_deadline_ms,
        config.batch_window_hard_limit_ms
    );

    axum::serve(listener, app).await?;

    Ok(())
}
