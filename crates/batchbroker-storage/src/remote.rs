//! Cached Object-Store Backing Storage
//!
//! [`BackingStorage`] against a remote object store (S3, MinIO, or any
//! `object_store` implementation), fronted by a local directory that
//! mirrors every batch file this process writes or reads. The cache uses
//! the same relative path as the remote key.
//!
//! ## Why a cache?
//!
//! Object stores have high per-request latency (~50-200ms per GET) and
//! charge per request. Batch files are immutable, so a present cache entry
//! is by construction correct - no invalidation, no coherence protocol.
//!
//! ## Write path
//!
//! The writer is a *deferred-upload* sink: writes land in a freshly created
//! cache file only. `commit` rewinds the file, uploads its contents as a
//! single object under the remote key, then closes it. A failed upload
//! leaves the cache file in place as dead cache; the batch is never
//! published, so readers cannot observe it.
//!
//! ## Read path
//!
//! A cached path is served without any network call. Otherwise the object
//! is fetched, materialized as a cache file, rewound, and returned.
//!
//! ## Listing
//!
//! Always asks the remote store - the remote is the source of truth for
//! which batches exist. The local cache is never consulted for listings.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::backend::{BackingStorage, BatchSink, BatchSource};
use crate::error::{Error, Result};

/// Remote object store fronted by a local file cache.
pub struct CachedObjectStorage {
    store: Arc<dyn ObjectStore>,
    cache_root: PathBuf,
}

impl CachedObjectStorage {
    pub fn new<P: AsRef<Path>>(store: Arc<dyn ObjectStore>, cache_root: P) -> Self {
        Self {
            store,
            cache_root: cache_root.as_ref().to_path_buf(),
        }
    }

    fn cache_path(&self, path: &str) -> PathBuf {
        self.cache_root.join(path)
    }

    async fn create_cache_file(&self, cache_path: &Path) -> Result<File> {
        if let Some(parent) = cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(cache_path)
            .await?;

        Ok(file)
    }
}

#[async_trait]
impl BackingStorage for CachedObjectStorage {
    async fn writer(&self, path: &str) -> Result<Box<dyn BatchSink>> {
        let cache_path = self.cache_path(path);

        // Batch IDs are unique, so the cache path must not exist yet.
        if tokio::fs::try_exists(&cache_path).await? {
            return Err(Error::AlreadyExists(path.to_string()));
        }

        debug!(path, cache_path = %cache_path.display(), "creating cache file for deferred upload");
        let file = self.create_cache_file(&cache_path).await?;

        Ok(Box::new(DeferredUploadSink {
            file,
            location: ObjectPath::from(path),
            store: Arc::clone(&self.store),
        }))
    }

    async fn reader(&self, path: &str) -> Result<Box<dyn BatchSource>> {
        let cache_path = self.cache_path(path);

        match File::open(&cache_path).await {
            Ok(file) => {
                debug!(path, "batch file served from cache");
                return Ok(Box::new(file));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        debug!(path, "batch file not cached, fetching from object store");
        let location = ObjectPath::from(path);
        let data = self.store.get(&location).await?.bytes().await?;

        let mut file = self.create_cache_file(&cache_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        file.seek(io::SeekFrom::Start(0)).await?;

        debug!(path, size = data.len(), "batch file cached");
        Ok(Box::new(file))
    }

    async fn list_files(&self, topic_path: &str, extension: &str) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(topic_path.trim_start_matches('/'));

        let mut objects = self.store.list(Some(&prefix));
        let mut files = Vec::new();
        while let Some(meta) = objects.next().await {
            let location = meta?.location.to_string();
            if location.ends_with(extension) {
                files.push(location);
            }
        }

        debug!(topic_path, found = files.len(), "listed batch files in object store");
        Ok(files)
    }
}

/// Writes into a local cache file; the remote upload happens on `commit`.
struct DeferredUploadSink {
    file: File,
    location: ObjectPath,
    store: Arc<dyn ObjectStore>,
}

impl AsyncWrite for DeferredUploadSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

#[async_trait]
impl BatchSink for DeferredUploadSink {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.file.flush().await?;
        self.file.seek(io::SeekFrom::Start(0)).await?;

        let mut contents = Vec::new();
        self.file.read_to_end(&mut contents).await?;

        self.store
            .put(&self.location, Bytes::from(contents))
            .await?;

        debug!(location = %self.location, "batch file uploaded");
        Ok(())
    }
}
