//! Local-Disk Backing Storage
//!
//! Straight mapping of the [`BackingStorage`] capabilities onto a local
//! directory: the writer creates parent directories as needed and opens the
//! batch file create-new (a batch is written exactly once), the reader
//! opens it, and listing reads the topic directory filtered by extension.
//!
//! `commit` flushes and fsyncs; a batch is only considered durable once
//! `commit` has returned.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::backend::{BackingStorage, BatchSink, BatchSource};
use crate::error::{Error, Result};

/// Filesystem implementation of [`BackingStorage`].
///
/// All paths handed to the trait methods are interpreted relative to
/// `root`.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl BackingStorage for DiskStorage {
    async fn writer(&self, path: &str) -> Result<Box<dyn BatchSink>> {
        let file_path = self.absolute(path);

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists(path.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        debug!(path, "opened batch file for writing");
        Ok(Box::new(DiskSink { file }))
    }

    async fn reader(&self, path: &str) -> Result<Box<dyn BatchSource>> {
        let file = File::open(self.absolute(path)).await?;
        Ok(Box::new(file))
    }

    async fn list_files(&self, topic_path: &str, extension: &str) -> Result<Vec<String>> {
        let dir = self.absolute(topic_path);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // A topic that has never been written to has no directory yet.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(extension) {
                files.push(format!("{}/{}", topic_path, name));
            }
        }

        debug!(topic_path, found = files.len(), "listed batch files");
        Ok(files)
    }
}

struct DiskSink {
    file: File,
}

impl AsyncWrite for DiskSink {
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
impl BatchSink for DiskSink {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}
