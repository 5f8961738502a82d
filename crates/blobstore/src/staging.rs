//! Staging: the temporary home of an upload until it is committed.
//!
//! A staging file is created exclusively in the temp area under the same
//! name as its target blob. It is either committed (renamed into the
//! content area) or discarded. A staging file dropped without either is
//! removed, so an abandoned upload never leaves bytes behind.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::warn;

use crate::error::StoreError;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A handle to an in-progress upload in the temp area.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
    /// Set once the file has been renamed away or deleted.
    settled: bool,
}

impl StagingFile {
    /// Create the staging file. Fails if a file already exists at `path`.
    pub(crate) async fn create(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Some(file),
            bytes_written: 0,
            settled: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append data to the staging file.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => {
                file.write_all(data).await?;
                self.bytes_written += data.len() as u64;
                Ok(())
            }
            None => Err(io::Error::other("staging file already closed")),
        }
    }

    /// Copy exactly `len` bytes from `reader`.
    ///
    /// Each read and each write must finish within `io_timeout`. A reader
    /// that ends early is a transfer failure; bytes past `len` are left
    /// unread.
    pub async fn fill_from<R>(
        &mut self,
        mut reader: R,
        len: u64,
        io_timeout: Duration,
    ) -> Result<(), StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut remaining = len;

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = timeout(io_timeout, reader.read(&mut buf[..want]))
                .await
                .map_err(|_| StoreError::Timeout(io_timeout))?
                .map_err(StoreError::Transfer)?;

            if n == 0 {
                return Err(StoreError::Transfer(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("body ended after {} of {} bytes", len - remaining, len),
                )));
            }

            timeout(io_timeout, self.write(&buf[..n]))
                .await
                .map_err(|_| StoreError::Timeout(io_timeout))?
                .map_err(StoreError::Transfer)?;
            remaining -= n as u64;
        }

        Ok(())
    }

    /// Flush, fsync and atomically rename the staging file to `dest`.
    ///
    /// On error the staging file is removed when `self` drops.
    pub async fn commit(mut self, dest: &Path) -> io::Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        fs::rename(&self.path, dest).await?;
        self.settled = true;
        Ok(self.bytes_written)
    }

    /// Close and delete the staging file.
    pub async fn discard(mut self) -> io::Result<()> {
        self.file = None;
        self.settled = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.file = None;
        // Blocking unlink: Drop cannot await
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove abandoned staging file");
            }
        }
    }
}
