//! FileStore: filesystem-backed write-once blob storage.
//!
//! Write path for one upload:
//!
//! ```text
//! idle ─► registered ─► staged ─► committed ─► idle
//!                          └────► aborted ───► idle
//! ```
//!
//! `registered` holds an [`UploadPermit`]; `staged` holds a [`StagingFile`].
//! Both release themselves on drop, so any exit path returns to `idle`
//! without leaving a registry entry or a temp file behind.

use std::io;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use tokio::fs::{self, File};
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::name::BlobName;
use crate::registry::{UploadPermit, UploadRegistry};
use crate::staging::StagingFile;

/// Filesystem-based blob store.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StoreConfig,
    registry: Arc<UploadRegistry>,
}

/// A committed blob opened for reading.
#[derive(Debug)]
pub struct StoredBlob {
    pub name: BlobName,
    pub size: u64,
    pub file: File,
}

/// Outcome of a committed upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub name: BlobName,
    pub size_bytes: u64,
    /// Final location in the content area.
    pub path: PathBuf,
}

impl FileStore {
    /// Create a store with its own registry sized from `config.max_uploads`.
    pub fn new(config: StoreConfig) -> Self {
        let registry = Arc::new(UploadRegistry::new(config.max_uploads));
        Self::with_registry(config, registry)
    }

    /// Create a store that shares an existing registry.
    pub fn with_registry(config: StoreConfig, registry: Arc<UploadRegistry>) -> Self {
        Self { config, registry }
    }

    /// Create a store at a specific root with default limits.
    pub fn at_path(root: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::with_root(root))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<UploadRegistry> {
        &self.registry
    }

    fn blob_path(&self, name: &BlobName) -> PathBuf {
        self.config.file_dir().join(name.as_str())
    }

    fn staging_path(&self, name: &BlobName) -> PathBuf {
        self.config.temp_dir().join(name.as_str())
    }

    /// Open a committed blob for streaming.
    ///
    /// Names that are not a single segment are reported as not found and
    /// never touch the filesystem.
    pub async fn open(&self, name: &str) -> Result<StoredBlob, StoreError> {
        let name = match BlobName::parse(name) {
            Ok(name) => name,
            Err(e) => {
                debug!(name, error = %e, "rejecting download of invalid name");
                return Err(StoreError::NotFound);
            }
        };

        let path = self.blob_path(&name);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::Read(e)),
        };

        let metadata = file.metadata().await.map_err(StoreError::Read)?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound);
        }

        Ok(StoredBlob {
            name,
            size: metadata.len(),
            file,
        })
    }

    /// Check whether a blob has been committed under `name`.
    pub async fn exists(&self, name: &BlobName) -> bool {
        fs::metadata(self.blob_path(name)).await.is_ok()
    }

    /// Store `body` under `name`.
    ///
    /// `declared_len` is the request's content length; exactly that many
    /// bytes are read from `body`. Validation runs in a fixed order (length
    /// present, length within limit, name shape, registry slot) and stops at
    /// the first failure without touching the filesystem.
    pub async fn upload<R>(
        &self,
        name: &str,
        declared_len: Option<u64>,
        body: R,
    ) -> Result<UploadReceipt, StoreError>
    where
        R: AsyncRead,
    {
        let len = declared_len.ok_or(StoreError::LengthRequired)?;
        if len > self.config.size_limit {
            return Err(StoreError::TooLarge {
                limit: self.config.size_limit,
            });
        }
        let name = BlobName::parse(name)?;
        let permit = self.registry.try_acquire(&name)?;

        let body = pin!(body);
        let result = self.write_registered(&permit, len, body).await;
        drop(permit);
        result
    }

    async fn write_registered<R>(
        &self,
        permit: &UploadPermit,
        len: u64,
        body: R,
    ) -> Result<UploadReceipt, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let name = permit.name();
        self.ensure_dirs().await?;

        let final_path = self.blob_path(name);
        if self.exists(name).await {
            return Err(StoreError::AlreadyExists);
        }

        let mut staging = StagingFile::create(self.staging_path(name))
            .await
            .map_err(StoreError::OpenStaging)?;
        debug!(%name, path = %staging.path().display(), bytes = len, "staging upload");

        if let Err(e) = staging.fill_from(body, len, self.config.io_timeout).await {
            if let Err(cleanup) = staging.discard().await {
                warn!(%name, error = %cleanup, "failed to remove partial upload");
            }
            return Err(e);
        }

        let size_bytes = staging.commit(&final_path).await.map_err(StoreError::Commit)?;
        info!(%name, bytes = size_bytes, "upload committed");

        Ok(UploadReceipt {
            name: name.clone(),
            size_bytes,
            path: final_path,
        })
    }

    /// Create the temp and content areas if they are missing.
    pub async fn ensure_dirs(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.config.temp_dir())
            .await
            .map_err(|source| StoreError::CreateDir {
                area: "temp",
                source,
            })?;
        fs::create_dir_all(self.config.file_dir())
            .await
            .map_err(|source| StoreError::CreateDir {
                area: "file",
                source,
            })?;
        Ok(())
    }

    /// Remove staging files left behind by a previous process.
    ///
    /// Names with an upload currently registered are skipped. Returns the
    /// number of files removed.
    pub async fn sweep_staging(&self) -> Result<usize, StoreError> {
        let mut entries = match fs::read_dir(self.config.temp_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::Sweep(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(StoreError::Sweep)? {
            let file_type = entry.file_type().await.map_err(StoreError::Sweep)?;
            if !file_type.is_file() {
                continue;
            }

            let in_use = entry
                .file_name()
                .to_str()
                .and_then(|s| BlobName::parse(s).ok())
                .is_some_and(|name| self.registry.is_busy(&name));
            if in_use {
                continue;
            }

            fs::remove_file(entry.path()).await.map_err(StoreError::Sweep)?;
            debug!(path = %entry.path().display(), "removed stale staging file");
            removed += 1;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AcquireError;
    use anyhow::Result;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    fn store_in(temp_dir: &TempDir) -> FileStore {
        FileStore::at_path(temp_dir.path().join("root"))
    }

    async fn read_blob(store: &FileStore, name: &str) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;
        let mut blob = store.open(name).await?;
        let mut data = Vec::new();
        blob.file.read_to_end(&mut data).await?;
        Ok(data)
    }

    fn temp_entries(store: &FileStore) -> usize {
        std::fs::read_dir(store.config().temp_dir())
            .map(|dir| dir.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_upload_and_open() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        assert!(matches!(store.open("file0").await, Err(StoreError::NotFound)));

        let data = b"here's some test data - test 0";
        let receipt = store.upload("file0", Some(data.len() as u64), &data[..]).await?;
        assert_eq!(receipt.name.as_str(), "file0");
        assert_eq!(receipt.size_bytes, data.len() as u64);
        assert_eq!(receipt.path, store.config().file_dir().join("file0"));

        let blob = store.open("file0").await?;
        assert_eq!(blob.size, data.len() as u64);
        assert_eq!(read_blob(&store, "file0").await?, data);

        assert_eq!(store.registry().in_flight(), 0);
        assert_eq!(temp_entries(&store), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_upload() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        store.upload("empty", Some(0), &b""[..]).await?;
        assert_eq!(read_blob(&store, "empty").await?, b"");
        Ok(())
    }

    #[tokio::test]
    async fn test_second_upload_conflicts() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        store.upload("file0", Some(8), &b"original"[..]).await?;
        let err = store
            .upload("file0", Some(11), &b"replacement"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));

        assert_eq!(read_blob(&store, "file0").await?, b"original");
        assert_eq!(store.registry().in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_requests_touch_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::new(
            StoreConfig::with_root(temp_dir.path().join("root")).size_limit(16),
        );

        let err = store.upload("file0", None, &b"data"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::LengthRequired));

        let err = store.upload("file0", Some(17), &b"x"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { limit: 16 }));

        let err = store.upload("a/b", Some(4), &b"data"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));

        let err = store.upload("..", Some(4), &b"data"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));

        assert!(!store.config().root.exists());
        assert_eq!(store.registry().in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_limit_is_inclusive() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::new(StoreConfig::with_root(temp_dir.path()).size_limit(4));

        store.upload("four", Some(4), &b"1234"[..]).await?;
        assert_eq!(read_blob(&store, "four").await?, b"1234");
        Ok(())
    }

    #[tokio::test]
    async fn test_length_checked_before_name() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        let err = store.upload("a/b", None, &b""[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::LengthRequired));
        Ok(())
    }

    #[tokio::test]
    async fn test_busy_name_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        let name = BlobName::parse("file0")?;
        let held = store.registry().try_acquire(&name)?;

        let err = store.upload("file0", Some(4), &b"data"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::Busy(AcquireError::Busy)));

        drop(held);
        store.upload("file0", Some(4), &b"data"[..]).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_same_name_single_winner() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);
        let name = BlobName::parse("contested")?;

        // First upload parks mid-body
        let (mut writer, reader) = tokio::io::duplex(64);
        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.upload("contested", Some(6), reader).await })
        };
        while !store.registry().is_busy(&name) {
            tokio::task::yield_now().await;
        }

        let err = store
            .upload("contested", Some(6), &b"second"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Busy(_)));

        writer.write_all(b"first!").await?;
        let receipt = first.await??;
        assert_eq!(receipt.size_bytes, 6);

        assert_eq!(read_blob(&store, "contested").await?, b"first!");
        assert_eq!(store.registry().in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_different_names_proceed_in_parallel() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        // Hold one upload open while another completes
        let (mut writer, reader) = tokio::io::duplex(64);
        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.upload("slow", Some(4), reader).await })
        };
        while store.registry().in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        store.upload("fast", Some(4), &b"fast"[..]).await?;
        assert_eq!(read_blob(&store, "fast").await?, b"fast");

        writer.write_all(b"slow").await?;
        slow.await??;
        assert_eq!(read_blob(&store, "slow").await?, b"slow");
        Ok(())
    }

    #[tokio::test]
    async fn test_capacity_recovers() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::new(StoreConfig::with_root(temp_dir.path()).max_uploads(2));

        let a = store.registry().try_acquire(&BlobName::parse("a")?)?;
        let _b = store.registry().try_acquire(&BlobName::parse("b")?)?;

        let err = store.upload("c", Some(1), &b"c"[..]).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Busy(AcquireError::AtCapacity { capacity: 2 })
        ));

        drop(a);
        store.upload("c", Some(1), &b"c"[..]).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_truncated_body_leaves_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        let err = store
            .upload("partial", Some(1000), &b"only a few bytes"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transfer(_)));

        assert!(matches!(store.open("partial").await, Err(StoreError::NotFound)));
        assert!(!store.config().file_dir().join("partial").exists());
        assert_eq!(temp_entries(&store), 0);
        assert_eq!(store.registry().in_flight(), 0);

        // The name is free to be uploaded properly afterwards
        store.upload("partial", Some(4), &b"full"[..]).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_disconnect_mid_body() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        let (mut writer, reader) = tokio::io::duplex(64);
        let upload = {
            let store = store.clone();
            tokio::spawn(async move { store.upload("dropped", Some(100), reader).await })
        };

        writer.write_all(b"first half").await?;
        drop(writer);

        let err = upload.await?.unwrap_err();
        assert!(matches!(err, StoreError::Transfer(_)));
        assert!(!store.exists(&BlobName::parse("dropped")?).await);
        assert_eq!(temp_entries(&store), 0);
        assert_eq!(store.registry().in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_stalled_upload_times_out() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::new(
            StoreConfig::with_root(temp_dir.path()).io_timeout(Duration::from_millis(50)),
        );

        let (_writer, reader) = tokio::io::duplex(64);
        let err = store.upload("stalled", Some(10), reader).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));

        assert_eq!(temp_entries(&store), 0);
        assert_eq!(store.registry().in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_staging_file_is_internal_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);
        store.ensure_dirs().await?;
        std::fs::write(store.config().temp_dir().join("stale"), b"leftover")?;

        let err = store.upload("stale", Some(3), &b"new"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::OpenStaging(_)));
        assert_eq!(store.registry().in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unusable_root_is_internal_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("not-a-dir");
        std::fs::write(&root, b"i am a file")?;
        let store = FileStore::at_path(&root);

        let err = store.upload("file0", Some(4), &b"data"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::CreateDir { area: "temp", .. }));
        assert_eq!(store.registry().in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_rejects_traversal() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);
        store.ensure_dirs().await?;
        std::fs::write(store.config().root.join("secret"), b"outside the content area")?;

        assert!(matches!(store.open("../secret").await, Err(StoreError::NotFound)));
        assert!(matches!(store.open("..").await, Err(StoreError::NotFound)));
        assert!(matches!(store.open("").await, Err(StoreError::NotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_dirs_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        let (a, b) = tokio::join!(store.ensure_dirs(), store.ensure_dirs());
        a?;
        b?;
        store.ensure_dirs().await?;

        assert!(store.config().file_dir().is_dir());
        assert!(store.config().temp_dir().is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_staging() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = store_in(&temp_dir);

        assert_eq!(store.sweep_staging().await?, 0);

        store.ensure_dirs().await?;
        std::fs::write(store.config().temp_dir().join("crashed"), b"half")?;
        std::fs::write(store.config().temp_dir().join("active"), b"in progress")?;
        let _active = store.registry().try_acquire(&BlobName::parse("active")?)?;

        assert_eq!(store.sweep_staging().await?, 1);
        assert!(!store.config().temp_dir().join("crashed").exists());
        assert!(store.config().temp_dir().join("active").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_shared_registry() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let registry = Arc::new(UploadRegistry::new(10));
        let a = FileStore::with_registry(
            StoreConfig::with_root(temp_dir.path().join("a")),
            Arc::clone(&registry),
        );
        let b = FileStore::with_registry(
            StoreConfig::with_root(temp_dir.path().join("b")),
            Arc::clone(&registry),
        );

        let _held = a.registry().try_acquire(&BlobName::parse("file0")?)?;
        let err = b.upload("file0", Some(1), &b"x"[..]).await.unwrap_err();
        assert!(matches!(err, StoreError::Busy(_)));
        Ok(())
    }
}
