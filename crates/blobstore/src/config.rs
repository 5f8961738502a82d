//! Store configuration: where blobs live and the policy limits for uploads.
//!
//! Defaults:
//! - root: `data`
//! - size limit: 1 GiB
//! - concurrent uploads: 100
//! - I/O timeout: 10 seconds per read or write during an upload

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Largest accepted upload, in bytes.
pub const DEFAULT_SIZE_LIMIT: u64 = 1024 * 1024 * 1024;

/// Maximum number of uploads that may be in flight at once.
pub const DEFAULT_MAX_UPLOADS: usize = 100;

/// Bound on a single body read or staging write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`FileStore`](crate::FileStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory. Committed blobs go in `{root}/file/`, uploads are
    /// staged in `{root}/temp/`.
    pub root: PathBuf,

    /// Uploads declaring more bytes than this are rejected.
    #[serde(default = "default_size_limit")]
    pub size_limit: u64,

    /// Capacity of the in-flight upload registry.
    #[serde(default = "default_max_uploads")]
    pub max_uploads: usize,

    /// Timeout applied to each read from the request body and each write to
    /// the staging file.
    #[serde(default = "default_io_timeout")]
    pub io_timeout: Duration,
}

fn default_size_limit() -> u64 {
    DEFAULT_SIZE_LIMIT
}

fn default_max_uploads() -> usize {
    DEFAULT_MAX_UPLOADS
}

fn default_io_timeout() -> Duration {
    DEFAULT_IO_TIMEOUT
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::with_root("data")
    }
}

impl StoreConfig {
    /// Create a config rooted at `root` with default limits.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            size_limit: DEFAULT_SIZE_LIMIT,
            max_uploads: DEFAULT_MAX_UPLOADS,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    pub fn size_limit(mut self, bytes: u64) -> Self {
        self.size_limit = bytes;
        self
    }

    pub fn max_uploads(mut self, count: usize) -> Self {
        self.max_uploads = count;
        self
    }

    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Directory holding committed blobs.
    pub fn file_dir(&self) -> PathBuf {
        self.root.join("file")
    }

    /// Directory holding in-progress uploads.
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.root, PathBuf::from("data"));
        assert_eq!(config.size_limit, 1024 * 1024 * 1024);
        assert_eq!(config.max_uploads, 100);
        assert_eq!(config.io_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_overrides() {
        let config = StoreConfig::with_root("/srv/bin")
            .size_limit(4096)
            .max_uploads(3)
            .io_timeout(Duration::from_millis(250));
        assert_eq!(config.size_limit, 4096);
        assert_eq!(config.max_uploads, 3);
        assert_eq!(config.io_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_area_dirs() {
        let config = StoreConfig::with_root("/srv/bin");
        assert_eq!(config.file_dir(), PathBuf::from("/srv/bin/file"));
        assert_eq!(config.temp_dir(), PathBuf::from("/srv/bin/temp"));
    }

    #[test]
    fn test_serde_fills_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"root": "/x"}"#).unwrap();
        assert_eq!(config.root, PathBuf::from("/x"));
        assert_eq!(config.size_limit, DEFAULT_SIZE_LIMIT);
        assert_eq!(config.max_uploads, DEFAULT_MAX_UPLOADS);
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
    }
}
