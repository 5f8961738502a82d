//! Configuration sections. All of these are fixed for the life of the process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the store; holds `file/` and `temp/`.
    /// Default: ./data
    #[serde(default = "PathsConfig::default_data_dir")]
    pub data_dir: PathBuf,
}

impl PathsConfig {
    fn default_data_dir() -> PathBuf {
        PathBuf::from("data")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
        }
    }
}

/// Listener and routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Address to listen on.
    /// Default: 0.0.0.0:8000
    #[serde(default = "BindConfig::default_addr")]
    pub addr: String,

    /// URL prefix under which blobs are served.
    /// Default: /data
    #[serde(default = "BindConfig::default_mount")]
    pub mount: String,
}

impl BindConfig {
    fn default_addr() -> String {
        "0.0.0.0:8000".to_string()
    }

    fn default_mount() -> String {
        "/data".to_string()
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            addr: Self::default_addr(),
            mount: Self::default_mount(),
        }
    }
}

/// Upload policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted upload size in bytes.
    /// Default: 1 GiB
    #[serde(default = "LimitsConfig::default_size_limit")]
    pub size_limit: u64,

    /// Maximum number of uploads in flight.
    /// Default: 100
    #[serde(default = "LimitsConfig::default_max_uploads")]
    pub max_uploads: usize,

    /// Per read/write timeout while receiving an upload, in seconds.
    /// Default: 10
    #[serde(default = "LimitsConfig::default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

impl LimitsConfig {
    fn default_size_limit() -> u64 {
        1024 * 1024 * 1024
    }

    fn default_max_uploads() -> usize {
        100
    }

    fn default_io_timeout_secs() -> u64 {
        10
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            size_limit: Self::default_size_limit(),
            max_uploads: Self::default_max_uploads(),
            io_timeout_secs: Self::default_io_timeout_secs(),
        }
    }
}

/// Logging and trace export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter directive (trace, debug, info, warn, error, or an
    /// `EnvFilter` expression).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,

    /// OTLP gRPC endpoint. Export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            otlp_endpoint: None,
        }
    }
}
