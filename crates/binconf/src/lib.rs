//! Configuration loading for filebin.
//!
//! # Usage
//!
//! ```rust,no_run
//! use binconf::FilebinConfig;
//!
//! let config = FilebinConfig::load().expect("Failed to load config");
//! println!("data dir: {}", config.paths.data_dir.display());
//! println!("listening on {}", config.bind.addr);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/filebin/config.toml` (system)
//! 2. `~/.config/filebin/config.toml` (user)
//! 3. `./filebin.toml` (local override), or the path given on the command line
//! 4. Environment variables (`FILEBIN_*`)
//!
//! Only keys present in a file override earlier values.
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! data_dir = "~/filebin"
//!
//! [bind]
//! addr = "127.0.0.1:8000"
//! mount = "/data"
//!
//! [limits]
//! size_limit = 1073741824
//! max_uploads = 100
//! io_timeout_secs = 10
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = "127.0.0.1:4317"
//! ```

pub mod infra;
pub mod loader;

pub use infra::{BindConfig, LimitsConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key} in {origin}: {message}")]
    Invalid {
        origin: String,
        key: String,
        message: String,
    },
}

/// Complete filebin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FilebinConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl FilebinConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, using `config_path` instead of `./filebin.toml`
    /// when given. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and env vars contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = FilebinConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_into(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources)?;

        Ok((config, sources))
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# filebin configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "data_dir = \"{}\"\n",
            self.paths.data_dir.display()
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("addr = \"{}\"\n", self.bind.addr));
        output.push_str(&format!("mount = \"{}\"\n", self.bind.mount));

        output.push_str("\n[limits]\n");
        output.push_str(&format!("size_limit = {}\n", self.limits.size_limit));
        output.push_str(&format!("max_uploads = {}\n", self.limits.max_uploads));
        output.push_str(&format!(
            "io_timeout_secs = {}\n",
            self.limits.io_timeout_secs
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));
        if let Some(endpoint) = &self.telemetry.otlp_endpoint {
            output.push_str(&format!("otlp_endpoint = \"{}\"\n", endpoint));
        }

        output
    }
}
