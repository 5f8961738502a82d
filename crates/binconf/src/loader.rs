//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, FilebinConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli). Only returns
/// files that exist.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/filebin/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("filebin/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("filebin.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay the keys it sets onto `config`.
pub fn load_into(config: &mut FilebinConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay the keys present in a TOML document onto `config`.
fn apply_toml(config: &mut FilebinConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let origin = path.display().to_string();

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("data_dir").and_then(|v| v.as_str()) {
            config.paths.data_dir = expand_path(v);
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("addr").and_then(|v| v.as_str()) {
            config.bind.addr = v.to_string();
        }
        if let Some(v) = bind.get("mount").and_then(|v| v.as_str()) {
            config.bind.mount = v.to_string();
        }
    }

    if let Some(limits) = table.get("limits").and_then(|v| v.as_table()) {
        if let Some(v) = limits.get("size_limit").and_then(|v| v.as_integer()) {
            config.limits.size_limit = non_negative(&origin, "limits.size_limit", v)?;
        }
        if let Some(v) = limits.get("max_uploads").and_then(|v| v.as_integer()) {
            config.limits.max_uploads = non_negative(&origin, "limits.max_uploads", v)? as usize;
        }
        if let Some(v) = limits.get("io_timeout_secs").and_then(|v| v.as_integer()) {
            config.limits.io_timeout_secs = non_negative(&origin, "limits.io_timeout_secs", v)?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
        if let Some(v) = telemetry.get("otlp_endpoint").and_then(|v| v.as_str()) {
            config.telemetry.otlp_endpoint = Some(v.to_string());
        }
    }

    Ok(())
}

fn non_negative(origin: &str, key: &str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::Invalid {
        origin: origin.to_string(),
        key: key.to_string(),
        message: format!("expected a non-negative integer, got {}", value),
    })
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        origin: "environment".to_string(),
        key: var.to_string(),
        message: format!("expected a non-negative integer, got {:?}", value),
    })
}

/// Apply `FILEBIN_*` environment variable overrides to config.
pub fn apply_env_overrides(
    config: &mut FilebinConfig,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError> {
    apply_overrides_with(config, sources, |key| env::var(key).ok())
}

/// Apply overrides using `lookup` in place of the process environment.
pub fn apply_overrides_with<F>(
    config: &mut FilebinConfig,
    sources: &mut ConfigSources,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("FILEBIN_DATA_DIR") {
        config.paths.data_dir = expand_path(&v);
        sources.env_overrides.push("FILEBIN_DATA_DIR".to_string());
    }

    if let Some(v) = lookup("FILEBIN_ADDR") {
        config.bind.addr = v;
        sources.env_overrides.push("FILEBIN_ADDR".to_string());
    }
    if let Some(v) = lookup("FILEBIN_MOUNT") {
        config.bind.mount = v;
        sources.env_overrides.push("FILEBIN_MOUNT".to_string());
    }

    if let Some(v) = lookup("FILEBIN_SIZE_LIMIT") {
        config.limits.size_limit = parse_number("FILEBIN_SIZE_LIMIT", &v)?;
        sources.env_overrides.push("FILEBIN_SIZE_LIMIT".to_string());
    }
    if let Some(v) = lookup("FILEBIN_MAX_UPLOADS") {
        config.limits.max_uploads = parse_number("FILEBIN_MAX_UPLOADS", &v)?;
        sources.env_overrides.push("FILEBIN_MAX_UPLOADS".to_string());
    }
    if let Some(v) = lookup("FILEBIN_IO_TIMEOUT_SECS") {
        config.limits.io_timeout_secs = parse_number("FILEBIN_IO_TIMEOUT_SECS", &v)?;
        sources.env_overrides.push("FILEBIN_IO_TIMEOUT_SECS".to_string());
    }

    if let Some(v) = lookup("FILEBIN_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("FILEBIN_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over FILEBIN_LOG_LEVEL
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
    if let Some(v) = lookup("FILEBIN_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
        sources.env_overrides.push("FILEBIN_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
        sources.env_overrides.push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }

    Ok(())
}

/// Expand `~/` and a leading `$VAR/` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        return PathBuf::from(path);
    }

    if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = match stripped.find('/') {
            Some(slash_pos) => (&stripped[..slash_pos], Some(&stripped[slash_pos + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}
