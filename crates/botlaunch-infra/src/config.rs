//! Configuration loader for the publish service.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`ServiceConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::{Path, PathBuf};

use botlaunch_types::config::ServiceConfig;

/// Resolve the data directory: `~/.botlaunch`, or `./.botlaunch` when no
/// home directory is available (containers).
pub fn resolve_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".botlaunch"))
        .unwrap_or_else(|| PathBuf::from(".botlaunch"))
}

/// Load service configuration from `{data_dir}/config.toml`.
///
/// - Missing file: defaults, at debug level.
/// - Unreadable or unparseable file: defaults, with a warning.
pub async fn load_config(data_dir: &Path) -> ServiceConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config.toml at {}, using defaults", config_path.display());
            return ServiceConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return ServiceConfig::default();
        }
    };

    match toml::from_str::<ServiceConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServiceConfig::default()
        }
    }
}
