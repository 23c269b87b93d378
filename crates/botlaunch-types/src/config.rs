//! Service configuration.
//!
//! Parsed from `config.toml` in the data directory; every field has a
//! default so a missing or malformed file degrades to a working service.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration for the publish service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the REST API binds to.
    pub bind_addr: String,
    /// Directory holding runtime template code copied into every bundle.
    /// When absent, bundles contain only the project's own files.
    pub runtime_template_dir: Option<PathBuf>,
    /// Persist history to `history.json` in the data directory. When off,
    /// history lives only for the process lifetime.
    pub persist_history: bool,
    /// Fixed deployment endpoint. When absent, the endpoint is derived
    /// from the publish profile's target name (private clouds pin it).
    pub deploy_endpoint: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            runtime_template_dir: None,
            persist_history: true,
            deploy_endpoint: None,
        }
    }
}
