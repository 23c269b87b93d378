//! Provisioning request/response types.
//!
//! Provisioning creates the cloud infrastructure a bot runs on; it is
//! independent from publishing the bot's code to that infrastructure.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Flags selecting which optional resources the deployment template
/// creates alongside the compute resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFlags {
    #[serde(default = "default_true")]
    pub create_luis_authoring: bool,
    #[serde(default = "default_true")]
    pub create_luis_runtime: bool,
    #[serde(default = "default_true")]
    pub create_storage: bool,
    /// Telemetry (monitoring) resource; when false, the monitoring-link
    /// stage is skipped entirely.
    #[serde(default = "default_true")]
    pub create_app_insights: bool,
    #[serde(default)]
    pub create_cosmos_db: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ResourceFlags {
    fn default() -> Self {
        Self {
            create_luis_authoring: true,
            create_luis_runtime: true,
            create_storage: true,
            create_app_insights: true,
            create_cosmos_db: false,
        }
    }
}

/// One provisioning submission. Read-only to the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub subscription_id: String,
    /// Resolved from the subscription when absent.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Management API credential.
    pub access_token: SecretString,
    /// Base name all derived resource names are built from.
    pub resource_name: String,
    pub location: String,
    /// Defaults to `resource_name`.
    #[serde(default)]
    pub resource_group: Option<String>,
    /// Existing application identity; a new one is registered when absent.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Required whenever an application identity must be created.
    #[serde(default)]
    pub app_password: Option<SecretString>,
    #[serde(default)]
    pub flags: ResourceFlags,
}

impl ProvisionRequest {
    pub fn resource_group_or_default(&self) -> &str {
        self.resource_group.as_deref().unwrap_or(&self.resource_name)
    }
}

/// Resource names derived from the base name, present only when the
/// corresponding creation flag was set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedResourceNames {
    pub web_app: String,
    pub service_plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_insights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cosmos_db: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub luis_authoring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub luis_prediction: Option<String>,
}

impl DerivedResourceNames {
    /// Derive the full name set from the base resource name.
    ///
    /// Storage and database accounts have stricter naming rules than the
    /// other resource kinds: lowercase alphanumeric, capped at 24 chars.
    pub fn derive(base: &str, flags: &ResourceFlags) -> Self {
        let squashed: String = base
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .take(24)
            .collect();

        Self {
            web_app: base.to_string(),
            service_plan: format!("{base}-serviceplan"),
            storage_account: flags.create_storage.then(|| squashed.clone()),
            app_insights: flags.create_app_insights.then(|| base.to_string()),
            cosmos_db: flags.create_cosmos_db.then(|| squashed.clone()),
            luis_authoring: flags
                .create_luis_authoring
                .then(|| format!("{base}-luis-authoring")),
            luis_prediction: flags
                .create_luis_runtime
                .then(|| format!("{base}-luis")),
        }
    }
}

/// The provisioning result: flattened deployment outputs plus the names
/// the caller needs to wire into a publish profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionOutput {
    /// Flat key/value settings unpacked from the deployment outputs plus
    /// the application identity.
    pub settings: serde_json::Value,
    pub resource_group: String,
    pub derived: DerivedResourceNames,
    /// Non-fatal outcomes (e.g. the monitoring link failing after the
    /// primary resources were created).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
