//! Publish profile and request types.
//!
//! A publish profile is authored in the design-time editor and arrives as
//! camelCase JSON. The hosting access token and model-service keys are
//! wrapped in [`secrecy::SecretString`] so they never appear in `Debug`
//! output or logs; profile types therefore deserialize but do not
//! serialize.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::project::ProjectFile;

/// Deployment target description for one publish destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishProfile {
    pub profile_name: String,
    /// Name of the compute resource the bundle is deployed to.
    pub target_name: String,
    /// Deployment endpoint hostname; derived from `target_name` when absent.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Bearer credential for the hosting deployment endpoint.
    pub access_token: SecretString,
    /// Environment suffix distinguishing bundles for the same target.
    #[serde(default)]
    pub environment: Option<String>,
    /// Default authoring locale, e.g. "en-us".
    #[serde(default)]
    pub default_language: Option<String>,
    /// Settings payload merged into the bundle at profile precedence.
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub luis: Option<LuCredentials>,
    #[serde(default)]
    pub qna: Option<QnaCredentials>,
    /// Optional forward proxy for egress-restricted environments.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

impl PublishProfile {
    /// Environment suffix with its default applied.
    pub fn environment_or_default(&self) -> &str {
        self.environment.as_deref().unwrap_or("composer")
    }

    /// Deployment hostname, falling back to the conventional
    /// `<target>.azurewebsites.net` when the profile does not pin one.
    pub fn hostname_or_default(&self) -> String {
        match &self.hostname {
            Some(host) => host.clone(),
            None => format!("{}.azurewebsites.net", self.target_name),
        }
    }

    /// Whether the hosting credential is present and non-empty.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
    }
}

/// Language-understanding build/runtime credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuCredentials {
    #[serde(default)]
    pub authoring_key: Option<SecretString>,
    #[serde(default)]
    pub authoring_region: Option<String>,
    /// Runtime prediction resource name, for account assignment after
    /// training.
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub endpoint_key: Option<SecretString>,
}

impl LuCredentials {
    /// Both an authoring key and a region are required to train.
    pub fn can_train(&self) -> bool {
        self.authoring_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
            && self
                .authoring_region
                .as_ref()
                .is_some_and(|r| !r.trim().is_empty())
    }

    /// Authoring endpoint derived from the region.
    pub fn authoring_endpoint(&self) -> Option<String> {
        self.authoring_region
            .as_ref()
            .map(|r| format!("https://{r}.api.cognitive.microsoft.com"))
    }
}

/// Knowledge-base build credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QnaCredentials {
    #[serde(default)]
    pub subscription_key: Option<SecretString>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl QnaCredentials {
    pub fn can_build(&self) -> bool {
        self.subscription_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }
}

/// Forward proxy host/port for the upload channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

/// Caller-supplied annotations carried through to history.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishMetadata {
    #[serde(default)]
    pub comment: Option<String>,
}

/// A complete publish submission: profile, project files, annotations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    /// Project display name; part of the working-directory resource key.
    pub bot_name: String,
    pub profile: PublishProfile,
    pub files: Vec<ProjectFile>,
    #[serde(default)]
    pub metadata: PublishMetadata,
}
