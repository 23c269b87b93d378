//! Management API port for the provisioner.
//!
//! One trait covers the cloud management surface the state machine needs:
//! tenant resolution, application identities, resource groups, template
//! deployment, and monitoring wiring. The infrastructure layer implements
//! it with an authenticated reqwest client; tests script it.

use botlaunch_types::error::ProvisionError;
use serde_json::Value;

/// An application identity (registration) the bot authenticates as.
#[derive(Debug, Clone)]
pub struct AppIdentity {
    pub app_id: String,
    pub password: String,
}

/// Credentials of a monitoring component, patched into the compute
/// resource's configuration after deployment.
#[derive(Debug, Clone)]
pub struct MonitoringCredentials {
    pub instrumentation_key: String,
    pub api_key: String,
    pub application_id: String,
}

/// Cloud management operations, in state-machine order.
pub trait ManagementApi: Send + Sync {
    /// Exchange a subscription id for its tenant id. Fatal when the
    /// subscription is invalid or the credential lacks access.
    fn resolve_tenant(
        &self,
        subscription_id: &str,
    ) -> impl std::future::Future<Output = Result<String, ProvisionError>> + Send;

    /// Register a new application identity with the given password.
    fn create_app_identity(
        &self,
        name: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<AppIdentity, ProvisionError>> + Send;

    /// Create the resource group if it does not already exist.
    fn ensure_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> impl std::future::Future<Output = Result<(), ProvisionError>> + Send;

    /// Dry-run the deployment template. A failure here carries the API's
    /// structured error detail and is fatal.
    fn validate_template(
        &self,
        group: &str,
        template: &Value,
        parameters: &Value,
    ) -> impl std::future::Future<Output = Result<(), ProvisionError>> + Send;

    /// Execute the deployment.
    fn deploy_template(
        &self,
        group: &str,
        deployment: &str,
        template: &Value,
        parameters: &Value,
    ) -> impl std::future::Future<Output = Result<(), ProvisionError>> + Send;

    /// The deployment's declared outputs, in the management API's
    /// `{name: {type, value}}` shape. May be empty.
    fn deployment_outputs(
        &self,
        group: &str,
        deployment: &str,
    ) -> impl std::future::Future<Output = Result<Value, ProvisionError>> + Send;

    /// Per-operation failure details for a deployment that succeeded
    /// overall but produced nothing.
    fn deployment_operation_errors(
        &self,
        group: &str,
        deployment: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, ProvisionError>> + Send;

    /// Fetch the monitoring component's identifiers and an API key.
    fn monitoring_credentials(
        &self,
        group: &str,
        component: &str,
    ) -> impl std::future::Future<Output = Result<MonitoringCredentials, ProvisionError>> + Send;

    /// Patch the compute resource's configuration to reference the
    /// monitoring component.
    fn link_monitoring(
        &self,
        group: &str,
        site: &str,
        creds: &MonitoringCredentials,
    ) -> impl std::future::Future<Output = Result<(), ProvisionError>> + Send;
}
