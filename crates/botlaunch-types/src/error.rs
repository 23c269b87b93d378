use thiserror::Error;

/// Errors raised by the publish pipeline.
///
/// Every variant is fatal to the current job; the tracker's top-level
/// handler serializes it into the job log and forces terminal failure.
/// There is no automatic retry -- remediation is the caller's resubmission.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Detected synchronously, before any background task starts.
    #[error("profile validation failed: {0}")]
    Validation(String),

    /// Non-empty model sources exist but the service credential does not.
    #[error("missing {service} credentials while {count} source file(s) need training")]
    MissingCredentials { service: String, count: usize },

    /// A remote build/train/deploy API rejected the call. `detail` carries
    /// the service's structured error payload when one was available,
    /// otherwise the raw response body.
    #[error("{service} request failed: {detail}")]
    RemoteService { service: String, detail: String },

    /// 403-class response from the deployment endpoint. Distinguished from
    /// generic transport failures because the remediation is caller-side.
    #[error(
        "deployment rejected: the access token has expired or lacks access; \
         refresh the token and publish again"
    )]
    CredentialExpired,

    /// A malformed language or knowledge-base file aborted the whole
    /// cross-train step.
    #[error("cross-train failed on '{file}': {reason}")]
    CrossTrain { file: String, reason: String },

    /// Working-directory or archive I/O failure.
    #[error("bundle io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PublishError {
    fn from(e: std::io::Error) -> Self {
        PublishError::Io(e.to_string())
    }
}

/// Errors raised by the resource provisioner's state machine.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("could not resolve tenant for subscription '{subscription}': {detail}")]
    TenantResolution { subscription: String, detail: String },

    /// Creating an application identity requires a password; absence is a
    /// precondition failure, never silently defaulted.
    #[error("an application password is required to create the app identity")]
    MissingAppPassword,

    #[error("app identity registration failed: {0}")]
    AppIdentity(String),

    #[error("resource group '{name}' creation failed: {detail}")]
    ResourceGroup { name: String, detail: String },

    /// Template validation rejected the deployment before anything was
    /// created. The message carries the API's structured detail plus the
    /// teardown instruction for partially created groups.
    #[error(
        "deployment template validation failed ({code}): {message}. If an earlier attempt \
         left resources behind, delete the resource group and provision again"
    )]
    TemplateValidation { code: String, message: String },

    #[error("template deployment failed: {0}")]
    Deployment(String),

    /// The deployment reported success but declared no outputs; the
    /// per-operation errors explain which resources actually failed.
    #[error("deployment produced no outputs; operation errors: {}", .operation_errors.join("; "))]
    NoOutputs { operation_errors: Vec<String> },

    /// Generic management API transport/response failure.
    #[error("management api error: {0}")]
    Management(String),
}

/// Errors from job/history store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(String),

    #[error("history serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_display_names_the_service() {
        let err = PublishError::MissingCredentials {
            service: "luis".to_string(),
            count: 3,
        };
        assert!(err.to_string().contains("luis"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn credential_expired_mentions_remediation() {
        let err = PublishError::CredentialExpired;
        assert!(err.to_string().contains("refresh the token"));
    }

    #[test]
    fn template_validation_carries_teardown_instruction() {
        let err = ProvisionError::TemplateValidation {
            code: "InvalidTemplate".to_string(),
            message: "parameter 'location' missing".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("InvalidTemplate"));
        assert!(text.contains("delete the resource group"));
    }

    #[test]
    fn no_outputs_enumerates_operations() {
        let err = ProvisionError::NoOutputs {
            operation_errors: vec![
                "Microsoft.Web/sites: Conflict".to_string(),
                "Microsoft.Storage/storageAccounts: NameTaken".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("Conflict"));
        assert!(text.contains("NameTaken"));
    }
}
