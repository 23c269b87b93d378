//! The provisioning state machine.
//!
//! Linear, with early exit on validation failure:
//! tenant -> app identity -> resource group -> validate -> deploy ->
//! [monitoring link] -> outputs. The monitoring link is the only
//! non-fatal stage: once the primary resources exist they are usable
//! without it, so a failure there becomes a warning on the result.

use botlaunch_types::error::ProvisionError;
use botlaunch_types::provision::{DerivedResourceNames, ProvisionOutput, ProvisionRequest};
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};

use super::api::{AppIdentity, ManagementApi};

/// Drives one provisioning request through the management API.
pub struct Provisioner<M> {
    api: M,
}

impl<M: ManagementApi> Provisioner<M> {
    pub fn new(api: M) -> Self {
        Self { api }
    }

    pub async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutput, ProvisionError> {
        let tenant_id = match &request.tenant_id {
            Some(tenant) => tenant.clone(),
            None => self.api.resolve_tenant(&request.subscription_id).await?,
        };
        tracing::debug!(
            subscription = request.subscription_id.as_str(),
            tenant = tenant_id.as_str(),
            "tenant resolved"
        );

        let identity = match &request.app_id {
            Some(app_id) => AppIdentity {
                app_id: app_id.clone(),
                password: request
                    .app_password
                    .as_ref()
                    .map(|p| p.expose_secret().to_string())
                    .unwrap_or_default(),
            },
            None => {
                let password = request
                    .app_password
                    .as_ref()
                    .ok_or(ProvisionError::MissingAppPassword)?;
                self.api
                    .create_app_identity(&request.resource_name, password.expose_secret())
                    .await?
            }
        };

        let group = request.resource_group_or_default();
        self.api
            .ensure_resource_group(group, &request.location)
            .await?;

        let derived = DerivedResourceNames::derive(&request.resource_name, &request.flags);
        let (template, parameters) = deployment_template(request, &derived, &identity);

        self.api
            .validate_template(group, &template, &parameters)
            .await?;

        let deployment = format!("{}-deployment", request.resource_name);
        tracing::info!(
            group,
            deployment = deployment.as_str(),
            location = request.location.as_str(),
            "deploying resource template"
        );
        self.api
            .deploy_template(group, &deployment, &template, &parameters)
            .await?;

        let mut warnings = Vec::new();
        if request.flags.create_app_insights {
            if let Err(e) = self.link_monitoring(group, &derived).await {
                tracing::warn!(
                    error = %e,
                    "monitoring link failed; primary resources remain usable"
                );
                warnings.push(format!("monitoring link failed: {e}"));
            }
        }

        let outputs = self.api.deployment_outputs(group, &deployment).await?;
        let mut settings = flatten_outputs(&outputs);
        if settings.is_empty() {
            let operation_errors = self
                .api
                .deployment_operation_errors(group, &deployment)
                .await?;
            return Err(ProvisionError::NoOutputs { operation_errors });
        }

        settings.insert(
            "MicrosoftAppId".to_string(),
            Value::String(identity.app_id.clone()),
        );
        settings.insert(
            "MicrosoftAppPassword".to_string(),
            Value::String(identity.password.clone()),
        );
        settings.insert("tenantId".to_string(), Value::String(tenant_id));

        Ok(ProvisionOutput {
            settings: Value::Object(settings),
            resource_group: group.to_string(),
            derived,
            warnings,
        })
    }

    async fn link_monitoring(
        &self,
        group: &str,
        derived: &DerivedResourceNames,
    ) -> Result<(), ProvisionError> {
        let component = derived
            .app_insights
            .as_deref()
            .unwrap_or(&derived.web_app);
        let creds = self.api.monitoring_credentials(group, component).await?;
        self.api
            .link_monitoring(group, &derived.web_app, &creds)
            .await
    }
}

/// Build the declarative deployment template and its parameter payload
/// from the request's creation flags.
fn deployment_template(
    request: &ProvisionRequest,
    derived: &DerivedResourceNames,
    identity: &AppIdentity,
) -> (Value, Value) {
    let mut resources = vec![
        json!({
            "type": "Microsoft.Web/serverfarms",
            "apiVersion": "2021-02-01",
            "name": derived.service_plan,
            "location": "[parameters('location')]",
            "sku": {"name": "S1"}
        }),
        json!({
            "type": "Microsoft.Web/sites",
            "apiVersion": "2021-02-01",
            "name": derived.web_app,
            "location": "[parameters('location')]",
            "dependsOn": [derived.service_plan],
            "properties": {
                "serverFarmId": derived.service_plan,
                "siteConfig": {
                    "appSettings": [
                        {"name": "MicrosoftAppId", "value": "[parameters('appId')]"},
                        {"name": "MicrosoftAppPassword", "value": "[parameters('appSecret')]"}
                    ]
                }
            }
        }),
    ];

    if let Some(storage) = &derived.storage_account {
        resources.push(json!({
            "type": "Microsoft.Storage/storageAccounts",
            "apiVersion": "2021-04-01",
            "name": storage,
            "location": "[parameters('location')]",
            "kind": "StorageV2",
            "sku": {"name": "Standard_LRS"}
        }));
    }
    if let Some(insights) = &derived.app_insights {
        resources.push(json!({
            "type": "Microsoft.Insights/components",
            "apiVersion": "2020-02-02",
            "name": insights,
            "location": "[parameters('location')]",
            "kind": "web",
            "properties": {"Application_Type": "web"}
        }));
    }
    if let Some(cosmos) = &derived.cosmos_db {
        resources.push(json!({
            "type": "Microsoft.DocumentDB/databaseAccounts",
            "apiVersion": "2021-04-15",
            "name": cosmos,
            "location": "[parameters('location')]",
            "properties": {"databaseAccountOfferType": "Standard"}
        }));
    }
    if let Some(authoring) = &derived.luis_authoring {
        resources.push(json!({
            "type": "Microsoft.CognitiveServices/accounts",
            "apiVersion": "2021-04-30",
            "name": authoring,
            "location": "[parameters('location')]",
            "kind": "LUIS.Authoring",
            "sku": {"name": "F0"}
        }));
    }
    if let Some(prediction) = &derived.luis_prediction {
        resources.push(json!({
            "type": "Microsoft.CognitiveServices/accounts",
            "apiVersion": "2021-04-30",
            "name": prediction,
            "location": "[parameters('location')]",
            "kind": "LUIS",
            "sku": {"name": "S0"}
        }));
    }

    let template = json!({
        "$schema": "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#",
        "contentVersion": "1.0.0.0",
        "parameters": {
            "appId": {"type": "string"},
            "appSecret": {"type": "securestring"},
            "location": {"type": "string"}
        },
        "resources": resources
    });

    let parameters = json!({
        "appId": {"value": identity.app_id},
        "appSecret": {"value": identity.password},
        "location": {"value": request.location}
    });

    (template, parameters)
}

/// Unpack the management API's `{name: {type, value}}` outputs shape into
/// a flat settings object.
fn flatten_outputs(outputs: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    if let Some(entries) = outputs.as_object() {
        for (name, entry) in entries {
            let value = entry.get("value").cloned().unwrap_or(Value::Null);
            if !value.is_null() {
                flat.insert(name.clone(), value);
            }
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::MonitoringCredentials;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct ScriptedApi {
        fail_validate: bool,
        fail_monitoring: bool,
        empty_outputs: bool,
        monitoring_called: AtomicBool,
    }

    impl ManagementApi for Arc<ScriptedApi> {
        async fn resolve_tenant(&self, subscription_id: &str) -> Result<String, ProvisionError> {
            if subscription_id == "bad-sub" {
                return Err(ProvisionError::TenantResolution {
                    subscription: subscription_id.to_string(),
                    detail: "SubscriptionNotFound".to_string(),
                });
            }
            Ok("tenant-1".to_string())
        }

        async fn create_app_identity(
            &self,
            name: &str,
            password: &str,
        ) -> Result<AppIdentity, ProvisionError> {
            Ok(AppIdentity {
                app_id: format!("app-{name}"),
                password: password.to_string(),
            })
        }

        async fn ensure_resource_group(
            &self,
            _name: &str,
            _location: &str,
        ) -> Result<(), ProvisionError> {
            Ok(())
        }

        async fn validate_template(
            &self,
            _group: &str,
            _template: &Value,
            _parameters: &Value,
        ) -> Result<(), ProvisionError> {
            if self.fail_validate {
                return Err(ProvisionError::TemplateValidation {
                    code: "InvalidTemplate".to_string(),
                    message: "resource name too long".to_string(),
                });
            }
            Ok(())
        }

        async fn deploy_template(
            &self,
            _group: &str,
            _deployment: &str,
            _template: &Value,
            _parameters: &Value,
        ) -> Result<(), ProvisionError> {
            Ok(())
        }

        async fn deployment_outputs(
            &self,
            _group: &str,
            _deployment: &str,
        ) -> Result<Value, ProvisionError> {
            if self.empty_outputs {
                return Ok(json!({}));
            }
            Ok(json!({
                "botWebAppHostname": {"type": "String", "value": "my-bot.azurewebsites.net"},
                "blobStorage": {"type": "Object", "value": {"connectionString": "cs"}}
            }))
        }

        async fn deployment_operation_errors(
            &self,
            _group: &str,
            _deployment: &str,
        ) -> Result<Vec<String>, ProvisionError> {
            Ok(vec!["Microsoft.Storage/storageAccounts: NameTaken".to_string()])
        }

        async fn monitoring_credentials(
            &self,
            _group: &str,
            _component: &str,
        ) -> Result<MonitoringCredentials, ProvisionError> {
            self.monitoring_called.store(true, Ordering::SeqCst);
            if self.fail_monitoring {
                return Err(ProvisionError::Management(
                    "component not ready".to_string(),
                ));
            }
            Ok(MonitoringCredentials {
                instrumentation_key: "ikey".to_string(),
                api_key: "akey".to_string(),
                application_id: "aid".to_string(),
            })
        }

        async fn link_monitoring(
            &self,
            _group: &str,
            _site: &str,
            _creds: &MonitoringCredentials,
        ) -> Result<(), ProvisionError> {
            Ok(())
        }
    }

    fn request(json_body: &str) -> ProvisionRequest {
        serde_json::from_str(json_body).unwrap()
    }

    fn base_request() -> ProvisionRequest {
        request(
            r#"{
                "subscriptionId": "sub-1",
                "accessToken": "tok",
                "resourceName": "my-bot",
                "location": "westus",
                "appPassword": "s3cret"
            }"#,
        )
    }

    #[tokio::test]
    async fn full_run_collects_outputs_and_identity() {
        let api = Arc::new(ScriptedApi::default());
        let provisioner = Provisioner::new(Arc::clone(&api));

        let output = provisioner.provision(&base_request()).await.unwrap();
        assert_eq!(output.resource_group, "my-bot");
        assert_eq!(output.settings["botWebAppHostname"], "my-bot.azurewebsites.net");
        assert_eq!(output.settings["blobStorage"]["connectionString"], "cs");
        assert_eq!(output.settings["MicrosoftAppId"], "app-my-bot");
        assert_eq!(output.settings["tenantId"], "tenant-1");
        assert!(output.warnings.is_empty());
        assert!(api.monitoring_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn app_insights_flag_off_skips_monitoring_entirely() {
        let api = Arc::new(ScriptedApi::default());
        let provisioner = Provisioner::new(Arc::clone(&api));
        let request = request(
            r#"{
                "subscriptionId": "sub-1",
                "accessToken": "tok",
                "resourceName": "my-bot",
                "location": "westus",
                "appPassword": "s3cret",
                "flags": {"createAppInsights": false}
            }"#,
        );

        let output = provisioner.provision(&request).await.unwrap();
        assert!(!api.monitoring_called.load(Ordering::SeqCst));
        assert!(output.derived.app_insights.is_none());
        assert_eq!(output.settings["botWebAppHostname"], "my-bot.azurewebsites.net");
    }

    #[tokio::test]
    async fn monitoring_failure_is_a_warning_not_fatal() {
        let api = Arc::new(ScriptedApi {
            fail_monitoring: true,
            ..ScriptedApi::default()
        });
        let provisioner = Provisioner::new(Arc::clone(&api));

        let output = provisioner.provision(&base_request()).await.unwrap();
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("component not ready"));
    }

    #[tokio::test]
    async fn template_validation_failure_is_fatal_with_detail() {
        let api = Arc::new(ScriptedApi {
            fail_validate: true,
            ..ScriptedApi::default()
        });
        let provisioner = Provisioner::new(Arc::clone(&api));

        let err = provisioner.provision(&base_request()).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("InvalidTemplate"));
        assert!(text.contains("delete the resource group"));
    }

    #[tokio::test]
    async fn missing_app_password_is_a_precondition_failure() {
        let api = Arc::new(ScriptedApi::default());
        let provisioner = Provisioner::new(api);
        let request = request(
            r#"{
                "subscriptionId": "sub-1",
                "accessToken": "tok",
                "resourceName": "my-bot",
                "location": "westus"
            }"#,
        );

        let err = provisioner.provision(&request).await.unwrap_err();
        assert!(matches!(err, ProvisionError::MissingAppPassword));
    }

    #[tokio::test]
    async fn supplied_app_id_skips_registration() {
        let api = Arc::new(ScriptedApi::default());
        let provisioner = Provisioner::new(api);
        let request = request(
            r#"{
                "subscriptionId": "sub-1",
                "accessToken": "tok",
                "resourceName": "my-bot",
                "location": "westus",
                "appId": "existing-app"
            }"#,
        );

        let output = provisioner.provision(&request).await.unwrap();
        assert_eq!(output.settings["MicrosoftAppId"], "existing-app");
    }

    #[tokio::test]
    async fn empty_outputs_enumerate_operation_errors() {
        let api = Arc::new(ScriptedApi {
            empty_outputs: true,
            ..ScriptedApi::default()
        });
        let provisioner = Provisioner::new(api);

        let err = provisioner.provision(&base_request()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::NoOutputs { .. }));
        assert!(err.to_string().contains("NameTaken"));
    }

    #[tokio::test]
    async fn bad_subscription_fails_tenant_resolution() {
        let api = Arc::new(ScriptedApi::default());
        let provisioner = Provisioner::new(api);
        let request = request(
            r#"{
                "subscriptionId": "bad-sub",
                "accessToken": "tok",
                "resourceName": "my-bot",
                "location": "westus",
                "appPassword": "s3cret"
            }"#,
        );

        let err = provisioner.provision(&request).await.unwrap_err();
        assert!(err.to_string().contains("SubscriptionNotFound"));
    }

    #[test]
    fn template_resources_follow_flags() {
        let request = base_request();
        let derived = DerivedResourceNames::derive(
            &request.resource_name,
            &request.flags,
        );
        let identity = AppIdentity {
            app_id: "app".to_string(),
            password: "pw".to_string(),
        };
        let (template, parameters) = deployment_template(&request, &derived, &identity);

        let kinds: Vec<&str> = template["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["type"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"Microsoft.Web/sites"));
        assert!(kinds.contains(&"Microsoft.Insights/components"));
        assert!(kinds.contains(&"Microsoft.CognitiveServices/accounts"));
        // Cosmos defaults off.
        assert!(!kinds.contains(&"Microsoft.DocumentDB/databaseAccounts"));
        assert_eq!(parameters["appId"]["value"], "app");
    }
}
