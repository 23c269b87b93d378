//! ArmClient -- concrete [`ManagementApi`] implementation against the
//! resource-manager REST surface.
//!
//! One client instance serves one provisioning request: it carries the
//! subscription id and the caller's management credential. Base URLs are
//! overridable for tests and sovereign clouds.

use std::time::Duration;

use botlaunch_core::provision::{AppIdentity, ManagementApi, MonitoringCredentials};
use botlaunch_types::error::ProvisionError;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const MANAGEMENT_BASE: &str = "https://management.azure.com";
const GRAPH_BASE: &str = "https://graph.microsoft.com";

const RESOURCE_API_VERSION: &str = "2021-04-01";
const INSIGHTS_API_VERSION: &str = "2015-05-01";
const SITES_API_VERSION: &str = "2021-02-01";

/// Deployment provisioning-state poll cadence and budget.
const DEPLOY_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEPLOY_POLL_ATTEMPTS: u32 = 240;

/// Management API client for one subscription.
pub struct ArmClient {
    client: reqwest::Client,
    subscription_id: String,
    access_token: SecretString,
    management_base: String,
    graph_base: String,
}

impl ArmClient {
    pub fn new(subscription_id: impl Into<String>, access_token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            subscription_id: subscription_id.into(),
            access_token,
            management_base: MANAGEMENT_BASE.to_string(),
            graph_base: GRAPH_BASE.to_string(),
        }
    }

    /// Override both service bases (tests, sovereign clouds).
    pub fn with_bases(
        mut self,
        management_base: impl Into<String>,
        graph_base: impl Into<String>,
    ) -> Self {
        self.management_base = management_base.into();
        self.graph_base = graph_base.into();
        self
    }

    fn group_url(&self, group: &str, suffix: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourcegroups/{group}{suffix}",
            self.management_base, self.subscription_id
        )
    }

    fn deployment_url(&self, group: &str, deployment: &str, suffix: &str) -> String {
        self.group_url(
            group,
            &format!("/providers/Microsoft.Resources/deployments/{deployment}{suffix}"),
        )
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProvisionError> {
        let response = request
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| ProvisionError::Management(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(ProvisionError::Management(crate::remote::error_detail(
                status, &body,
            )));
        }
        serde_json::from_str(&body).map_err(|e| {
            ProvisionError::Management(format!("unexpected response shape: {e}"))
        })
    }

    async fn send_ok(&self, request: reqwest::RequestBuilder) -> Result<(), ProvisionError> {
        let response = request
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| ProvisionError::Management(e.to_string()))?;
        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProvisionError::Management(crate::remote::error_detail(
            status, &body,
        )))
    }

    async fn wait_for_deployment(
        &self,
        group: &str,
        deployment: &str,
    ) -> Result<(), ProvisionError> {
        let url = self.deployment_url(
            group,
            deployment,
            &format!("?api-version={RESOURCE_API_VERSION}"),
        );
        for _ in 0..DEPLOY_POLL_ATTEMPTS {
            let state: Value = self.send_json(self.client.get(&url)).await?;
            match state
                .pointer("/properties/provisioningState")
                .and_then(Value::as_str)
            {
                Some("Succeeded") => return Ok(()),
                Some("Failed") | Some("Canceled") => {
                    let detail = state
                        .pointer("/properties/error")
                        .map(Value::to_string)
                        .unwrap_or_else(|| "deployment failed".to_string());
                    return Err(ProvisionError::Deployment(detail));
                }
                _ => tokio::time::sleep(DEPLOY_POLL_INTERVAL).await,
            }
        }
        Err(ProvisionError::Deployment(
            "deployment did not complete in time".to_string(),
        ))
    }
}

/// Map a validation response body onto the structured validation error.
fn validation_error(status: u16, body: &str) -> ProvisionError {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: Option<Detail>,
    }
    #[derive(serde::Deserialize)]
    struct Detail {
        code: Option<String>,
        message: Option<String>,
    }

    if let Ok(Envelope { error: Some(detail) }) = serde_json::from_str::<Envelope>(body) {
        return ProvisionError::TemplateValidation {
            code: detail.code.unwrap_or_else(|| status.to_string()),
            message: detail.message.unwrap_or_default(),
        };
    }
    ProvisionError::TemplateValidation {
        code: status.to_string(),
        message: body.trim().to_string(),
    }
}

/// Collect per-operation failure lines from a deployment-operations list.
fn operation_errors(value: &Value) -> Vec<String> {
    value
        .pointer("/value")
        .and_then(Value::as_array)
        .map(|operations| {
            operations
                .iter()
                .filter_map(|op| {
                    let error = op.pointer("/properties/statusMessage/error")?;
                    let resource = op
                        .pointer("/properties/targetResource/resourceType")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown resource");
                    let code = error.get("code").and_then(Value::as_str).unwrap_or("error");
                    let message = error.get("message").and_then(Value::as_str).unwrap_or("");
                    Some(format!("{resource}: {code} {message}").trim_end().to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

impl ManagementApi for ArmClient {
    async fn resolve_tenant(&self, subscription_id: &str) -> Result<String, ProvisionError> {
        let url = format!(
            "{}/subscriptions/{subscription_id}?api-version=2020-01-01",
            self.management_base
        );
        let body: Value = self
            .send_json(self.client.get(&url))
            .await
            .map_err(|e| ProvisionError::TenantResolution {
                subscription: subscription_id.to_string(),
                detail: e.to_string(),
            })?;
        body.get("tenantId")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ProvisionError::TenantResolution {
                subscription: subscription_id.to_string(),
                detail: "response carried no tenantId".to_string(),
            })
    }

    async fn create_app_identity(
        &self,
        name: &str,
        password: &str,
    ) -> Result<AppIdentity, ProvisionError> {
        let url = format!("{}/v1.0/applications", self.graph_base);
        let body: Value = self
            .send_json(self.client.post(&url).json(&json!({
                "displayName": name,
                "signInAudience": "AzureADMultipleOrgs"
            })))
            .await
            .map_err(|e| ProvisionError::AppIdentity(e.to_string()))?;

        let app_id = body
            .get("appId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProvisionError::AppIdentity("registration returned no appId".to_string())
            })?;
        Ok(AppIdentity {
            app_id: app_id.to_string(),
            password: password.to_string(),
        })
    }

    async fn ensure_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> Result<(), ProvisionError> {
        let url = self.group_url(name, &format!("?api-version={RESOURCE_API_VERSION}"));
        self.send_ok(self.client.put(&url).json(&json!({"location": location})))
            .await
            .map_err(|e| ProvisionError::ResourceGroup {
                name: name.to_string(),
                detail: e.to_string(),
            })
    }

    async fn validate_template(
        &self,
        group: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<(), ProvisionError> {
        let url = self.deployment_url(
            group,
            "validation",
            &format!("/validate?api-version={RESOURCE_API_VERSION}"),
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({
                "properties": {
                    "mode": "Incremental",
                    "template": template,
                    "parameters": parameters
                }
            }))
            .send()
            .await
            .map_err(|e| ProvisionError::Management(e.to_string()))?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(validation_error(status, &body))
    }

    async fn deploy_template(
        &self,
        group: &str,
        deployment: &str,
        template: &Value,
        parameters: &Value,
    ) -> Result<(), ProvisionError> {
        let url = self.deployment_url(
            group,
            deployment,
            &format!("?api-version={RESOURCE_API_VERSION}"),
        );
        self.send_ok(self.client.put(&url).json(&json!({
            "properties": {
                "mode": "Incremental",
                "template": template,
                "parameters": parameters
            }
        })))
        .await
        .map_err(|e| ProvisionError::Deployment(e.to_string()))?;

        self.wait_for_deployment(group, deployment).await
    }

    async fn deployment_outputs(
        &self,
        group: &str,
        deployment: &str,
    ) -> Result<Value, ProvisionError> {
        let url = self.deployment_url(
            group,
            deployment,
            &format!("?api-version={RESOURCE_API_VERSION}"),
        );
        let state: Value = self.send_json(self.client.get(&url)).await?;
        Ok(state
            .pointer("/properties/outputs")
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    async fn deployment_operation_errors(
        &self,
        group: &str,
        deployment: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        let url = self.deployment_url(
            group,
            deployment,
            &format!("/operations?api-version={RESOURCE_API_VERSION}"),
        );
        let body: Value = self.send_json(self.client.get(&url)).await?;
        Ok(operation_errors(&body))
    }

    async fn monitoring_credentials(
        &self,
        group: &str,
        component: &str,
    ) -> Result<MonitoringCredentials, ProvisionError> {
        let component_url = self.group_url(
            group,
            &format!(
                "/providers/microsoft.insights/components/{component}?api-version={INSIGHTS_API_VERSION}"
            ),
        );
        let body: Value = self.send_json(self.client.get(&component_url)).await?;
        let instrumentation_key = body
            .pointer("/properties/InstrumentationKey")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProvisionError::Management("component has no instrumentation key".to_string())
            })?
            .to_string();
        let application_id = body
            .pointer("/properties/AppId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let key_url = self.group_url(
            group,
            &format!(
                "/providers/microsoft.insights/components/{component}/apikeys?api-version={INSIGHTS_API_VERSION}"
            ),
        );
        let key_body: Value = self
            .send_json(self.client.post(&key_url).json(&json!({
                "name": format!("{component}-publish"),
                "linkedReadProperties": [],
                "linkedWriteProperties": []
            })))
            .await?;
        let api_key = key_body
            .get("apiKey")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(MonitoringCredentials {
            instrumentation_key,
            api_key,
            application_id,
        })
    }

    async fn link_monitoring(
        &self,
        group: &str,
        site: &str,
        creds: &MonitoringCredentials,
    ) -> Result<(), ProvisionError> {
        let url = self.group_url(
            group,
            &format!(
                "/providers/Microsoft.Web/sites/{site}/config/appsettings?api-version={SITES_API_VERSION}"
            ),
        );
        self.send_ok(self.client.put(&url).json(&json!({
            "properties": {
                "APPINSIGHTS_INSTRUMENTATIONKEY": creds.instrumentation_key,
                "APPINSIGHTS_APPLICATION_ID": creds.application_id,
                "APPINSIGHTS_API_KEY": creds.api_key,
                "ApplicationInsightsAgent_EXTENSION_VERSION": "~2"
            }
        })))
        .await
    }
}
