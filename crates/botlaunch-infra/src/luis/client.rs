//! LuisBuildClient -- concrete [`LuModelBuilder`] implementation for the
//! language-understanding authoring API.
//!
//! Per source file: import an application from the cross-trained content,
//! train it, poll until training settles, publish the production slot, and
//! (separately) bind the app to the runtime prediction resource. The
//! authoring key is read from the profile credentials at call time and
//! never stored on the client.

use std::time::Duration;

use botlaunch_core::pipeline::{BuiltModel, LuModelBuilder};
use botlaunch_types::error::PublishError;
use botlaunch_types::profile::LuCredentials;
use botlaunch_types::project::ProjectFile;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use crate::remote::error_detail;

use super::types::{
    training_complete, training_failure, AzureAccountBody, PublishBody, TrainingStatusEntry,
};

/// Version id used for every imported application.
const VERSION_ID: &str = "0.1";

/// Training status poll cadence and budget.
const TRAIN_POLL_INTERVAL: Duration = Duration::from_secs(2);
const TRAIN_POLL_ATTEMPTS: u32 = 150;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Authoring API client.
pub struct LuisBuildClient {
    client: reqwest::Client,
    base_url_override: Option<String>,
}

impl LuisBuildClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url_override: None,
        }
    }

    /// Override the authoring endpoint (tests, sovereign clouds).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    fn base_url(&self, creds: &LuCredentials) -> Result<String, PublishError> {
        if let Some(base) = &self.base_url_override {
            return Ok(base.clone());
        }
        creds
            .authoring_endpoint()
            .ok_or_else(|| PublishError::RemoteService {
                service: "luis".to_string(),
                detail: "authoring region not configured".to_string(),
            })
    }

    /// Application naming convention: `{project}({environment})-{dialog}.{language}`.
    fn app_name(project: &str, environment: &str, dialog: &str, language: &str) -> String {
        format!("{project}({environment})-{dialog}.{language}")
    }

    async fn expect_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PublishError> {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(PublishError::RemoteService {
                service: "luis".to_string(),
                detail: error_detail(status, &body),
            });
        }
        serde_json::from_str(&body).map_err(|e| PublishError::RemoteService {
            service: "luis".to_string(),
            detail: format!("unexpected response shape: {e}"),
        })
    }

    async fn expect_ok(response: reqwest::Response) -> Result<(), PublishError> {
        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PublishError::RemoteService {
            service: "luis".to_string(),
            detail: error_detail(status, &body),
        })
    }

    async fn import_app(
        &self,
        base: &str,
        key: &str,
        app_name: &str,
        content: &str,
    ) -> Result<String, PublishError> {
        let url = format!("{base}/luis/authoring/v3.0-preview/apps/import");
        let response = self
            .client
            .post(&url)
            .query(&[("appName", app_name)])
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(content.to_string())
            .send()
            .await
            .map_err(transport)?;
        Self::expect_json::<String>(response).await
    }

    async fn train_and_wait(
        &self,
        base: &str,
        key: &str,
        app_id: &str,
    ) -> Result<(), PublishError> {
        let train_url =
            format!("{base}/luis/authoring/v3.0-preview/apps/{app_id}/versions/{VERSION_ID}/train");
        let response = self
            .client
            .post(&train_url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .send()
            .await
            .map_err(transport)?;
        Self::expect_ok(response).await?;

        for _ in 0..TRAIN_POLL_ATTEMPTS {
            tokio::time::sleep(TRAIN_POLL_INTERVAL).await;
            let response = self
                .client
                .get(&train_url)
                .header(SUBSCRIPTION_KEY_HEADER, key)
                .send()
                .await
                .map_err(transport)?;
            let entries: Vec<TrainingStatusEntry> = Self::expect_json(response).await?;

            if let Some(reason) = training_failure(&entries) {
                return Err(PublishError::RemoteService {
                    service: "luis".to_string(),
                    detail: format!("training failed: {reason}"),
                });
            }
            if training_complete(&entries) {
                return Ok(());
            }
        }

        Err(PublishError::RemoteService {
            service: "luis".to_string(),
            detail: "training did not complete in time".to_string(),
        })
    }

    async fn publish_app(&self, base: &str, key: &str, app_id: &str) -> Result<(), PublishError> {
        let url = format!("{base}/luis/authoring/v3.0-preview/apps/{app_id}/publish");
        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .json(&PublishBody {
                version_id: VERSION_ID,
                is_staging: false,
            })
            .send()
            .await
            .map_err(transport)?;
        Self::expect_ok(response).await
    }
}

impl Default for LuisBuildClient {
    fn default() -> Self {
        Self::new()
    }
}

fn transport(e: reqwest::Error) -> PublishError {
    PublishError::RemoteService {
        service: "luis".to_string(),
        detail: e.to_string(),
    }
}

impl LuModelBuilder for LuisBuildClient {
    async fn build(
        &self,
        files: &[ProjectFile],
        creds: &LuCredentials,
        project: &str,
        environment: &str,
        language: &str,
    ) -> Result<Vec<BuiltModel>, PublishError> {
        let base = self.base_url(creds)?;
        let key = creds
            .authoring_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();

        let mut models = Vec::with_capacity(files.len());
        for file in files {
            let dialog = file.stem().to_string();
            let app_name = Self::app_name(project, environment, &dialog, language);

            tracing::debug!(app = app_name.as_str(), "importing language model");
            let app_id = self.import_app(&base, &key, &app_name, &file.content).await?;
            self.train_and_wait(&base, &key, &app_id).await?;
            self.publish_app(&base, &key, &app_id).await?;

            models.push(BuiltModel {
                dialog,
                model_id: app_id,
                endpoint: creds.authoring_endpoint(),
                endpoint_key: creds
                    .endpoint_key
                    .as_ref()
                    .map(|k| k.expose_secret().to_string()),
            });
        }

        Ok(models)
    }

    async fn assign_account(
        &self,
        model: &BuiltModel,
        creds: &LuCredentials,
    ) -> Result<(), PublishError> {
        let Some(resource_name) = creds.resource_name.clone() else {
            tracing::debug!(
                app_id = model.model_id.as_str(),
                "no prediction resource configured, skipping account assignment"
            );
            return Ok(());
        };

        let base = self.base_url(creds)?;
        let key = creds
            .authoring_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();
        let url = format!(
            "{base}/luis/authoring/v3.0-preview/apps/{}/azureaccounts",
            model.model_id
        );
        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &key)
            .json(&AzureAccountBody { resource_name })
            .send()
            .await
            .map_err(transport)?;
        Self::expect_ok(response).await
    }
}
