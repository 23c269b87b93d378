//! QnaBuildClient -- concrete [`QnaModelBuilder`] implementation for the
//! knowledge-base service.
//!
//! Per source file: import a knowledge base from the cross-trained
//! markdown, poll the long-running create operation, publish the
//! knowledge base, and fetch the runtime endpoint key once per build.

use std::time::Duration;

use botlaunch_core::pipeline::{BuiltModel, QnaModelBuilder};
use botlaunch_types::error::PublishError;
use botlaunch_types::profile::QnaCredentials;
use botlaunch_types::project::ProjectFile;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::remote::error_detail;

/// Default service endpoint when the profile does not pin one.
const DEFAULT_ENDPOINT: &str = "https://westus.api.cognitive.microsoft.com";

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Create-operation poll cadence and budget.
const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
const OPERATION_POLL_ATTEMPTS: u32 = 150;

/// A long-running knowledge-base operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    operation_state: String,
    operation_id: String,
    #[serde(default)]
    resource_location: Option<String>,
    #[serde(default)]
    error_response: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointKeys {
    primary_endpoint_key: String,
}

/// Knowledge-base API client.
pub struct QnaBuildClient {
    client: reqwest::Client,
    base_url_override: Option<String>,
}

impl QnaBuildClient {
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

    /// Override the service endpoint (tests, sovereign clouds).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    fn base_url(&self, creds: &QnaCredentials) -> String {
        self.base_url_override
            .clone()
            .or_else(|| creds.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Knowledge-base naming convention: `{project}-{dialog}.qna`.
    fn kb_name(project: &str, dialog: &str) -> String {
        format!("{project}-{dialog}.qna")
    }

    /// Extract the knowledge-base id from an operation's
    /// `/knowledgebases/{id}` resource location.
    fn kb_id_from_location(location: &str) -> Option<String> {
        location
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .map(String::from)
    }

    async fn expect_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PublishError> {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(PublishError::RemoteService {
                service: "qna".to_string(),
                detail: error_detail(status, &body),
            });
        }
        serde_json::from_str(&body).map_err(|e| PublishError::RemoteService {
            service: "qna".to_string(),
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
            service: "qna".to_string(),
            detail: error_detail(status, &body),
        })
    }

    async fn import_kb(
        &self,
        base: &str,
        key: &str,
        kb_name: &str,
        content: &str,
    ) -> Result<String, PublishError> {
        let url = format!("{base}/qnamaker/v4.0/knowledgebases/import");
        let response = self
            .client
            .post(&url)
            .query(&[("kbName", kb_name)])
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(reqwest::header::CONTENT_TYPE, "text/markdown")
            .body(content.to_string())
            .send()
            .await
            .map_err(transport)?;
        let operation: Operation = Self::expect_json(response).await?;
        self.wait_for_operation(base, key, operation).await
    }

    async fn wait_for_operation(
        &self,
        base: &str,
        key: &str,
        mut operation: Operation,
    ) -> Result<String, PublishError> {
        for _ in 0..OPERATION_POLL_ATTEMPTS {
            match operation.operation_state.as_str() {
                "Succeeded" => {
                    return operation
                        .resource_location
                        .as_deref()
                        .and_then(Self::kb_id_from_location)
                        .ok_or_else(|| PublishError::RemoteService {
                            service: "qna".to_string(),
                            detail: "operation succeeded without a resource location".to_string(),
                        });
                }
                "Failed" => {
                    let detail = operation
                        .error_response
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "knowledge-base operation failed".to_string());
                    return Err(PublishError::RemoteService {
                        service: "qna".to_string(),
                        detail,
                    });
                }
                _ => {}
            }

            tokio::time::sleep(OPERATION_POLL_INTERVAL).await;
            let url = format!(
                "{base}/qnamaker/v4.0/operations/{}",
                operation.operation_id
            );
            let response = self
                .client
                .get(&url)
                .header(SUBSCRIPTION_KEY_HEADER, key)
                .send()
                .await
                .map_err(transport)?;
            operation = Self::expect_json(response).await?;
        }

        Err(PublishError::RemoteService {
            service: "qna".to_string(),
            detail: "knowledge-base operation did not complete in time".to_string(),
        })
    }

    async fn publish_kb(&self, base: &str, key: &str, kb_id: &str) -> Result<(), PublishError> {
        let url = format!("{base}/qnamaker/v4.0/knowledgebases/{kb_id}");
        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .send()
            .await
            .map_err(transport)?;
        Self::expect_ok(response).await
    }

    async fn endpoint_key(&self, base: &str, key: &str) -> Result<String, PublishError> {
        let url = format!("{base}/qnamaker/v4.0/endpointkeys");
        let response = self
            .client
            .get(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .send()
            .await
            .map_err(transport)?;
        let keys: EndpointKeys = Self::expect_json(response).await?;
        Ok(keys.primary_endpoint_key)
    }
}

impl Default for QnaBuildClient {
    fn default() -> Self {
        Self::new()
    }
}

fn transport(e: reqwest::Error) -> PublishError {
    PublishError::RemoteService {
        service: "qna".to_string(),
        detail: e.to_string(),
    }
}

impl QnaModelBuilder for QnaBuildClient {
    async fn build(
        &self,
        files: &[ProjectFile],
        creds: &QnaCredentials,
        project: &str,
    ) -> Result<Vec<BuiltModel>, PublishError> {
        let base = self.base_url(creds);
        let key = creds
            .subscription_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();

        let endpoint_key = self.endpoint_key(&base, &key).await?;
        let mut models = Vec::with_capacity(files.len());

        for file in files {
            let dialog = file.stem().to_string();
            let kb_name = Self::kb_name(project, &dialog);

            tracing::debug!(kb = kb_name.as_str(), "importing knowledge base");
            let kb_id = self.import_kb(&base, &key, &kb_name, &file.content).await?;
            self.publish_kb(&base, &key, &kb_id).await?;

            models.push(BuiltModel {
                dialog,
                model_id: kb_id,
                endpoint: Some(base.clone()),
                endpoint_key: Some(endpoint_key.clone()),
            });
        }

        Ok(models)
    }
}
