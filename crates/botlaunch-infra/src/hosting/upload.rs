//! Streaming upload of the packaged bundle.
//!
//! Implements the [`BundleUploader`] port: archives the prepared bundle
//! and streams it to the target's deployment endpoint over an
//! authenticated channel. A 403-class response is translated into the
//! expired-credential error because the remediation is caller-side
//! (refresh the token), unlike transient transport faults.

use std::path::Path;
use std::time::Duration;

use botlaunch_core::pipeline::BundleUploader;
use botlaunch_types::error::PublishError;
use botlaunch_types::profile::{ProxyConfig, PublishProfile};
use secrecy::ExposeSecret;
use tokio_util::io::ReaderStream;

use crate::archive::archive_bundle;
use crate::remote::error_detail;

/// Upload timeout; bundles with a full runtime can run to hundreds of MB.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Deployment upload client.
pub struct UploadClient {
    endpoint_override: Option<String>,
}

impl UploadClient {
    pub fn new() -> Self {
        Self {
            endpoint_override: None,
        }
    }

    /// Override the deployment endpoint (tests, private clouds).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint_override: Some(endpoint.into()),
        }
    }

    fn deploy_endpoint(&self, profile: &PublishProfile) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://{}.scm.azurewebsites.net/api/zipdeploy",
                profile.target_name
            ),
        }
    }

    /// Clients are built per upload because the proxy comes from the
    /// profile, not from process configuration.
    fn build_client(proxy: Option<&ProxyConfig>) -> Result<reqwest::Client, PublishError> {
        let mut builder = reqwest::Client::builder().timeout(UPLOAD_TIMEOUT);
        if let Some(proxy) = proxy {
            let url = format!("http://{}:{}", proxy.host, proxy.port);
            builder = builder.proxy(
                reqwest::Proxy::all(&url)
                    .map_err(|e| PublishError::Io(format!("invalid proxy '{url}': {e}")))?,
            );
        }
        builder
            .build()
            .map_err(|e| PublishError::Io(format!("http client build failed: {e}")))
    }
}

impl Default for UploadClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a deployment response status to the pipeline error taxonomy.
fn classify_status(status: u16, body: &str) -> Result<(), PublishError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(PublishError::CredentialExpired),
        _ => Err(PublishError::RemoteService {
            service: "deploy".to_string(),
            detail: error_detail(status, body),
        }),
    }
}

impl BundleUploader for UploadClient {
    async fn deploy(
        &self,
        bundle_dir: &Path,
        profile: &PublishProfile,
    ) -> Result<(), PublishError> {
        let archive_path = archive_bundle(bundle_dir)?;
        let file = tokio::fs::File::open(&archive_path).await?;
        let len = file.metadata().await?.len();

        let endpoint = self.deploy_endpoint(profile);
        tracing::info!(
            target = profile.target_name.as_str(),
            endpoint = endpoint.as_str(),
            size_bytes = len,
            "uploading deployment archive"
        );

        let client = Self::build_client(profile.proxy.as_ref())?;
        let response = client
            .post(&endpoint)
            .bearer_auth(profile.access_token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .header(reqwest::header::CONTENT_LENGTH, len)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| PublishError::RemoteService {
                service: "deploy".to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        classify_status(status, &body)
    }
}
