//! Request/response payloads for the language-understanding authoring API.

use serde::{Deserialize, Serialize};

/// One entry of the training status report (one per trained model).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatusEntry {
    #[serde(default)]
    pub model_id: Option<String>,
    pub details: TrainingDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingDetails {
    pub status: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Whether every model finished training successfully.
pub fn training_complete(entries: &[TrainingStatusEntry]) -> bool {
    !entries.is_empty()
        && entries
            .iter()
            .all(|e| matches!(e.details.status.as_str(), "Success" | "UpToDate"))
}

/// The first training failure, if any model failed.
pub fn training_failure(entries: &[TrainingStatusEntry]) -> Option<String> {
    entries
        .iter()
        .find(|e| e.details.status == "Fail")
        .map(|e| {
            e.details
                .failure_reason
                .clone()
                .unwrap_or_else(|| "training failed".to_string())
        })
}

/// Publish request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBody {
    pub version_id: &'static str,
    pub is_staging: bool,
}

/// Account assignment body: binds a trained app to the runtime prediction
/// resource so its key matches the hosting subscription.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAccountBody {
    pub resource_name: String,
}
