//! Model train-and-publish steps.
//!
//! Two structurally identical sub-pipelines: language-understanding models
//! and knowledge-base models. Each loads only non-empty sources, invokes a
//! remote builder, and reports every published model through the progress
//! channel. The language-understanding step additionally re-keys each
//! model to the target hosting subscription.
//!
//! Credential policy: zero non-empty sources means the feature is not in
//! use and the step is skipped as success, keys or no keys. Non-empty
//! sources with a missing credential is a fatal, job-terminating error.

use botlaunch_types::error::PublishError;
use botlaunch_types::profile::PublishProfile;
use botlaunch_types::project::ProjectFile;
use serde_json::{json, Map, Value};

use crate::tracker::ProgressReporter;

use super::ports::{BuiltModel, LuModelBuilder, QnaModelBuilder};

/// Train and publish language-understanding models for the bundle.
pub async fn publish_lu<L: LuModelBuilder>(
    builder: &L,
    files: &[ProjectFile],
    profile: &PublishProfile,
    project: &str,
    reporter: &ProgressReporter,
) -> Result<Vec<BuiltModel>, PublishError> {
    let sources: Vec<ProjectFile> = files
        .iter()
        .filter(|f| f.is_lu() && f.is_non_empty())
        .cloned()
        .collect();

    if sources.is_empty() {
        reporter.log("no language-understanding sources, skipping model training");
        return Ok(Vec::new());
    }

    let creds = match profile.luis.as_ref().filter(|c| c.can_train()) {
        Some(creds) => creds,
        None => {
            return Err(PublishError::MissingCredentials {
                service: "luis".to_string(),
                count: sources.len(),
            });
        }
    };

    reporter.log(format!(
        "training {} language-understanding model(s)",
        sources.len()
    ));

    let language = profile.default_language.as_deref().unwrap_or("en-us");
    let models = builder
        .build(
            &sources,
            creds,
            project,
            profile.environment_or_default(),
            language,
        )
        .await?;

    for model in &models {
        builder.assign_account(model, creds).await?;
        reporter.log(format!(
            "published language model '{}' ({})",
            model.dialog, model.model_id
        ));
    }

    Ok(models)
}

/// Build and publish knowledge-base models for the bundle.
pub async fn publish_qna<Q: QnaModelBuilder>(
    builder: &Q,
    files: &[ProjectFile],
    profile: &PublishProfile,
    project: &str,
    reporter: &ProgressReporter,
) -> Result<Vec<BuiltModel>, PublishError> {
    let sources: Vec<ProjectFile> = files
        .iter()
        .filter(|f| f.is_qna() && f.is_non_empty())
        .cloned()
        .collect();

    if sources.is_empty() {
        reporter.log("no knowledge-base sources, skipping knowledge-base build");
        return Ok(Vec::new());
    }

    let creds = match profile.qna.as_ref().filter(|c| c.can_build()) {
        Some(creds) => creds,
        None => {
            return Err(PublishError::MissingCredentials {
                service: "qna".to_string(),
                count: sources.len(),
            });
        }
    };

    let models = builder.build(&sources, creds, project).await?;

    for model in &models {
        reporter.log(format!(
            "published knowledge base '{}' ({})",
            model.dialog, model.model_id
        ));
    }

    Ok(models)
}

/// Recognizer settings written back into the bundle so the runtime can
/// reach the hosted models. Merged at "extra" precedence -- a profile may
/// still pin endpoints explicitly.
pub fn recognizer_settings(lu: &[BuiltModel], qna: &[BuiltModel]) -> Value {
    let mut root = Map::new();

    if !lu.is_empty() {
        let mut section = Map::new();
        let mut app_ids = Map::new();
        for model in lu {
            app_ids.insert(model.dialog.clone(), Value::String(model.model_id.clone()));
        }
        section.insert("appIds".to_string(), Value::Object(app_ids));
        if let Some(endpoint) = lu.iter().find_map(|m| m.endpoint.clone()) {
            section.insert("endpoint".to_string(), Value::String(endpoint));
        }
        if let Some(key) = lu.iter().find_map(|m| m.endpoint_key.clone()) {
            section.insert("endpointKey".to_string(), Value::String(key));
        }
        root.insert("luis".to_string(), Value::Object(section));
    }

    if !qna.is_empty() {
        let mut section = Map::new();
        let mut kb_ids = Map::new();
        for model in qna {
            kb_ids.insert(model.dialog.clone(), Value::String(model.model_id.clone()));
        }
        section.insert("knowledgebases".to_string(), Value::Object(kb_ids));
        if let Some(endpoint) = qna.iter().find_map(|m| m.endpoint.clone()) {
            section.insert("hostname".to_string(), Value::String(endpoint));
        }
        if let Some(key) = qna.iter().find_map(|m| m.endpoint_key.clone()) {
            section.insert("endpointKey".to_string(), Value::String(key));
        }
        root.insert("qna".to_string(), Value::Object(section));
    }

    if root.is_empty() {
        json!({})
    } else {
        Value::Object(root)
    }
}
