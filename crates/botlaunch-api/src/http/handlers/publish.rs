//! Publish submission, status polling, and history handlers.
//!
//! The submit call acknowledges immediately; the pipeline runs detached
//! and callers poll for status. The served HTTP status mirrors the job's
//! own numeric status (202 accepted, 200 success, 500 failed, 404 never
//! published).

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use botlaunch_types::job::{JobId, JobKey, PublishJob};
use botlaunch_types::profile::PublishRequest;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Query parameters for status polling.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    /// Poll a specific job instead of the newest one for the pair.
    #[serde(default)]
    pub job_id: Option<JobId>,
}

fn job_http_status(job: &PublishJob) -> StatusCode {
    StatusCode::from_u16(job.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// POST /api/v1/bots/{bot_id}/publish/{profile} - Submit a publish.
pub async fn submit_publish(
    State(state): State<AppState>,
    Path((bot_id, profile_name)): Path<(String, String)>,
    Json(mut request): Json<PublishRequest>,
) -> Result<ApiResponse<PublishJob>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    // The path names the profile; the body field follows it.
    request.profile.profile_name = profile_name;

    let job = state.tracker.submit(&bot_id, request).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let status = job_http_status(&job);
    Ok(ApiResponse::with_status(job, request_id, elapsed, status))
}

/// GET /api/v1/bots/{bot_id}/publish/{profile}/status - Poll job status.
pub async fn poll_status(
    State(state): State<AppState>,
    Path((bot_id, profile_name)): Path<(String, String)>,
    Query(query): Query<StatusQuery>,
) -> Result<ApiResponse<PublishJob>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let key = JobKey::new(bot_id, profile_name);
    let job = state.tracker.poll(&key, query.job_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let status = job_http_status(&job);
    Ok(ApiResponse::with_status(job, request_id, elapsed, status))
}

/// GET /api/v1/bots/{bot_id}/publish/{profile}/history - Publish history,
/// newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Path((bot_id, profile_name)): Path<(String, String)>,
) -> Result<ApiResponse<Vec<botlaunch_types::job::HistoryEntry>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let key = JobKey::new(bot_id, profile_name);
    let history = state.tracker.history(&key).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(history, request_id, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use botlaunch_types::config::ServiceConfig;
    use botlaunch_types::job::JobStatus;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn test_state(tmp: &TempDir) -> AppState {
        let config = ServiceConfig {
            persist_history: false,
            // Unroutable endpoint: uploads fail fast without leaving the
            // machine, which is all the detachment tests need.
            deploy_endpoint: Some("http://127.0.0.1:9/deploy".to_string()),
            ..ServiceConfig::default()
        };
        AppState::from_config(tmp.path().to_path_buf(), config)
            .await
            .unwrap()
    }

    fn request_body(access_token: &str) -> Json<PublishRequest> {
        Json(
            serde_json::from_str(&format!(
                r#"{{
                    "botName": "my-bot",
                    "profile": {{
                        "profileName": "ignored",
                        "targetName": "my-bot-app",
                        "accessToken": "{access_token}",
                        "settings": {{}}
                    }},
                    "files": []
                }}"#
            ))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn submit_without_token_returns_500_with_history() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp).await;

        let response = submit_publish(
            State(state.clone()),
            Path(("bot-1".to_string(), "prod".to_string())),
            request_body(" "),
        )
        .await
        .unwrap();

        assert_eq!(response.http_status, StatusCode::INTERNAL_SERVER_ERROR);
        let job = response.data.unwrap();
        assert!(job.message.contains("accessToken"));
        // Profile name came from the path, not the body.
        assert_eq!(job.profile_name, "prod");

        let history = list_history(
            State(state),
            Path(("bot-1".to_string(), "prod".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(history.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_acknowledges_then_poll_tracks_the_job() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp).await;

        let response = submit_publish(
            State(state.clone()),
            Path(("bot-1".to_string(), "prod".to_string())),
            request_body("tok"),
        )
        .await
        .unwrap();
        assert_eq!(response.http_status, StatusCode::ACCEPTED);
        let submitted = response.data.unwrap();

        // The empty project trains nothing; the pipeline reaches the
        // upload step, which fails fast against the unroutable endpoint.
        // Either way the job must leave the live table on its own.
        for _ in 0..800 {
            let polled = poll_status(
                State(state.clone()),
                Path(("bot-1".to_string(), "prod".to_string())),
                Query(StatusQuery {
                    job_id: Some(submitted.id),
                }),
            )
            .await
            .unwrap();
            let job = polled.data.unwrap();
            if job.status != JobStatus::Accepted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn poll_unknown_pair_is_404() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp).await;

        let response = poll_status(
            State(state),
            Path(("ghost".to_string(), "prod".to_string())),
            Query(StatusQuery { job_id: None }),
        )
        .await
        .unwrap();
        assert_eq!(response.http_status, StatusCode::NOT_FOUND);
        assert_eq!(response.data.unwrap().status, JobStatus::Unknown);
    }
}
