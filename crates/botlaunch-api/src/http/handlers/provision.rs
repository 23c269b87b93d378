//! Provisioning handler.
//!
//! Unlike publishing, provisioning is caller-awaited: the flattened
//! deployment outputs are the response body, so the state machine runs
//! inline in the request.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use botlaunch_core::provision::Provisioner;
use botlaunch_infra::azure::ArmClient;
use botlaunch_types::provision::{ProvisionOutput, ProvisionRequest};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/provision - Create the bot's cloud infrastructure.
pub async fn submit_provision(
    State(_state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<ApiResponse<ProvisionOutput>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    tracing::info!(
        subscription = request.subscription_id.as_str(),
        resource = request.resource_name.as_str(),
        location = request.location.as_str(),
        "provisioning requested"
    );

    let api = ArmClient::new(request.subscription_id.clone(), request.access_token.clone());
    let provisioner = Provisioner::new(api);
    let output = provisioner.provision(&request).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(output, request_id, elapsed))
}
