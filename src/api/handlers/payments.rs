use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    api::state::AppState,
    domain::{ManualInstructions, MobileNetwork, PaymentStatus},
    error::{AppError, Result},
    payments::{PollSnapshot, StatusReport},
    service::payment_service::MobileInitiationRequest,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub reference_id: String,
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: PaymentStatus,
    pub details: StatusReport,
}

fn parse_network(provider: &str) -> Result<MobileNetwork> {
    match provider {
        "mtn" => Ok(MobileNetwork::Mtn),
        "airtel" => Ok(MobileNetwork::Airtel),
        other => Err(AppError::BadRequest(format!("Unsupported provider: {}", other))),
    }
}

pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<MobileInitiationRequest>,
) -> Result<Json<Value>> {
    let initiation = state
        .service_context
        .payment_service
        .initiate_mobile(request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment initiated successfully. Please check your phone to complete the payment.",
        "referenceId": initiation.reference_id,
        "status": initiation.status,
    })))
}

pub async fn status(
    State(state): State<AppState>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<StatusResponse>> {
    if request.reference_id.trim().is_empty() {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    }
    let network = parse_network(&request.provider)?;

    let report = state
        .service_context
        .status_service
        .check_mobile(&request.reference_id, network)
        .await?;

    Ok(Json(StatusResponse {
        success: true,
        status: report.status,
        details: report,
    }))
}

pub async fn poll_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PollSnapshot>> {
    state
        .service_context
        .poller
        .snapshot(&reference)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No status polling for this reference".to_string()))
}

pub async fn cancel_poll(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<StatusCode> {
    if state.service_context.poller.cancel(&reference).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("No active status polling for this reference".to_string()))
    }
}

pub async fn manual_instructions(
    State(state): State<AppState>,
) -> Result<Json<ManualInstructions>> {
    let instructions = state
        .service_context
        .donation_service
        .manual_instructions()
        .await?;

    Ok(Json(instructions))
}
