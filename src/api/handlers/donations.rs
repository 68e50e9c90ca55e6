use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::state::AppState,
    domain::{CreateDonationRequest, DonationReceipt},
    error::Result,
    service::donation_service::DonationSubmission,
};

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateDonationRequest>,
) -> Result<(StatusCode, Json<DonationSubmission>)> {
    let submission = state.service_context.donation_service.submit(request).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_number): Path<String>,
) -> Result<Json<DonationReceipt>> {
    let receipt = state
        .service_context
        .donation_service
        .find_receipt(&receipt_number)
        .await?;

    Ok(Json(receipt))
}
