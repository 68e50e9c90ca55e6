use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    api::state::AppState,
    error::Result,
    payments::flutterwave::SIGNATURE_HEADER,
    service::payment_service::{CardInitiationRequest, CardVerificationRequest},
};

pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<CardInitiationRequest>,
) -> Result<Json<Value>> {
    let checkout = state
        .service_context
        .payment_service
        .initiate_card(request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment initialized successfully",
        "paymentLink": checkout.payment_link,
        "referenceId": checkout.reference_id,
    })))
}

pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<CardVerificationRequest>,
) -> Result<Json<Value>> {
    let verification = state
        .service_context
        .payment_service
        .verify_card(request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "status": verification.status,
        "amount": verification.amount,
        "currency": verification.currency,
        "transactionId": verification.transaction_id,
        "reference": verification.reference,
    })))
}

// Takes the raw body so nothing is parsed before the signature is checked.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    state
        .service_context
        .payment_service
        .handle_card_webhook(signature, &body)
        .await?;

    Ok(Json(json!({ "status": "success" })))
}
