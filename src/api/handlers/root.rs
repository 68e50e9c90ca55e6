use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Benefactor API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Donation intake and payment reconciliation",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "donations": "/api/donations",
            "payments": "/api/payments"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
