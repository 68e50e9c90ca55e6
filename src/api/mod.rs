pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::service::ServiceContext;
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>) -> Router {
    let app_state = AppState::new(service_context);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/api", api_routes())

        .with_state(app_state)

        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // the donation form may be served from another origin
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/donations", donation_routes())
        .nest("/payments", payment_routes())
}

fn donation_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::donations::create))
        .route("/:receipt_number", get(handlers::donations::get_receipt))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(handlers::payments::initiate))
        .route("/status", post(handlers::payments::status))
        .route("/manual-instructions", get(handlers::payments::manual_instructions))
        .route(
            "/poll/:reference",
            get(handlers::payments::poll_status).delete(handlers::payments::cancel_poll),
        )
        .nest("/card", card_routes())
}

fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(handlers::card::initiate))
        .route("/verify", post(handlers::card::verify))
        // Called by the gateway; authenticated by the verif-hash header.
        .route("/webhook", post(handlers::card::webhook))
}
