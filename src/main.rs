use std::{sync::Arc, time::Duration};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use benefactor::{
    api,
    config::Settings,
    payments::{AirtelMoneyClient, FlutterwaveClient, MtnMomoClient, ProviderRegistry},
    repository::{SqliteDonationRepository, SqlitePaymentInfoRepository},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "benefactor=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Benefactor server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Initialize repositories
    let donation_repo = Arc::new(SqliteDonationRepository::new(db_pool.clone()));
    let payment_info_repo = Arc::new(SqlitePaymentInfoRepository::new(db_pool.clone()));

    // Register whichever payment providers are configured
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.payments.request_timeout_secs))
        .build()?;
    let mut providers = ProviderRegistry::new();

    if let Some(mtn) = settings.mtn.clone() {
        tracing::info!("MTN Mobile Money enabled ({})", mtn.target_environment);
        providers.register_mobile(Arc::new(MtnMomoClient::new(
            http.clone(),
            mtn,
            settings.payments.currency.clone(),
        )));
    } else {
        tracing::info!("MTN Mobile Money not configured");
    }

    if let Some(airtel) = settings.airtel.clone() {
        tracing::info!("Airtel Money enabled");
        providers.register_mobile(Arc::new(AirtelMoneyClient::new(
            http.clone(),
            airtel,
            settings.payments.country.clone(),
            settings.payments.currency.clone(),
        )));
    } else {
        tracing::info!("Airtel Money not configured");
    }

    if let Some(flutterwave) = settings.flutterwave.clone() {
        tracing::info!("Flutterwave card payments enabled");
        providers.register_card(Arc::new(FlutterwaveClient::new(http.clone(), flutterwave)));
    } else {
        tracing::info!("Flutterwave card payments not configured");
    }

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        donation_repo,
        payment_info_repo,
        providers,
        &settings.payments,
        settings.server.base_url.clone(),
    ));

    let app = api::create_app(service_context.clone());

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop any status polling still in flight
    service_context.poller.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
