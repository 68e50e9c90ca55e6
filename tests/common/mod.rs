#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use benefactor::{
    api,
    config::{PaymentsConfig, PollingConfig},
    domain::{MobileNetwork, PaymentStatus},
    error::{AppError, Result},
    payments::{
        CardCheckout, CardGateway, CardTransaction, Initiation, MobileMoneyProvider, PayRequest,
        ProviderRegistry, StatusReport,
    },
    repository::{SqliteDonationRepository, SqlitePaymentInfoRepository},
    service::ServiceContext,
};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// One connection, so every query sees the same in-memory database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub struct FakeMobileProvider {
    network: MobileNetwork,
    pub status: Mutex<PaymentStatus>,
    pub fail_initiation: bool,
    pub pay_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub last_request: Mutex<Option<PayRequest>>,
}

impl FakeMobileProvider {
    pub fn new(network: MobileNetwork) -> Self {
        Self {
            network,
            status: Mutex::new(PaymentStatus::Processing),
            fail_initiation: false,
            pay_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(network: MobileNetwork) -> Self {
        Self {
            fail_initiation: true,
            ..Self::new(network)
        }
    }

    pub fn set_status(&self, status: PaymentStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn pay_calls(&self) -> usize {
        self.pay_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MobileMoneyProvider for FakeMobileProvider {
    fn network(&self) -> MobileNetwork {
        self.network
    }

    async fn request_to_pay(&self, request: &PayRequest) -> Result<Initiation> {
        self.pay_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if self.fail_initiation {
            return Err(AppError::External("Insufficient funds".to_string()));
        }

        Ok(Initiation {
            provider_reference: format!("{}-ref-{}", self.network, request.external_id),
            status: PaymentStatus::Processing,
        })
    }

    async fn check_status(&self, _provider_reference: &str) -> Result<StatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(StatusReport::new(*self.status.lock().unwrap()))
    }
}

pub struct FakeCardGateway {
    pub transaction: Mutex<Option<CardTransaction>>,
    pub checkout_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub last_checkout: Mutex<Option<CardCheckout>>,
}

impl FakeCardGateway {
    pub fn new() -> Self {
        Self {
            transaction: Mutex::new(None),
            checkout_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            last_checkout: Mutex::new(None),
        }
    }

    pub fn will_verify(&self, transaction: CardTransaction) {
        *self.transaction.lock().unwrap() = Some(transaction);
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardGateway for FakeCardGateway {
    async fn create_checkout(&self, checkout: &CardCheckout) -> Result<String> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_checkout.lock().unwrap() = Some(checkout.clone());
        Ok(format!("https://checkout.test/pay/{}", checkout.tx_ref))
    }

    async fn verify_transaction(&self, transaction_id: &str) -> Result<CardTransaction> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.transaction
            .lock()
            .unwrap()
            .clone()
            .filter(|t| t.id == transaction_id)
            .ok_or_else(|| AppError::External("No transaction was found for this id".to_string()))
    }

    fn webhook_secret(&self) -> &str {
        WEBHOOK_SECRET
    }
}

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub context: Arc<ServiceContext>,
    pub mtn: Arc<FakeMobileProvider>,
    pub airtel: Arc<FakeMobileProvider>,
    pub card: Arc<FakeCardGateway>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::build(FakeMobileProvider::new(MobileNetwork::Mtn), true, PaymentsConfig::default()).await
    }

    pub async fn with_mtn(mtn: FakeMobileProvider) -> anyhow::Result<Self> {
        Self::build(mtn, true, PaymentsConfig::default()).await
    }

    pub async fn with_polling(polling: PollingConfig) -> anyhow::Result<Self> {
        let payments = PaymentsConfig {
            polling,
            ..PaymentsConfig::default()
        };
        Self::build(FakeMobileProvider::new(MobileNetwork::Mtn), true, payments).await
    }

    /// No card gateway registered.
    pub async fn without_card() -> anyhow::Result<Self> {
        Self::build(FakeMobileProvider::new(MobileNetwork::Mtn), false, PaymentsConfig::default()).await
    }

    async fn build(
        mtn: FakeMobileProvider,
        register_card: bool,
        payments: PaymentsConfig,
    ) -> anyhow::Result<Self> {
        let pool = test_pool().await?;
        let mtn = Arc::new(mtn);
        let airtel = Arc::new(FakeMobileProvider::new(MobileNetwork::Airtel));
        let card = Arc::new(FakeCardGateway::new());

        let mut providers = ProviderRegistry::new();
        providers.register_mobile(mtn.clone());
        providers.register_mobile(airtel.clone());
        if register_card {
            providers.register_card(card.clone());
        }

        let context = Arc::new(ServiceContext::new(
            Arc::new(SqliteDonationRepository::new(pool.clone())),
            Arc::new(SqlitePaymentInfoRepository::new(pool.clone())),
            providers,
            &payments,
            "https://donate.test".to_string(),
        ));
        let app = api::create_app(context.clone());

        Ok(Self { app, pool, context, mtn, airtel, card })
    }

    /// Sends a request and returns the status with the JSON body (Null when empty).
    pub async fn send(&self, request: Request<Body>) -> anyhow::Result<(axum::http::StatusCode, Value)> {
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> anyhow::Result<(axum::http::StatusCode, Value)> {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> anyhow::Result<(axum::http::StatusCode, Value)> {
        self.send(Request::get(uri).body(Body::empty())?).await
    }

    pub async fn donation_count(&self) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM donations")
            .fetch_one(&self.pool)
            .await?)
    }
}
