//! Payment provider adapters and the status poller.
//!
//! Two mobile-money networks (MTN MoMo, Airtel Money) push an approval prompt
//! to the donor's handset and must be polled for the outcome. The card
//! gateway (Flutterwave) hands the donor a hosted payment page and reports
//! back through a verification call and a signed webhook.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    domain::{MobileNetwork, PaymentStatus},
    error::{AppError, Result},
};

pub mod airtel;
pub mod flutterwave;
pub mod mtn;
pub mod poller;
pub mod token_cache;

pub use airtel::AirtelMoneyClient;
pub use flutterwave::FlutterwaveClient;
pub use mtn::MtnMomoClient;
pub use poller::{PaymentPoller, PollHandle, PollOutcome, PollSnapshot, PollState, StatusChecker};

/// A request-to-pay instruction aimed at the donor's handset.
#[derive(Debug, Clone)]
pub struct PayRequest {
    pub amount: i64,
    /// Raw phone number as typed by the donor; adapters strip non-digits.
    pub phone_number: String,
    /// Our reference, shown to the donor in the approval prompt.
    pub reference: String,
    /// Our id for the payment (the donation id).
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initiation {
    /// Identifier to query the provider's status endpoint with.
    pub provider_reference: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusReport {
    pub fn new(status: PaymentStatus) -> Self {
        Self {
            status,
            amount: None,
            currency: None,
            reason: None,
        }
    }
}

#[async_trait]
pub trait MobileMoneyProvider: Send + Sync {
    fn network(&self) -> MobileNetwork;
    async fn request_to_pay(&self, request: &PayRequest) -> Result<Initiation>;
    async fn check_status(&self, provider_reference: &str) -> Result<StatusReport>;
}

/// Hosted payment page session parameters.
#[derive(Debug, Clone)]
pub struct CardCheckout {
    pub tx_ref: String,
    pub donation_id: String,
    pub amount: i64,
    pub currency: String,
    pub redirect_url: String,
    pub email: String,
    pub phone_number: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CardTransaction {
    pub id: String,
    pub tx_ref: String,
    pub status: PaymentStatus,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

#[async_trait]
pub trait CardGateway: Send + Sync {
    /// Returns the hosted payment page URL.
    async fn create_checkout(&self, checkout: &CardCheckout) -> Result<String>;
    async fn verify_transaction(&self, transaction_id: &str) -> Result<CardTransaction>;
    /// Shared secret the gateway echoes in the `verif-hash` header.
    fn webhook_secret(&self) -> &str;
}

/// The providers this deployment has credentials for.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    mobile: HashMap<MobileNetwork, Arc<dyn MobileMoneyProvider>>,
    card: Option<Arc<dyn CardGateway>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_mobile(&mut self, provider: Arc<dyn MobileMoneyProvider>) {
        tracing::info!("Registered mobile money provider: {}", provider.network());
        self.mobile.insert(provider.network(), provider);
    }

    pub fn register_card(&mut self, gateway: Arc<dyn CardGateway>) {
        tracing::info!("Registered card gateway");
        self.card = Some(gateway);
    }

    pub fn mobile(&self, network: MobileNetwork) -> Result<Arc<dyn MobileMoneyProvider>> {
        self.mobile.get(&network).cloned().ok_or_else(|| {
            AppError::ServiceUnavailable(format!("{} payments are not configured", network))
        })
    }

    pub fn card(&self) -> Result<Arc<dyn CardGateway>> {
        self.card.clone().ok_or_else(|| {
            AppError::ServiceUnavailable("Card payments are not configured".to_string())
        })
    }
}

/// Reads a provider response body as JSON, tolerating empty and non-JSON bodies.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<(reqwest::StatusCode, Value)> {
    let status = response.status();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok((status, body))
}

/// Best-effort human message from a provider error payload.
pub(crate) fn provider_message(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.pointer("/status/message"))
        .or_else(|| body.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| body.as_str().map(str::to_string))
}

/// Renders a JSON scalar (provider ids and amounts arrive as either numbers or strings).
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
