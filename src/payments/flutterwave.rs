use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use crate::{
    config::FlutterwaveConfig,
    domain::PaymentStatus,
    error::{AppError, Result},
    payments::{provider_message, read_body, scalar_to_string, CardCheckout, CardGateway, CardTransaction},
};

pub const SIGNATURE_HEADER: &str = "verif-hash";
pub const CHARGE_COMPLETED: &str = "charge.completed";

/// Flutterwave Standard (hosted payment page) client.
pub struct FlutterwaveClient {
    http: Client,
    config: FlutterwaveConfig,
}

/// Event pushed to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub id: Value,
    pub tx_ref: String,
    pub status: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

impl FlutterwaveClient {
    pub fn new(http: Client, config: FlutterwaveConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

pub fn map_status(status: &str) -> PaymentStatus {
    match status {
        "successful" => PaymentStatus::Success,
        "failed" => PaymentStatus::Failed,
        _ => PaymentStatus::Processing,
    }
}

/// Compares the `verif-hash` header with the configured secret in constant time.
/// An empty secret never matches.
pub fn signature_matches(secret: &str, provided: Option<&str>) -> bool {
    match provided {
        Some(provided) if !secret.is_empty() => {
            secret.as_bytes().ct_eq(provided.as_bytes()).into()
        }
        _ => false,
    }
}

pub(crate) fn checkout_body(checkout: &CardCheckout) -> Value {
    json!({
        "tx_ref": checkout.tx_ref,
        "amount": checkout.amount,
        "currency": checkout.currency,
        "redirect_url": checkout.redirect_url,
        "customer": {
            "email": checkout.email,
            "phonenumber": checkout.phone_number,
            "name": checkout.name,
        },
        "customizations": {
            "title": "Donation Payment",
            "description": format!("Donation - {}", checkout.tx_ref),
        },
        "meta": {
            "donation_id": checkout.donation_id,
            "receipt_number": checkout.tx_ref,
        },
    })
}

fn is_success(status: reqwest::StatusCode, body: &Value) -> bool {
    status.is_success() && body.get("status").and_then(Value::as_str) == Some("success")
}

pub(crate) fn parse_transaction(data: &Value) -> Result<CardTransaction> {
    let id = data.get("id").and_then(scalar_to_string)
        .ok_or_else(|| AppError::External("Verification response missing transaction id".to_string()))?;
    let tx_ref = data.get("tx_ref").and_then(Value::as_str)
        .ok_or_else(|| AppError::External("Verification response missing tx_ref".to_string()))?;
    let status = data.get("status").and_then(Value::as_str).unwrap_or_default();

    Ok(CardTransaction {
        id,
        tx_ref: tx_ref.to_string(),
        status: map_status(status),
        amount: data.get("amount").and_then(Value::as_f64),
        currency: data.get("currency").and_then(Value::as_str).map(str::to_string),
    })
}

#[async_trait]
impl CardGateway for FlutterwaveClient {
    async fn create_checkout(&self, checkout: &CardCheckout) -> Result<String> {
        let response = self.http
            .post(self.url("/payments"))
            .bearer_auth(&self.config.secret_key)
            .json(&checkout_body(checkout))
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !is_success(status, &body) {
            return Err(AppError::External(
                provider_message(&body).unwrap_or_else(|| "Payment initialization failed".to_string()),
            ));
        }

        body.pointer("/data/link")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::External("No payment link returned".to_string()))
    }

    async fn verify_transaction(&self, transaction_id: &str) -> Result<CardTransaction> {
        let response = self.http
            .get(self.url(&format!(
                "/transactions/{}/verify",
                urlencoding::encode(transaction_id)
            )))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !is_success(status, &body) {
            return Err(AppError::External(
                provider_message(&body).unwrap_or_else(|| "Verification failed".to_string()),
            ));
        }

        parse_transaction(body.get("data").unwrap_or(&Value::Null))
    }

    fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }
}
