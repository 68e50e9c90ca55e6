use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::{
    config::AirtelConfig,
    domain::{digits_only, MobileNetwork, PaymentStatus},
    error::{AppError, Result},
    payments::{
        provider_message, read_body, scalar_to_string,
        token_cache::{AccessToken, TokenCache},
        Initiation, MobileMoneyProvider, PayRequest, StatusReport,
    },
};

/// Airtel Money merchant collection API client.
pub struct AirtelMoneyClient {
    http: Client,
    config: AirtelConfig,
    country: String,
    currency: String,
    tokens: TokenCache,
}

impl AirtelMoneyClient {
    pub fn new(http: Client, config: AirtelConfig, country: String, currency: String) -> Self {
        Self {
            http,
            config,
            country,
            currency,
            tokens: TokenCache::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String> {
        self.tokens
            .get_or_fetch(|| async move {
                let response = self.http
                    .post(self.url("/auth/oauth2/token"))
                    .json(&json!({
                        "client_id": self.config.client_id,
                        "client_secret": self.config.client_secret,
                        "grant_type": "client_credentials",
                    }))
                    .send()
                    .await?;

                let (status, body) = read_body(response).await?;
                if !status.is_success() {
                    return Err(AppError::External(format!(
                        "Airtel token request failed: {}",
                        provider_message(&body).unwrap_or_else(|| status.to_string())
                    )));
                }

                serde_json::from_value::<AccessToken>(body)
                    .map_err(|e| AppError::External(format!("Airtel token response malformed: {}", e)))
            })
            .await
    }

    pub(crate) fn request_body(&self, request: &PayRequest) -> Value {
        json!({
            "reference": request.reference,
            "subscriber": {
                "country": self.country,
                "currency": self.currency,
                "msisdn": digits_only(&request.phone_number),
            },
            "transaction": {
                "amount": request.amount.to_string(),
                "country": self.country,
                "currency": self.currency,
                "id": request.external_id,
            },
        })
    }
}

fn status_code(body: &Value) -> Option<String> {
    body.pointer("/status/code").and_then(scalar_to_string)
}

/// Airtel transaction states: TS (success), TP (in progress), TF (failed), ...
pub fn map_status(response_code: Option<&str>, transaction_status: Option<&str>) -> PaymentStatus {
    match (response_code, transaction_status) {
        (Some("200"), Some("TS")) => PaymentStatus::Success,
        (_, Some("TP")) => PaymentStatus::Processing,
        _ => PaymentStatus::Failed,
    }
}

pub(crate) fn parse_status_report(body: &Value) -> StatusReport {
    let code = status_code(body);
    let transaction = body.pointer("/data/transaction");
    let transaction_status = transaction
        .and_then(|t| t.get("status"))
        .and_then(Value::as_str);

    StatusReport {
        status: map_status(code.as_deref(), transaction_status),
        amount: transaction.and_then(|t| t.get("amount")).and_then(scalar_to_string),
        currency: transaction
            .and_then(|t| t.get("currency"))
            .and_then(Value::as_str)
            .map(str::to_string),
        reason: body.pointer("/status/message").and_then(Value::as_str).map(str::to_string),
    }
}

#[async_trait]
impl MobileMoneyProvider for AirtelMoneyClient {
    fn network(&self) -> MobileNetwork {
        MobileNetwork::Airtel
    }

    async fn request_to_pay(&self, request: &PayRequest) -> Result<Initiation> {
        let token = self.access_token().await?;

        let response = self.http
            .post(self.url("/merchant/v1/payments/"))
            .bearer_auth(&token)
            .header("X-Country", &self.country)
            .header("X-Currency", &self.currency)
            .json(&self.request_body(request))
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        // Airtel answers HTTP 200 even for rejected payments; the verdict is in status.code.
        if !status.is_success() || status_code(&body).as_deref() != Some("200") {
            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            return Err(AppError::External(format!(
                "Airtel payment failed: {}",
                provider_message(&body).unwrap_or_else(|| status.to_string())
            )));
        }

        let provider_reference = body
            .pointer("/data/transaction/id")
            .and_then(scalar_to_string)
            .unwrap_or_else(|| request.external_id.clone());

        tracing::info!(
            "Airtel payment accepted for {} (transaction {})",
            request.reference,
            provider_reference
        );

        Ok(Initiation {
            provider_reference,
            status: PaymentStatus::Processing,
        })
    }

    async fn check_status(&self, provider_reference: &str) -> Result<StatusReport> {
        let token = self.access_token().await?;

        let response = self.http
            .get(self.url(&format!(
                "/standard/v1/payments/{}",
                urlencoding::encode(provider_reference)
            )))
            .bearer_auth(&token)
            .header("X-Country", &self.country)
            .header("X-Currency", &self.currency)
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            return Err(AppError::External(format!(
                "Airtel status check failed: {}",
                provider_message(&body).unwrap_or_else(|| status.to_string())
            )));
        }

        Ok(parse_status_report(&body))
    }
}
