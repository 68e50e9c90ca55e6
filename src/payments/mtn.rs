use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    config::MtnConfig,
    domain::{digits_only, MobileNetwork, PaymentStatus},
    error::{AppError, Result},
    payments::{
        provider_message, read_body, scalar_to_string,
        token_cache::{AccessToken, TokenCache},
        Initiation, MobileMoneyProvider, PayRequest, StatusReport,
    },
};

const SUBSCRIPTION_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// MTN MoMo collection API client.
pub struct MtnMomoClient {
    http: Client,
    config: MtnConfig,
    currency: String,
    tokens: TokenCache,
}

impl MtnMomoClient {
    pub fn new(http: Client, config: MtnConfig, currency: String) -> Self {
        Self {
            http,
            config,
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
                    .post(self.url("/collection/token/"))
                    .basic_auth(&self.config.api_user, Some(&self.config.api_key))
                    .header(SUBSCRIPTION_HEADER, &self.config.subscription_key)
                    .send()
                    .await?;

                let (status, body) = read_body(response).await?;
                if !status.is_success() {
                    return Err(AppError::External(format!(
                        "MTN token request failed: {}",
                        provider_message(&body).unwrap_or_else(|| status.to_string())
                    )));
                }

                serde_json::from_value::<AccessToken>(body)
                    .map_err(|e| AppError::External(format!("MTN token response malformed: {}", e)))
            })
            .await
    }

    pub(crate) fn request_body(&self, request: &PayRequest) -> Value {
        json!({
            "amount": request.amount.to_string(),
            "currency": self.currency,
            "externalId": request.external_id,
            "payer": {
                "partyIdType": "MSISDN",
                "partyId": digits_only(&request.phone_number),
            },
            "payerMessage": "Donation Payment",
            "payeeNote": format!("Donation - {}", request.reference),
        })
    }
}

/// MTN reports SUCCESSFUL, PENDING, FAILED, REJECTED, TIMEOUT, ...
pub fn map_status(status: &str) -> PaymentStatus {
    match status {
        "SUCCESSFUL" => PaymentStatus::Success,
        "PENDING" => PaymentStatus::Processing,
        _ => PaymentStatus::Failed,
    }
}

pub(crate) fn parse_status_report(body: &Value) -> StatusReport {
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();

    StatusReport {
        status: map_status(status),
        amount: body.get("amount").and_then(scalar_to_string),
        currency: body.get("currency").and_then(Value::as_str).map(str::to_string),
        reason: body.get("reason").and_then(|r| {
            r.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| scalar_to_string(r))
        }),
    }
}

#[async_trait]
impl MobileMoneyProvider for MtnMomoClient {
    fn network(&self) -> MobileNetwork {
        MobileNetwork::Mtn
    }

    async fn request_to_pay(&self, request: &PayRequest) -> Result<Initiation> {
        let token = self.access_token().await?;

        // MTN identifies the request by a UUID we choose.
        let transaction_id = Uuid::new_v4().to_string();

        let response = self.http
            .post(self.url("/collection/v1_0/requesttopay"))
            .bearer_auth(&token)
            .header("X-Reference-Id", &transaction_id)
            .header("X-Target-Environment", &self.config.target_environment)
            .header(SUBSCRIPTION_HEADER, &self.config.subscription_key)
            .json(&self.request_body(request))
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            return Err(AppError::External(format!(
                "MTN payment failed: {}",
                provider_message(&body).unwrap_or_else(|| status.to_string())
            )));
        }

        tracing::info!(
            "MTN request-to-pay accepted for {} (transaction {})",
            request.reference,
            transaction_id
        );

        Ok(Initiation {
            provider_reference: transaction_id,
            status: PaymentStatus::Processing,
        })
    }

    async fn check_status(&self, provider_reference: &str) -> Result<StatusReport> {
        let token = self.access_token().await?;

        let response = self.http
            .get(self.url(&format!(
                "/collection/v1_0/requesttopay/{}",
                urlencoding::encode(provider_reference)
            )))
            .bearer_auth(&token)
            .header("X-Target-Environment", &self.config.target_environment)
            .header(SUBSCRIPTION_HEADER, &self.config.subscription_key)
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            return Err(AppError::External(format!(
                "MTN status check failed: {}",
                provider_message(&body).unwrap_or_else(|| status.to_string())
            )));
        }

        Ok(parse_status_report(&body))
    }
}
