use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{fallback_email, Donation, PaymentMethod, PaymentStatus},
    error::{AppError, Result},
    payments::{
        flutterwave::{self, WebhookEvent, CHARGE_COMPLETED},
        scalar_to_string, CardCheckout, PayRequest, PaymentPoller, ProviderRegistry,
    },
    repository::{DonationRepository, StatusUpdate},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileInitiationRequest {
    pub donation_id: Uuid,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileInitiation {
    pub reference_id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInitiationRequest {
    pub donation_id: Uuid,
    pub amount: i64,
    pub email: Option<String>,
    pub phone_number: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInitiation {
    pub payment_link: String,
    pub reference_id: String,
}

/// Query parameters the gateway appends to the redirect back to the site.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardVerificationRequest {
    pub transaction_id: Option<String>,
    pub tx_ref: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardVerification {
    pub status: PaymentStatus,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
    pub reference: Option<String>,
}

pub struct PaymentService {
    donation_repo: Arc<dyn DonationRepository>,
    providers: ProviderRegistry,
    poller: Arc<PaymentPoller>,
    currency: String,
    base_url: String,
}

impl PaymentService {
    pub fn new(
        donation_repo: Arc<dyn DonationRepository>,
        providers: ProviderRegistry,
        poller: Arc<PaymentPoller>,
        currency: String,
        base_url: String,
    ) -> Self {
        Self {
            donation_repo,
            providers,
            poller,
            currency,
            base_url,
        }
    }

    async fn load(&self, donation_id: Uuid) -> Result<Donation> {
        self.donation_repo
            .find_by_id(donation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Donation not found".to_string()))
    }

    /// Sends a request-to-pay to the donor's handset and starts polling for the outcome.
    pub async fn initiate_mobile(&self, request: MobileInitiationRequest) -> Result<MobileInitiation> {
        let network = request
            .payment_method
            .mobile_network()
            .ok_or_else(|| AppError::BadRequest("Unsupported payment method".to_string()))?;

        let donation = self.load(request.donation_id).await?;

        if donation.payment_method != request.payment_method {
            return Err(AppError::BadRequest(format!(
                "Donation {} was submitted for {} payment",
                donation.receipt_number, donation.payment_method
            )));
        }
        if donation.amount != request.amount {
            return Err(AppError::BadRequest("Amount does not match the donation".to_string()));
        }
        if donation.payment_status != PaymentStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Payment for {} is already {}",
                donation.receipt_number, donation.payment_status
            )));
        }

        let provider = self.providers.mobile(network)?;
        let initiation = provider
            .request_to_pay(&PayRequest {
                amount: donation.amount,
                phone_number: request.phone_number,
                reference: donation.receipt_number.clone(),
                external_id: donation.id.to_string(),
            })
            .await
            .map_err(|e| {
                // The row stays pending for manual reconciliation.
                tracing::warn!("Initiation failed for {}: {}", donation.receipt_number, e);
                e
            })?;

        self.donation_repo
            .mark_processing(donation.id, &initiation.provider_reference)
            .await?;

        self.poller.start(&initiation.provider_reference, network).await;

        Ok(MobileInitiation {
            reference_id: initiation.provider_reference,
            status: initiation.status,
        })
    }

    /// Opens a hosted payment page session; the caller redirects the donor to the returned link.
    pub async fn initiate_card(&self, request: CardInitiationRequest) -> Result<CardInitiation> {
        let gateway = self.providers.card()?;
        let donation = self.load(request.donation_id).await?;

        if donation.payment_method != PaymentMethod::Card {
            return Err(AppError::BadRequest(format!(
                "Donation {} was submitted for {} payment",
                donation.receipt_number, donation.payment_method
            )));
        }
        if donation.amount != request.amount {
            return Err(AppError::BadRequest("Amount does not match the donation".to_string()));
        }
        // A donor who abandoned the hosted page may start over until the payment settles.
        if donation.payment_status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Payment for {} is already {}",
                donation.receipt_number, donation.payment_status
            )));
        }

        let email = request
            .email
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| fallback_email(&request.phone_number));

        let payment_link = gateway
            .create_checkout(&CardCheckout {
                tx_ref: donation.receipt_number.clone(),
                donation_id: donation.id.to_string(),
                amount: donation.amount,
                currency: self.currency.clone(),
                redirect_url: format!("{}/donate/verify", self.base_url.trim_end_matches('/')),
                email,
                phone_number: request.phone_number,
                name: request.name,
            })
            .await?;

        self.donation_repo
            .mark_processing(donation.id, &donation.receipt_number)
            .await?;

        tracing::info!("Card checkout opened for {}", donation.receipt_number);

        Ok(CardInitiation {
            payment_link,
            reference_id: donation.receipt_number,
        })
    }

    /// Confirms the outcome of a card payment when the donor returns from the hosted page.
    pub async fn verify_card(&self, request: CardVerificationRequest) -> Result<CardVerification> {
        // The redirect's own status marker is only trusted to short-circuit a failure.
        if matches!(request.status.as_deref(), Some("cancelled") | Some("failed")) {
            tracing::info!(
                "Card payment {} reported {} on redirect",
                request.tx_ref.as_deref().unwrap_or("<unknown>"),
                request.status.as_deref().unwrap_or_default()
            );
            return Ok(CardVerification {
                status: PaymentStatus::Failed,
                amount: None,
                currency: None,
                transaction_id: request.transaction_id,
                reference: request.tx_ref,
            });
        }

        let transaction_id = request
            .transaction_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Transaction ID is required".to_string()))?;

        let gateway = self.providers.card()?;
        let transaction = gateway.verify_transaction(&transaction_id).await?;

        if let Some(tx_ref) = request.tx_ref.as_deref() {
            if tx_ref != transaction.tx_ref {
                tracing::warn!(
                    "Redirect tx_ref {} differs from verified tx_ref {}",
                    tx_ref,
                    transaction.tx_ref
                );
            }
        }

        self.record_card_outcome(&transaction.tx_ref, transaction.status, &transaction.id)
            .await?;

        Ok(CardVerification {
            status: transaction.status,
            amount: transaction.amount,
            currency: transaction.currency,
            transaction_id: Some(transaction.id),
            reference: Some(transaction.tx_ref),
        })
    }

    /// Applies a gateway-pushed event. The signature is checked before anything else.
    pub async fn handle_card_webhook(&self, signature: Option<&str>, payload: &str) -> Result<()> {
        // Without a configured gateway there is no secret, so nothing can match.
        let gateway = self.providers.card().ok();
        let secret = gateway.as_deref().map(|g| g.webhook_secret()).unwrap_or_default();

        if !flutterwave::signature_matches(secret, signature) {
            tracing::error!("Invalid webhook signature");
            return Err(AppError::Unauthorized);
        }

        let event: WebhookEvent = serde_json::from_str(payload)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        if event.event != CHARGE_COMPLETED {
            tracing::debug!("Unhandled webhook event type: {}", event.event);
            return Ok(());
        }

        let Some(data) = event.data else {
            return Err(AppError::BadRequest("Webhook event carries no data".to_string()));
        };

        let status = flutterwave::map_status(&data.status);
        let transaction_id = scalar_to_string(&data.id).unwrap_or_default();
        self.record_card_outcome(&data.tx_ref, status, &transaction_id).await?;

        tracing::info!("Webhook processed: {} - {}", data.tx_ref, status);
        Ok(())
    }

    async fn record_card_outcome(
        &self,
        tx_ref: &str,
        status: PaymentStatus,
        transaction_id: &str,
    ) -> Result<()> {
        let transaction_id = Some(transaction_id).filter(|id| !id.is_empty());

        match self.donation_repo.apply_status(tx_ref, status, transaction_id).await? {
            StatusUpdate::Applied(donation) => {
                tracing::info!("Donation {} is now {}", donation.receipt_number, donation.payment_status);
            }
            StatusUpdate::Unchanged(donation) => {
                tracing::debug!(
                    "Donation {} stays {} (gateway reported {})",
                    donation.receipt_number,
                    donation.payment_status,
                    status
                );
            }
            StatusUpdate::NotFound => {
                tracing::warn!("No donation matches tx_ref {}", tx_ref);
            }
        }

        Ok(())
    }
}
