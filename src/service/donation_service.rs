use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::ProviderRegistry,
    repository::{DonationRepository, PaymentInfoRepository},
    service::payment_service::{CardInitiationRequest, MobileInitiationRequest, PaymentService},
};

/// Receipt numbers are regenerated this many times on a uniqueness clash.
const RECEIPT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationSubmission {
    pub donation_id: Uuid,
    pub receipt_number: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<ManualInstructions>,
}

pub struct DonationService {
    donation_repo: Arc<dyn DonationRepository>,
    payment_info_repo: Arc<dyn PaymentInfoRepository>,
    providers: ProviderRegistry,
    payment_service: Arc<PaymentService>,
    currency: String,
}

impl DonationService {
    pub fn new(
        donation_repo: Arc<dyn DonationRepository>,
        payment_info_repo: Arc<dyn PaymentInfoRepository>,
        providers: ProviderRegistry,
        payment_service: Arc<PaymentService>,
        currency: String,
    ) -> Self {
        Self {
            donation_repo,
            payment_info_repo,
            providers,
            payment_service,
            currency,
        }
    }

    /// Records a donation and hands it to the payment method the donor chose.
    pub async fn submit(&self, request: CreateDonationRequest) -> Result<DonationSubmission> {
        let request = request.normalized();
        request.validate()?;

        // Refuse before writing anything if the chosen provider is not available.
        if let Some(network) = request.payment_method.mobile_network() {
            self.providers.mobile(network)?;
        } else if request.payment_method == PaymentMethod::Card {
            self.providers.card()?;
        }

        let donation = self.create_with_unique_receipt(&request).await?;
        tracing::info!(
            "Donation {} recorded: {} {} via {}",
            donation.receipt_number,
            donation.amount,
            donation.currency,
            donation.payment_method
        );

        match donation.payment_method {
            PaymentMethod::Mtn | PaymentMethod::Airtel => {
                let initiation = self
                    .payment_service
                    .initiate_mobile(MobileInitiationRequest {
                        donation_id: donation.id,
                        payment_method: donation.payment_method,
                        amount: donation.amount,
                        phone_number: donation.donor_phone.clone(),
                    })
                    .await?;

                Ok(DonationSubmission {
                    donation_id: donation.id,
                    message: format!(
                        "Payment prompt sent to your phone! Reference: {}",
                        initiation.reference_id
                    ),
                    receipt_number: donation.receipt_number,
                    payment_method: donation.payment_method,
                    status: initiation.status,
                    reference_id: Some(initiation.reference_id),
                    payment_link: None,
                    instructions: None,
                })
            }
            PaymentMethod::Card => {
                let checkout = self
                    .payment_service
                    .initiate_card(CardInitiationRequest {
                        donation_id: donation.id,
                        amount: donation.amount,
                        email: donation.donor_email.clone(),
                        phone_number: donation.donor_phone.clone(),
                        name: donation.donor_name.clone(),
                    })
                    .await?;

                Ok(DonationSubmission {
                    donation_id: donation.id,
                    receipt_number: donation.receipt_number,
                    payment_method: donation.payment_method,
                    status: PaymentStatus::Processing,
                    message: "Redirecting to secure payment page...".to_string(),
                    reference_id: Some(checkout.reference_id),
                    payment_link: Some(checkout.payment_link),
                    instructions: None,
                })
            }
            PaymentMethod::Manual => {
                let instructions = self.manual_instructions().await?;

                Ok(DonationSubmission {
                    donation_id: donation.id,
                    message: format!(
                        "Thank you for your donation of {}! Reference: {}",
                        format_amount(donation.amount, &donation.currency),
                        donation.receipt_number
                    ),
                    receipt_number: donation.receipt_number,
                    payment_method: donation.payment_method,
                    status: donation.payment_status,
                    reference_id: None,
                    payment_link: None,
                    instructions: Some(instructions),
                })
            }
        }
    }

    pub async fn find_receipt(&self, receipt_number: &str) -> Result<DonationReceipt> {
        self.donation_repo
            .find_by_receipt(receipt_number)
            .await?
            .map(DonationReceipt::from)
            .ok_or_else(|| AppError::NotFound("Donation not found".to_string()))
    }

    pub async fn manual_instructions(&self) -> Result<ManualInstructions> {
        Ok(ManualInstructions {
            instructions: self.payment_info_repo.manual_instructions().await?,
            numbers: self.payment_info_repo.list_active_numbers().await?,
        })
    }

    async fn create_with_unique_receipt(&self, request: &CreateDonationRequest) -> Result<Donation> {
        let mut last_error = None;

        for _ in 0..RECEIPT_ATTEMPTS {
            let new_donation = NewDonation::from_request(request.clone(), &self.currency);
            match self.donation_repo.create(new_donation).await {
                Err(AppError::Conflict(msg)) => {
                    tracing::warn!("Receipt number clash, regenerating: {}", msg);
                    last_error = Some(AppError::Conflict(msg));
                }
                other => return other,
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Could not allocate a receipt number".to_string())
        }))
    }
}

/// `UGX 5,000` style amount for donor-facing messages.
pub fn format_amount(amount: i64, currency: &str) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{} {}{}", currency, sign, grouped)
}
