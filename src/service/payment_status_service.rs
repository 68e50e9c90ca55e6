use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    domain::{MobileNetwork, PaymentStatus},
    error::{AppError, Result},
    payments::{ProviderRegistry, StatusChecker, StatusReport},
    repository::{DonationRepository, StatusUpdate},
};

/// Asks a mobile-money provider where a payment stands and records the answer.
pub struct PaymentStatusService {
    donation_repo: Arc<dyn DonationRepository>,
    providers: ProviderRegistry,
}

impl PaymentStatusService {
    pub fn new(donation_repo: Arc<dyn DonationRepository>, providers: ProviderRegistry) -> Self {
        Self { donation_repo, providers }
    }

    /// Only rows paid through `network` are checked; manual and card rows
    /// share the reference column but are never settled from here.
    pub async fn check_mobile(&self, reference: &str, network: MobileNetwork) -> Result<StatusReport> {
        let provider = self.providers.mobile(network)?;

        let donation = self.donation_repo.find_by_reference(reference).await?;
        if donation.map(|d| d.payment_method.mobile_network()) != Some(Some(network)) {
            tracing::warn!("No {} payment matches reference {}", network, reference);
            return Err(AppError::NotFound("Payment not found".to_string()));
        }

        let report = provider.check_status(reference).await?;

        match self.donation_repo.apply_status(reference, report.status, None).await? {
            StatusUpdate::Applied(donation) => {
                tracing::info!(
                    "Donation {} is now {} ({})",
                    donation.receipt_number,
                    donation.payment_status,
                    network
                );
            }
            StatusUpdate::Unchanged(donation) => {
                tracing::debug!(
                    "Donation {} stays {} ({} reported {})",
                    donation.receipt_number,
                    donation.payment_status,
                    network,
                    report.status
                );
            }
            StatusUpdate::NotFound => {
                tracing::warn!("No donation matches payment reference {}", reference);
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl StatusChecker for PaymentStatusService {
    async fn check(&self, reference: &str, network: MobileNetwork) -> Result<PaymentStatus> {
        Ok(self.check_mobile(reference, network).await?.status)
    }
}
