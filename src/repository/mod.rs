use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod donation_repository;
pub mod payment_info_repository;

pub use donation_repository::SqliteDonationRepository;
pub use payment_info_repository::SqlitePaymentInfoRepository;

/// Outcome of a guarded status write.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// The row moved forward to the requested status.
    Applied(Donation),
    /// The row already held this status or a later one; nothing was written.
    Unchanged(Donation),
    NotFound,
}

impl StatusUpdate {
    pub fn donation(&self) -> Option<&Donation> {
        match self {
            StatusUpdate::Applied(d) | StatusUpdate::Unchanged(d) => Some(d),
            StatusUpdate::NotFound => None,
        }
    }
}

#[async_trait]
pub trait DonationRepository: Send + Sync {
    async fn create(&self, donation: NewDonation) -> Result<Donation>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Donation>>;
    async fn find_by_receipt(&self, receipt_number: &str) -> Result<Option<Donation>>;
    async fn find_by_reference(&self, payment_reference: &str) -> Result<Option<Donation>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Donation>>;
    /// Moves a pending row to processing and records the provider-facing reference.
    async fn mark_processing(&self, id: Uuid, payment_reference: &str) -> Result<Donation>;
    /// Writes `status` (and `receipt_generated`) to the row keyed by
    /// `payment_reference`, only if that moves the row forward.
    async fn apply_status(
        &self,
        payment_reference: &str,
        status: PaymentStatus,
        provider_transaction_id: Option<&str>,
    ) -> Result<StatusUpdate>;
}

#[async_trait]
pub trait PaymentInfoRepository: Send + Sync {
    async fn list_active_numbers(&self) -> Result<Vec<PaymentNumber>>;
    async fn manual_instructions(&self) -> Result<Option<String>>;
    async fn add_number(&self, number: PaymentNumber) -> Result<PaymentNumber>;
    async fn set_manual_instructions(&self, instructions: &str) -> Result<()>;
}
