pub mod donation_service;
pub mod payment_service;
pub mod payment_status_service;

use std::sync::Arc;
use crate::config::PaymentsConfig;
use crate::payments::{PaymentPoller, ProviderRegistry};
use crate::repository::*;
use donation_service::DonationService;
use payment_service::PaymentService;
use payment_status_service::PaymentStatusService;

pub struct ServiceContext {
    pub donation_repo: Arc<dyn DonationRepository>,
    pub payment_info_repo: Arc<dyn PaymentInfoRepository>,
    pub donation_service: Arc<DonationService>,
    pub payment_service: Arc<PaymentService>,
    pub status_service: Arc<PaymentStatusService>,
    pub poller: Arc<PaymentPoller>,
}

impl ServiceContext {
    pub fn new(
        donation_repo: Arc<dyn DonationRepository>,
        payment_info_repo: Arc<dyn PaymentInfoRepository>,
        providers: ProviderRegistry,
        payments: &PaymentsConfig,
        base_url: String,
    ) -> Self {
        let status_service = Arc::new(PaymentStatusService::new(
            donation_repo.clone(),
            providers.clone(),
        ));

        let poller = Arc::new(PaymentPoller::new(
            status_service.clone(),
            payments.polling.clone(),
        ));

        let payment_service = Arc::new(PaymentService::new(
            donation_repo.clone(),
            providers.clone(),
            poller.clone(),
            payments.currency.clone(),
            base_url,
        ));

        let donation_service = Arc::new(DonationService::new(
            donation_repo.clone(),
            payment_info_repo.clone(),
            providers,
            payment_service.clone(),
            payments.currency.clone(),
        ));

        Self {
            donation_repo,
            payment_info_repo,
            donation_service,
            payment_service,
            status_service,
            poller,
        }
    }
}
