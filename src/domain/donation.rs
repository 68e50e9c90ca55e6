use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{PaymentMethod, PaymentStatus};

pub const MINIMUM_DONATION: i64 = 1000;

const RECEIPT_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const RECEIPT_SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub receipt_number: String,
    pub donor_name: String,
    pub donor_email: Option<String>,
    pub donor_phone: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_reference: String,
    pub provider_transaction_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub receipt_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Donor input as submitted by the donation form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub donor_name: String,
    #[validate(length(min = 10, message = "Phone number must be at least 10 characters"))]
    pub donor_phone: String,
    #[validate(email(message = "Invalid email address"))]
    pub donor_email: Option<String>,
    #[validate(range(min = 1000, message = "Minimum donation amount is UGX 1,000"))]
    pub amount: i64,
    pub payment_method: PaymentMethod,
}

impl CreateDonationRequest {
    /// The form sends an empty string when the donor skips the email field.
    pub fn normalized(mut self) -> Self {
        self.donor_name = self.donor_name.trim().to_string();
        self.donor_phone = self.donor_phone.trim().to_string();
        self.donor_email = self
            .donor_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self
    }
}

/// Row to insert for a freshly submitted donation.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub id: Uuid,
    pub receipt_number: String,
    pub donor_name: String,
    pub donor_email: Option<String>,
    pub donor_phone: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
}

impl NewDonation {
    pub fn from_request(request: CreateDonationRequest, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            receipt_number: generate_receipt_number(),
            donor_name: request.donor_name,
            donor_email: request.donor_email,
            donor_phone: request.donor_phone,
            amount: request.amount,
            currency: currency.to_string(),
            payment_method: request.payment_method,
        }
    }
}

/// Public view of a donation, looked up by receipt number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationReceipt {
    pub receipt_number: String,
    pub donor_name: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub receipt_generated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Donation> for DonationReceipt {
    fn from(d: Donation) -> Self {
        Self {
            receipt_number: d.receipt_number,
            donor_name: d.donor_name,
            amount: d.amount,
            currency: d.currency,
            payment_method: d.payment_method,
            payment_status: d.payment_status,
            receipt_generated: d.receipt_generated,
            created_at: d.created_at,
        }
    }
}

/// `RCP-<UTC date>-<8 random [A-Z0-9]>`, roughly 2.8e12 codes per day.
pub fn generate_receipt_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RECEIPT_SUFFIX_LEN)
        .map(|_| RECEIPT_CHARSET[rng.gen_range(0..RECEIPT_CHARSET.len())] as char)
        .collect();

    format!("RCP-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

/// The card gateway insists on an email address.
pub fn fallback_email(phone: &str) -> String {
    format!("{}@temp.com", digits_only(phone))
}

pub fn digits_only(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}
