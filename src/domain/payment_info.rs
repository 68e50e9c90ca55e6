use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A merchant number donors can send money to by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNumber {
    pub id: Uuid,
    pub network_name: String,
    pub phone_number: String,
    pub account_name: String,
    pub is_active: bool,
    pub display_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualInstructions {
    pub instructions: Option<String>,
    pub numbers: Vec<PaymentNumber>,
}
