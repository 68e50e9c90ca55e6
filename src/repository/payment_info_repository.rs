use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::PaymentNumber,
    error::{AppError, Result},
    repository::PaymentInfoRepository,
};

#[derive(FromRow)]
struct PaymentNumberRow {
    id: String,
    network_name: String,
    phone_number: String,
    account_name: String,
    is_active: bool,
    display_order: i64,
}

pub struct SqlitePaymentInfoRepository {
    pool: SqlitePool,
}

impl SqlitePaymentInfoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_number(row: PaymentNumberRow) -> Result<PaymentNumber> {
        Ok(PaymentNumber {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            network_name: row.network_name,
            phone_number: row.phone_number,
            account_name: row.account_name,
            is_active: row.is_active,
            display_order: row.display_order,
        })
    }
}

#[async_trait]
impl PaymentInfoRepository for SqlitePaymentInfoRepository {
    async fn list_active_numbers(&self) -> Result<Vec<PaymentNumber>> {
        let rows = sqlx::query_as::<_, PaymentNumberRow>(
            r#"
            SELECT id, network_name, phone_number, account_name, is_active, display_order
            FROM payment_numbers
            WHERE is_active = TRUE
            ORDER BY display_order ASC
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_number)
            .collect()
    }

    async fn manual_instructions(&self) -> Result<Option<String>> {
        let instructions = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT manual_payment_instructions
            FROM payment_settings
            ORDER BY updated_at DESC
            LIMIT 1
            "#
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(instructions.flatten())
    }

    async fn add_number(&self, number: PaymentNumber) -> Result<PaymentNumber> {
        sqlx::query(
            r#"
            INSERT INTO payment_numbers (
                id, network_name, phone_number, account_name, is_active, display_order
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(number.id.to_string())
        .bind(&number.network_name)
        .bind(&number.phone_number)
        .bind(&number.account_name)
        .bind(number.is_active)
        .bind(number.display_order)
        .execute(&self.pool)
        .await?;

        Ok(number)
    }

    async fn set_manual_instructions(&self, instructions: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_settings (id, manual_payment_instructions, updated_at)
            VALUES (?, ?, ?)
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(instructions)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
