use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Donation, NewDonation, PaymentStatus},
    error::{AppError, Result},
    repository::{DonationRepository, StatusUpdate},
};

#[derive(FromRow)]
struct DonationRow {
    id: String,
    receipt_number: String,
    donor_name: String,
    donor_email: Option<String>,
    donor_phone: String,
    amount: i64,
    currency: String,
    payment_method: String,
    payment_reference: String,
    provider_transaction_id: Option<String>,
    payment_status: String,
    receipt_generated: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, receipt_number, donor_name, donor_email, donor_phone,
           amount, currency, payment_method, payment_reference,
           provider_transaction_id, payment_status, receipt_generated,
           created_at, updated_at
    FROM donations
"#;

pub struct SqliteDonationRepository {
    pool: SqlitePool,
}

impl SqliteDonationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_donation(row: DonationRow) -> Result<Donation> {
        Ok(Donation {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            receipt_number: row.receipt_number,
            donor_name: row.donor_name,
            donor_email: row.donor_email,
            donor_phone: row.donor_phone,
            amount: row.amount,
            currency: row.currency,
            payment_method: row.payment_method.parse().map_err(AppError::Database)?,
            payment_reference: row.payment_reference,
            provider_transaction_id: row.provider_transaction_id,
            payment_status: row.payment_status.parse().map_err(AppError::Database)?,
            receipt_generated: row.receipt_generated,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn fetch_one_where(&self, column: &str, value: &str) -> Result<Option<Donation>> {
        let sql = format!("{} WHERE {} = ? LIMIT 1", SELECT_COLUMNS, column);
        let row = sqlx::query_as::<_, DonationRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_donation).transpose()
    }
}

#[async_trait]
impl DonationRepository for SqliteDonationRepository {
    async fn create(&self, donation: NewDonation) -> Result<Donation> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO donations (
                id, receipt_number, donor_name, donor_email, donor_phone,
                amount, currency, payment_method, payment_reference,
                payment_status, receipt_generated, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?)
            "#
        )
        .bind(donation.id.to_string())
        .bind(&donation.receipt_number)
        .bind(&donation.donor_name)
        .bind(&donation.donor_email)
        .bind(&donation.donor_phone)
        .bind(donation.amount)
        .bind(&donation.currency)
        .bind(donation.payment_method.as_str())
        // The receipt number doubles as the provider-facing reference until a
        // provider issues its own.
        .bind(&donation.receipt_number)
        .bind(PaymentStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(donation.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created donation".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Donation>> {
        self.fetch_one_where("id", &id.to_string()).await
    }

    async fn find_by_receipt(&self, receipt_number: &str) -> Result<Option<Donation>> {
        self.fetch_one_where("receipt_number", receipt_number).await
    }

    async fn find_by_reference(&self, payment_reference: &str) -> Result<Option<Donation>> {
        self.fetch_one_where("payment_reference", payment_reference).await
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Donation>> {
        let sql = format!("{} ORDER BY created_at DESC LIMIT ? OFFSET ?", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, DonationRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_donation)
            .collect()
    }

    async fn mark_processing(&self, id: Uuid, payment_reference: &str) -> Result<Donation> {
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE donations
            SET payment_status = ?,
                payment_reference = ?,
                updated_at = ?
            WHERE id = ? AND payment_status = ?
            "#
        )
        .bind(PaymentStatus::Processing.as_str())
        .bind(payment_reference)
        .bind(now)
        .bind(&id_str)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        let donation = self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Donation not found".to_string()))?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                "Donation {} was {} when marked processing; left unchanged",
                donation.receipt_number,
                donation.payment_status
            );
        }

        Ok(donation)
    }

    async fn apply_status(
        &self,
        payment_reference: &str,
        status: PaymentStatus,
        provider_transaction_id: Option<&str>,
    ) -> Result<StatusUpdate> {
        let predecessors = status.predecessors();

        if !predecessors.is_empty() {
            let placeholders = vec!["?"; predecessors.len()].join(", ");
            let sql = format!(
                r#"
                UPDATE donations
                SET payment_status = ?,
                    receipt_generated = ?,
                    provider_transaction_id = COALESCE(?, provider_transaction_id),
                    updated_at = ?
                WHERE payment_reference = ? AND payment_status IN ({})
                "#,
                placeholders
            );

            let mut query = sqlx::query(&sql)
                .bind(status.as_str())
                .bind(status == PaymentStatus::Success)
                .bind(provider_transaction_id)
                .bind(Utc::now().naive_utc())
                .bind(payment_reference);
            for previous in predecessors {
                query = query.bind(previous.as_str());
            }

            let result = query.execute(&self.pool).await?;

            if result.rows_affected() > 0 {
                let donation = self.find_by_reference(payment_reference).await?
                    .ok_or_else(|| AppError::Database("Failed to retrieve updated donation".to_string()))?;
                return Ok(StatusUpdate::Applied(donation));
            }
        }

        Ok(match self.find_by_reference(payment_reference).await? {
            Some(donation) => StatusUpdate::Unchanged(donation),
            None => StatusUpdate::NotFound,
        })
    }
}
