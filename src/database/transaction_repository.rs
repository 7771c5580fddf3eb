use crate::database::error::DatabaseError;
use crate::gateways::types::{GatewayCode, TransactionStatus};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, QueryBuilder, Row};
use uuid::Uuid;

/// Payment transaction entity. One row per payment attempt; a retried payment
/// on the same order creates a new row. Rows are never deleted; cancellation
/// and failure are terminal statuses, not deletions.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub order_id: String,
    #[sqlx(try_from = "String")]
    pub provider: GatewayCode,
    pub amount: BigDecimal,
    pub currency: String,
    pub phone_number: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub external_transaction_id: Option<String>,
    pub callback_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields of a freshly created transaction; status always starts `pending`.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub order_id: String,
    pub provider: GatewayCode,
    pub amount: BigDecimal,
    pub currency: String,
    pub phone_number: Option<String>,
}

/// Optional column updates applied together with a status transition.
#[derive(Debug, Clone, Default)]
pub struct StatusChanges {
    pub external_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub callback_data: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub provider: Option<GatewayCode>,
    pub status: Option<TransactionStatus>,
    pub order_id: Option<String>,
    pub phone_number: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct StatsRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    pub provider: GatewayCode,
    pub transactions: u64,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatistics {
    pub total_transactions: u64,
    pub total_amount: BigDecimal,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// `completed / total`, as a percentage.
    pub success_rate: f64,
    pub per_provider: Vec<ProviderStats>,
}

const RETURNING: &str = "RETURNING id, order_id, provider, amount, currency, phone_number, \
     status, external_transaction_id, callback_data, error_message, created_at, completed_at";

/// Postgres-backed transaction store.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: NewTransaction) -> Result<PaymentTransaction, DatabaseError> {
        sqlx::query_as::<_, PaymentTransaction>(&format!(
            "INSERT INTO payment_transactions \
             (id, order_id, provider, amount, currency, phone_number, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending') \
             {}",
            RETURNING
        ))
        .bind(new.id)
        .bind(&new.order_id)
        .bind(new.provider.as_str())
        .bind(&new.amount)
        .bind(&new.currency)
        .bind(&new.phone_number)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<PaymentTransaction>, DatabaseError> {
        sqlx::query_as::<_, PaymentTransaction>(
            "SELECT id, order_id, provider, amount, currency, phone_number, status, \
                    external_transaction_id, callback_data, error_message, created_at, completed_at \
             FROM payment_transactions \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentTransaction>, DatabaseError> {
        sqlx::query_as::<_, PaymentTransaction>(
            "SELECT id, order_id, provider, amount, currency, phone_number, status, \
                    external_transaction_id, callback_data, error_message, created_at, completed_at \
             FROM payment_transactions \
             WHERE external_transaction_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// The idempotent-update rule as one conditional statement: the row is
    /// touched only when its current status is in `allowed`. `None` means the
    /// transition was not applicable; callers treat that as a logged no-op,
    /// not an error.
    pub async fn update_status_if_in(
        &self,
        id: Uuid,
        new_status: TransactionStatus,
        allowed: &[TransactionStatus],
        changes: StatusChanges,
    ) -> Result<Option<PaymentTransaction>, DatabaseError> {
        let allowed_strs: Vec<String> =
            allowed.iter().map(|s| s.as_db_str().to_string()).collect();

        sqlx::query_as::<_, PaymentTransaction>(&format!(
            "UPDATE payment_transactions \
             SET status = $2, \
                 external_transaction_id = COALESCE($4, external_transaction_id), \
                 error_message = COALESCE($5, error_message), \
                 callback_data = COALESCE($6, callback_data), \
                 completed_at = COALESCE($7, completed_at) \
             WHERE id = $1 AND status = ANY($3) \
             {}",
            RETURNING
        ))
        .bind(id)
        .bind(new_status.as_db_str())
        .bind(&allowed_strs)
        .bind(&changes.external_transaction_id)
        .bind(&changes.error_message)
        .bind(&changes.callback_data)
        .bind(changes.completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, order_id, provider, amount, currency, phone_number, status, \
                    external_transaction_id, callback_data, error_message, created_at, completed_at \
             FROM payment_transactions WHERE 1 = 1",
        );
        if let Some(provider) = filter.provider {
            builder.push(" AND provider = ").push_bind(provider.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_db_str());
        }
        if let Some(order_id) = &filter.order_id {
            builder.push(" AND order_id = ").push_bind(order_id.clone());
        }
        if let Some(phone) = &filter.phone_number {
            builder.push(" AND phone_number = ").push_bind(phone.clone());
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at < ").push_bind(to);
        }
        builder.push(" ORDER BY created_at DESC");
        builder
            .push(" LIMIT ")
            .push_bind(filter.limit.unwrap_or(100));

        builder
            .build_query_as::<PaymentTransaction>()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn statistics(
        &self,
        range: &StatsRange,
    ) -> Result<PaymentStatistics, DatabaseError> {
        // Open bounds become wide ones that stay inside the timestamptz range.
        let from = range.from.unwrap_or(DateTime::UNIX_EPOCH);
        let to = range
            .to
            .unwrap_or_else(|| Utc::now() + chrono::Duration::days(365));

        let totals = sqlx::query(
            "SELECT COUNT(*) AS total, \
                    COALESCE(SUM(amount), 0) AS total_amount, \
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
                    COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled \
             FROM payment_transactions \
             WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let total: i64 = totals.try_get("total").map_err(DatabaseError::from_sqlx)?;
        let total_amount: BigDecimal = totals
            .try_get("total_amount")
            .map_err(DatabaseError::from_sqlx)?;
        let completed: i64 = totals
            .try_get("completed")
            .map_err(DatabaseError::from_sqlx)?;
        let failed: i64 = totals.try_get("failed").map_err(DatabaseError::from_sqlx)?;
        let cancelled: i64 = totals
            .try_get("cancelled")
            .map_err(DatabaseError::from_sqlx)?;

        let provider_rows = sqlx::query(
            "SELECT provider, COUNT(*) AS transactions, COALESCE(SUM(amount), 0) AS amount \
             FROM payment_transactions \
             WHERE created_at >= $1 AND created_at < $2 \
             GROUP BY provider \
             ORDER BY provider",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut per_provider = Vec::with_capacity(provider_rows.len());
        for row in provider_rows {
            let code: String = row.try_get("provider").map_err(DatabaseError::from_sqlx)?;
            // A row with an unknown provider code would be a schema violation;
            // skip it rather than poison the whole aggregate.
            if let Ok(provider) = GatewayCode::try_from(code) {
                per_provider.push(ProviderStats {
                    provider,
                    transactions: row
                        .try_get::<i64, _>("transactions")
                        .map_err(DatabaseError::from_sqlx)? as u64,
                    amount: row.try_get("amount").map_err(DatabaseError::from_sqlx)?,
                });
            }
        }

        Ok(PaymentStatistics {
            total_transactions: total as u64,
            total_amount,
            completed: completed as u64,
            failed: failed as u64,
            cancelled: cancelled as u64,
            success_rate: if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64 * 100.0
            },
            per_provider,
        })
    }

    pub async fn recent_by_phone(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        sqlx::query_as::<_, PaymentTransaction>(
            "SELECT id, order_id, provider, amount, currency, phone_number, status, \
                    external_transaction_id, callback_data, error_message, created_at, completed_at \
             FROM payment_transactions \
             WHERE phone_number = $1 AND created_at >= $2 \
             ORDER BY created_at DESC",
        )
        .bind(phone)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
