use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};

/// Order read model. Orders are owned by the ordering subsystem; this service
/// only ever reads them.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: String,
    pub customer_name: Option<String>,
    pub phone_number: Option<String>,
    pub total_amount: BigDecimal,
    pub status: String,
}

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, customer_name, phone_number, total_amount, status \
             FROM orders \
             WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
