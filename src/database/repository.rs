//! Store traits the services are written against. Postgres implementations
//! live beside them; tests substitute in-memory fakes.

use crate::database::error::DatabaseError;
use crate::database::order_repository::{Order, OrderRepository};
use crate::database::transaction_repository::{
    NewTransaction, PaymentStatistics, PaymentTransaction, StatsRange, StatusChanges,
    TransactionFilter, TransactionRepository,
};
use crate::gateways::types::TransactionStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, new: NewTransaction) -> Result<PaymentTransaction, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentTransaction>, DatabaseError>;

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentTransaction>, DatabaseError>;

    /// Conditional status update: applied only when the row's current status
    /// is one of `allowed`. This is the single-writer path for the status
    /// column; `None` means the transition was skipped.
    async fn update_status_if_in(
        &self,
        id: Uuid,
        new_status: TransactionStatus,
        allowed: &[TransactionStatus],
        changes: StatusChanges,
    ) -> Result<Option<PaymentTransaction>, DatabaseError>;

    async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError>;

    async fn statistics(&self, range: &StatsRange) -> Result<PaymentStatistics, DatabaseError>;

    async fn recent_by_phone(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError>;
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    async fn insert(&self, new: NewTransaction) -> Result<PaymentTransaction, DatabaseError> {
        TransactionRepository::insert(self, new).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentTransaction>, DatabaseError> {
        TransactionRepository::find_by_id(self, id).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentTransaction>, DatabaseError> {
        TransactionRepository::find_by_external_id(self, external_id).await
    }

    async fn update_status_if_in(
        &self,
        id: Uuid,
        new_status: TransactionStatus,
        allowed: &[TransactionStatus],
        changes: StatusChanges,
    ) -> Result<Option<PaymentTransaction>, DatabaseError> {
        TransactionRepository::update_status_if_in(self, id, new_status, allowed, changes).await
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        TransactionRepository::list(self, filter).await
    }

    async fn statistics(&self, range: &StatsRange) -> Result<PaymentStatistics, DatabaseError> {
        TransactionRepository::statistics(self, range).await
    }

    async fn recent_by_phone(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        TransactionRepository::recent_by_phone(self, phone, since).await
    }
}

/// Read-only view of the order store owned by the ordering subsystem.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, DatabaseError>;
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, DatabaseError> {
        OrderRepository::find_by_id(self, order_id).await
    }
}
