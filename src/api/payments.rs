use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{audit_context, AppState};
use crate::error::{AppError, AppErrorKind, ValidationError};
use crate::database::transaction_repository::{
    PaymentStatistics, PaymentTransaction, StatsRange, TransactionFilter,
};
use crate::gateways::registry::ProviderInfo;
use crate::gateways::types::{GatewayCode, TransactionStatus};
use crate::health::HealthStatus;
use crate::services::payment_orchestrator::{CreatePayment, PaymentResult};

/// POST /api/payments
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreatePayment>,
) -> Result<Json<PaymentResult>, AppError> {
    let ctx = audit_context(&headers);
    let result = state.orchestrator.create_payment(request, &ctx).await?;
    Ok(Json(result))
}

/// GET /api/payments/{id}/status
pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResult>, AppError> {
    let result = state.orchestrator.check_payment_status(id).await?;
    Ok(Json(result))
}

/// POST /api/payments/{id}/cancel
pub async fn cancel_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResult>, AppError> {
    let result = state.orchestrator.cancel_transaction(id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub provider: Option<String>,
    pub status: Option<String>,
    pub order_id: Option<String>,
    pub phone_number: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl HistoryQuery {
    fn into_filter(self) -> Result<TransactionFilter, AppError> {
        let provider = match self.provider.as_deref() {
            Some(raw) => Some(GatewayCode::from_str(raw).map_err(|_| invalid_param("provider"))?),
            None => None,
        };
        let status = match self.status.as_deref() {
            Some(raw) => {
                Some(TransactionStatus::from_db_str(raw).ok_or_else(|| invalid_param("status"))?)
            }
            None => None,
        };
        Ok(TransactionFilter {
            provider,
            status,
            order_id: self.order_id,
            phone_number: self.phone_number,
            from: self.from,
            to: self.to,
            limit: self.limit,
        })
    }
}

fn invalid_param(name: &str) -> AppError {
    AppError::new(AppErrorKind::Validation(ValidationError::Invalid {
        message: format!("invalid value for query parameter '{}'", name),
    }))
}

/// GET /api/payments
pub async fn payment_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PaymentTransaction>>, AppError> {
    let filter = query.into_filter()?;
    let transactions = state.orchestrator.transaction_history(&filter).await?;
    Ok(Json(transactions))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/payments/statistics
pub async fn payment_statistics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<PaymentStatistics>, AppError> {
    let stats = state
        .orchestrator
        .payment_statistics(&StatsRange {
            from: query.from,
            to: query.to,
        })
        .await?;
    Ok(Json(stats))
}

/// GET /api/providers
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderInfo>> {
    Json(state.registry.providers())
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(crate::health::check_health(&state.pool).await)
}
