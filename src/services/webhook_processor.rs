use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::gateways::registry::GatewayRegistry;
use crate::gateways::types::{GatewayCode, TransactionStatus};
use crate::security::audit::AuditContext;
use crate::security::validator::SecurityValidator;
use crate::services::payment_orchestrator::{OrchestratorError, PaymentOrchestrator};

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Invalid callback payload: {0}")]
    InvalidPayload(String),
    #[error("Callback rejected: {0}")]
    SecurityRejected(String),
    #[error("No transaction for external id: {0}")]
    TransactionNotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Processing error: {0}")]
    Processing(String),
}

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub transaction_id: Uuid,
    pub previous_status: TransactionStatus,
    pub new_status: TransactionStatus,
    /// False when the idempotent-update rule made the callback a no-op.
    pub applied: bool,
}

/// Entry point for gateway-initiated status pushes. Nothing here mutates a
/// transaction directly: structural and security rejections return before any
/// state is touched, and the accepted path goes through the orchestrator's
/// idempotent update.
pub struct CallbackProcessor {
    registry: Arc<GatewayRegistry>,
    validator: Arc<SecurityValidator>,
    orchestrator: Arc<PaymentOrchestrator>,
}

impl CallbackProcessor {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        validator: Arc<SecurityValidator>,
        orchestrator: Arc<PaymentOrchestrator>,
    ) -> Self {
        Self {
            registry,
            validator,
            orchestrator,
        }
    }

    pub async fn process_callback(
        &self,
        provider_code: &str,
        raw_body: &[u8],
        signature: Option<&str>,
        ctx: &AuditContext,
    ) -> Result<CallbackOutcome, CallbackError> {
        let code = GatewayCode::from_str(provider_code)
            .map_err(|_| CallbackError::UnknownProvider(provider_code.to_string()))?;
        let gateway = self
            .registry
            .get(code)
            .ok_or_else(|| CallbackError::UnknownProvider(provider_code.to_string()))?;

        let payload: JsonValue = serde_json::from_slice(raw_body)
            .map_err(|e| CallbackError::InvalidPayload(format!("invalid JSON: {}", e)))?;

        let structural = gateway.validate_callback_data(&payload);
        if !structural.is_valid {
            warn!(
                provider = %code,
                errors = %structural.errors.join("; "),
                "callback failed structural validation"
            );
            return Err(CallbackError::InvalidPayload(structural.errors.join("; ")));
        }

        let report = self.validator.validate_callback(
            raw_body,
            &payload,
            gateway.as_ref(),
            &structural,
            signature,
            ctx,
        );
        if !report.is_valid {
            warn!(
                provider = %code,
                errors = %report.errors.join("; "),
                risk_score = report.risk_score,
                "callback rejected by security validation"
            );
            return Err(CallbackError::SecurityRejected(report.errors.join("; ")));
        }

        let external_id = structural
            .external_transaction_id
            .clone()
            .ok_or_else(|| CallbackError::InvalidPayload("missing transaction id".to_string()))?;
        let native_status = structural
            .native_status
            .clone()
            .ok_or_else(|| CallbackError::InvalidPayload("missing status".to_string()))?;
        let mapped = gateway.map_callback_status(&native_status);

        match self
            .orchestrator
            .apply_external_status(
                &external_id,
                mapped,
                Some(format!("callback reported {}", native_status)),
                Some(payload.clone()),
            )
            .await
        {
            Ok(update) => {
                info!(
                    provider = %code,
                    transaction_id = %update.transaction.id,
                    from = %update.previous_status,
                    to = %update.transaction.status,
                    applied = update.applied,
                    "callback processed"
                );
                Ok(CallbackOutcome {
                    transaction_id: update.transaction.id,
                    previous_status: update.previous_status,
                    new_status: update.transaction.status,
                    applied: update.applied,
                })
            }
            Err(OrchestratorError::TransactionNotFound { .. }) => {
                self.validator.record_rejection(
                    "callback_processing",
                    ctx,
                    format!(
                        "provider={} callback for unknown external transaction {}",
                        code, external_id
                    ),
                    report.risk_score.saturating_add(30),
                );
                Err(CallbackError::TransactionNotFound(external_id))
            }
            Err(OrchestratorError::Store(e)) => Err(CallbackError::Database(e)),
            Err(e) => Err(CallbackError::Processing(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_error_display() {
        let err = CallbackError::UnknownProvider("mpesa".to_string());
        assert_eq!(err.to_string(), "Unknown provider: mpesa");

        let err = CallbackError::TransactionNotFound("OM-404".to_string());
        assert_eq!(err.to_string(), "No transaction for external id: OM-404");
    }
}
