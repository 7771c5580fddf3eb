//! Payment orchestrator.
//!
//! The façade the rest of the platform calls: resolves the order, screens the
//! request through the security validator, dispatches to a gateway adapter,
//! and owns every mutation of a transaction's status. Status writes go
//! through the store's conditional update, which is what makes repeated
//! status reports and replayed callbacks safe no-ops.

use crate::database::error::DatabaseError;
use crate::database::repository::{OrderStore, TransactionStore};
use crate::database::transaction_repository::{
    NewTransaction, PaymentStatistics, PaymentTransaction, StatsRange, StatusChanges,
    TransactionFilter,
};
use crate::gateways::phone::Msisdn;
use crate::gateways::registry::GatewayRegistry;
use crate::gateways::types::{ChargeRequest, TransactionStatus};
use crate::security::audit::AuditContext;
use crate::security::validator::SecurityValidator;
use crate::services::notification::{NotificationService, NotificationType};
use crate::services::rewards::RewardsSink;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Payment provider unavailable: {code}")]
    ProviderUnavailable { code: String },

    #[error("Payment request rejected by fraud screening (risk score {risk_score})")]
    FraudRejected { risk_score: u8, factors: Vec<String> },

    #[error("Transaction already completed: {transaction_id}")]
    AlreadyCompleted { transaction_id: Uuid },

    #[error("Transaction not found: {transaction_id}")]
    TransactionNotFound { transaction_id: String },

    #[error("Storage error: {0}")]
    Store(#[from] DatabaseError),
}

/// Payment request as the caller hands it over.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePayment {
    pub order_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub provider_code: String,
    pub phone_number: Option<String>,
    pub customer_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResult {
    pub success: bool,
    pub transaction_id: Option<Uuid>,
    pub external_transaction_id: Option<String>,
    pub status: TransactionStatus,
    pub message: String,
    pub redirect_url: Option<String>,
}

impl PaymentResult {
    fn snapshot(txn: &PaymentTransaction, message: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(txn.id),
            external_transaction_id: txn.external_transaction_id.clone(),
            status: txn.status,
            message: message.into(),
            redirect_url: None,
        }
    }
}

/// Result of pushing an externally-reported status into a transaction.
#[derive(Debug, Clone)]
pub struct AppliedUpdate {
    pub previous_status: TransactionStatus,
    pub transaction: PaymentTransaction,
    /// False when the idempotent-update rule skipped the transition.
    pub applied: bool,
}

pub struct PaymentOrchestrator {
    registry: Arc<GatewayRegistry>,
    transactions: Arc<dyn TransactionStore>,
    orders: Arc<dyn OrderStore>,
    validator: Arc<SecurityValidator>,
    rewards: Arc<dyn RewardsSink>,
    notifications: Arc<NotificationService>,
}

impl PaymentOrchestrator {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        transactions: Arc<dyn TransactionStore>,
        orders: Arc<dyn OrderStore>,
        validator: Arc<SecurityValidator>,
        rewards: Arc<dyn RewardsSink>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            registry,
            transactions,
            orders,
            validator,
            rewards,
            notifications,
        }
    }

    /// Create a payment attempt against an order. Order resolution, provider
    /// resolution and the fraud pre-check all happen before anything is
    /// persisted; a rejected request leaves no transaction row behind.
    pub async fn create_payment(
        &self,
        request: CreatePayment,
        ctx: &AuditContext,
    ) -> OrchestratorResult<PaymentResult> {
        let order = self
            .orders
            .find_by_id(&request.order_id)
            .await?
            .ok_or_else(|| OrchestratorError::OrderNotFound {
                order_id: request.order_id.clone(),
            })?;

        let gateway = self
            .registry
            .resolve_active(&request.provider_code)
            .map_err(|e| {
                warn!(provider = %request.provider_code, error = %e, "provider resolution failed");
                OrchestratorError::ProviderUnavailable {
                    code: request.provider_code.clone(),
                }
            })?;

        let msisdn = request.phone_number.as_deref().and_then(Msisdn::parse);
        let recent = match &msisdn {
            Some(msisdn) => {
                let since = Utc::now() - self.validator.fraud_window();
                self.transactions
                    .recent_by_phone(&msisdn.international(), since)
                    .await?
            }
            None => Vec::new(),
        };

        let assessment = self
            .validator
            .assess_payment_request(&request, &recent, ctx);
        if !assessment.report.is_valid {
            return Err(OrchestratorError::Validation {
                message: assessment.report.errors.join("; "),
            });
        }
        if assessment.high_risk {
            let factors = assessment
                .fraud
                .map(|f| f.factors)
                .unwrap_or_else(|| assessment.report.warnings.clone());
            return Err(OrchestratorError::FraudRejected {
                risk_score: assessment.report.risk_score,
                factors,
            });
        }

        let txn = self
            .transactions
            .insert(NewTransaction {
                id: Uuid::new_v4(),
                order_id: order.id.clone(),
                provider: gateway.code(),
                amount: request.amount.clone(),
                currency: request.currency.clone(),
                phone_number: msisdn.as_ref().map(|m| m.international()),
            })
            .await?;
        info!(
            transaction_id = %txn.id,
            order_id = %order.id,
            provider = %gateway.code(),
            amount = %txn.amount,
            "payment transaction created"
        );

        let charge = ChargeRequest {
            transaction_id: txn.id,
            order_id: order.id.clone(),
            amount: request.amount.clone(),
            currency: request.currency.clone(),
            phone_number: msisdn.as_ref().map(|m| m.international()),
            customer_name: request.customer_name.clone().or(order.customer_name),
            description: request
                .description
                .unwrap_or_else(|| format!("AtlasEats order {}", order.id)),
        };

        match gateway.create_payment(&charge).await {
            Ok(response) => {
                let updated = self
                    .transactions
                    .update_status_if_in(
                        txn.id,
                        TransactionStatus::Processing,
                        &[TransactionStatus::Pending],
                        StatusChanges {
                            external_transaction_id: response.external_transaction_id.clone(),
                            ..Default::default()
                        },
                    )
                    .await?;
                if updated.is_none() {
                    warn!(transaction_id = %txn.id, "acknowledged transaction was no longer pending");
                }
                info!(
                    transaction_id = %txn.id,
                    external_transaction_id = response.external_transaction_id.as_deref().unwrap_or(""),
                    "gateway acknowledged payment request"
                );

                Ok(PaymentResult {
                    success: true,
                    transaction_id: Some(txn.id),
                    external_transaction_id: response.external_transaction_id,
                    status: TransactionStatus::Processing,
                    message: response.message,
                    redirect_url: response.redirect_url,
                })
            }
            Err(e) => {
                let message = e.user_message();
                warn!(transaction_id = %txn.id, error = %e, "gateway rejected payment request");
                let failed = self
                    .transactions
                    .update_status_if_in(
                        txn.id,
                        TransactionStatus::Failed,
                        &[TransactionStatus::Pending],
                        StatusChanges {
                            error_message: Some(message.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                if let Some(failed) = failed {
                    self.notifications
                        .send_status_notification(
                            &failed,
                            NotificationType::PaymentFailed,
                            &message,
                        )
                        .await;
                }

                Ok(PaymentResult {
                    success: false,
                    transaction_id: Some(txn.id),
                    external_transaction_id: None,
                    status: TransactionStatus::Failed,
                    message,
                    redirect_url: None,
                })
            }
        }
    }

    /// Poll the owning gateway for a transaction's current status and apply
    /// it under the idempotent-update rule.
    pub async fn check_payment_status(
        &self,
        transaction_id: Uuid,
    ) -> OrchestratorResult<PaymentResult> {
        let txn = self.require_transaction(transaction_id).await?;

        if txn.status.is_terminal() {
            return Ok(PaymentResult::snapshot(
                &txn,
                format!("transaction is already {}", txn.status),
            ));
        }
        let Some(external_id) = txn.external_transaction_id.clone() else {
            return Ok(PaymentResult::snapshot(
                &txn,
                "transaction has not been acknowledged by the gateway yet",
            ));
        };

        let gateway = self.registry.get(txn.provider).ok_or_else(|| {
            OrchestratorError::ProviderUnavailable {
                code: txn.provider.to_string(),
            }
        })?;

        let gateway_status = match gateway.check_status(&external_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(transaction_id = %txn.id, error = %e, "status check failed");
                return Ok(PaymentResult {
                    success: false,
                    transaction_id: Some(txn.id),
                    external_transaction_id: Some(external_id),
                    status: txn.status,
                    message: e.user_message(),
                    redirect_url: None,
                });
            }
        };

        let (updated, _) = self
            .apply_transition(
                &txn,
                gateway_status.status,
                Some(gateway_status.message.clone()),
                None,
            )
            .await?;

        Ok(PaymentResult::snapshot(&updated, gateway_status.message))
    }

    /// Cancel a transaction. The gateway call is best-effort; locally the
    /// orchestrator is authoritative and the transaction ends up `cancelled`
    /// whatever the gateway said. The one cancellation failure surfaced as a
    /// named error is a transaction that already completed.
    pub async fn cancel_transaction(
        &self,
        transaction_id: Uuid,
    ) -> OrchestratorResult<PaymentResult> {
        let txn = self.require_transaction(transaction_id).await?;

        if txn.status == TransactionStatus::Completed {
            return Err(OrchestratorError::AlreadyCompleted {
                transaction_id: txn.id,
            });
        }
        if txn.status.is_terminal() {
            info!(transaction_id = %txn.id, status = %txn.status, "cancel requested on terminal transaction, no-op");
            return Ok(PaymentResult::snapshot(
                &txn,
                format!("transaction is already {}", txn.status),
            ));
        }

        if let Some(external_id) = txn.external_transaction_id.as_deref() {
            if let Some(gateway) = self.registry.get(txn.provider) {
                match gateway.cancel(external_id).await {
                    Ok(outcome) => info!(
                        transaction_id = %txn.id,
                        gateway_success = outcome.success,
                        message = %outcome.message,
                        "gateway cancellation attempted"
                    ),
                    Err(e) => warn!(
                        transaction_id = %txn.id,
                        error = %e,
                        "gateway cancellation failed, cancelling locally anyway"
                    ),
                }
            }
        }

        let (updated, applied) = self
            .apply_transition(
                &txn,
                TransactionStatus::Cancelled,
                Some("cancelled by caller".to_string()),
                None,
            )
            .await?;
        if applied {
            self.notifications
                .send_status_notification(
                    &updated,
                    NotificationType::PaymentCancelled,
                    "payment cancelled",
                )
                .await;
        }

        Ok(PaymentResult::snapshot(&updated, "transaction cancelled"))
    }

    /// Apply a status reported by a gateway callback, resolved by the
    /// external transaction id. Used by the callback processor.
    pub async fn apply_external_status(
        &self,
        external_id: &str,
        new_status: TransactionStatus,
        message: Option<String>,
        callback_data: Option<JsonValue>,
    ) -> OrchestratorResult<AppliedUpdate> {
        let txn = self
            .transactions
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| OrchestratorError::TransactionNotFound {
                transaction_id: external_id.to_string(),
            })?;

        let previous_status = txn.status;
        let (transaction, applied) = self
            .apply_transition(&txn, new_status, message, callback_data)
            .await?;

        Ok(AppliedUpdate {
            previous_status,
            transaction,
            applied,
        })
    }

    pub async fn transaction_history(
        &self,
        filter: &TransactionFilter,
    ) -> OrchestratorResult<Vec<PaymentTransaction>> {
        Ok(self.transactions.list(filter).await?)
    }

    pub async fn payment_statistics(
        &self,
        range: &StatsRange,
    ) -> OrchestratorResult<PaymentStatistics> {
        Ok(self.transactions.statistics(range).await?)
    }

    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> OrchestratorResult<PaymentTransaction> {
        self.require_transaction(transaction_id).await
    }

    async fn require_transaction(
        &self,
        transaction_id: Uuid,
    ) -> OrchestratorResult<PaymentTransaction> {
        self.transactions
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| OrchestratorError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })
    }

    /// The shared idempotent-update path. A transition is attempted only when
    /// the state machine allows it from some status, and the store applies it
    /// only when the row is still in one of those statuses. The completion
    /// side effects fire exclusively from the branch that actually performed
    /// the `processing -> completed` transition.
    async fn apply_transition(
        &self,
        txn: &PaymentTransaction,
        new_status: TransactionStatus,
        message: Option<String>,
        callback_data: Option<JsonValue>,
    ) -> OrchestratorResult<(PaymentTransaction, bool)> {
        if new_status == txn.status {
            info!(
                transaction_id = %txn.id,
                status = %txn.status,
                "status unchanged, nothing to apply"
            );
            return Ok((txn.clone(), false));
        }

        let allowed = TransactionStatus::allowed_sources(new_status);
        if allowed.is_empty() {
            info!(
                transaction_id = %txn.id,
                current = %txn.status,
                proposed = %new_status,
                "no status may transition into the proposed one, skipping"
            );
            return Ok((txn.clone(), false));
        }

        let changes = StatusChanges {
            external_transaction_id: None,
            error_message: if new_status == TransactionStatus::Failed {
                message.clone()
            } else {
                None
            },
            callback_data,
            completed_at: if new_status == TransactionStatus::Completed {
                Some(Utc::now())
            } else {
                None
            },
        };

        match self
            .transactions
            .update_status_if_in(txn.id, new_status, &allowed, changes)
            .await?
        {
            Some(updated) => {
                info!(
                    transaction_id = %updated.id,
                    from = %txn.status,
                    to = %updated.status,
                    "transaction status transitioned"
                );
                match new_status {
                    TransactionStatus::Completed => {
                        self.dispatch_completion_hooks(&updated).await;
                    }
                    TransactionStatus::Failed => {
                        self.notifications
                            .send_status_notification(
                                &updated,
                                NotificationType::PaymentFailed,
                                message.as_deref().unwrap_or("payment failed"),
                            )
                            .await;
                    }
                    _ => {}
                }
                Ok((updated, true))
            }
            None => {
                info!(
                    transaction_id = %txn.id,
                    current = %txn.status,
                    proposed = %new_status,
                    "transition not applicable, idempotent no-op"
                );
                Ok((txn.clone(), false))
            }
        }
    }

    /// Loyalty credit and promotion consumption, exactly once per completed
    /// transaction. One-way calls: a rewards failure never rolls back the
    /// completed payment.
    async fn dispatch_completion_hooks(&self, txn: &PaymentTransaction) {
        self.rewards
            .credit_loyalty_points(&txn.order_id, &txn.amount)
            .await;
        self.rewards.consume_promotion(&txn.order_id).await;
        self.notifications
            .send_status_notification(txn, NotificationType::PaymentCompleted, "payment completed")
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_subject() {
        let err = OrchestratorError::OrderNotFound {
            order_id: "O42".to_string(),
        };
        assert_eq!(err.to_string(), "Order not found: O42");

        let id = Uuid::new_v4();
        let err = OrchestratorError::AlreadyCompleted {
            transaction_id: id,
        };
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn fraud_rejection_reports_the_score() {
        let err = OrchestratorError::FraudRejected {
            risk_score: 85,
            factors: vec!["velocity".to_string()],
        };
        assert!(err.to_string().contains("85"));
    }
}
