//! Unified error handling for the payment service.
//!
//! Every failure surfaced to a caller is an `AppError` with an HTTP status,
//! a stable error code for client handling, and a user-safe message. Raw
//! gateway error bodies never pass through here.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::error::DatabaseError;
use crate::gateways::error::GatewayError;
use crate::services::payment_orchestrator::OrchestratorError;
use crate::services::webhook_processor::CallbackError;

/// Stable error codes for programmatic handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "PROVIDER_UNAVAILABLE")]
    ProviderUnavailable,
    #[serde(rename = "FRAUD_REJECTED")]
    FraudRejected,
    #[serde(rename = "ALREADY_COMPLETED")]
    AlreadyCompleted,
    #[serde(rename = "INVALID_CALLBACK")]
    InvalidCallback,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502)
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,

    // Generic
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    OrderNotFound { order_id: String },
    TransactionNotFound { transaction_id: String },
    ProviderUnavailable { code: String },
    FraudRejected { risk_score: u8 },
    AlreadyCompleted { transaction_id: String },
    InvalidCallback { reason: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// External service errors (payment gateways)
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Invalid { message: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => 404,
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::ProviderUnavailable { .. } => 422,
                DomainError::FraudRejected { .. } => 403,
                DomainError::AlreadyCompleted { .. } => 409,
                DomainError::InvalidCallback { .. } => 400,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => 502,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
                DomainError::FraudRejected { .. } => ErrorCode::FraudRejected,
                DomainError::AlreadyCompleted { .. } => ErrorCode::AlreadyCompleted,
                DomainError::InvalidCallback { .. } => ErrorCode::InvalidCallback,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(_) => ErrorCode::PaymentProviderError,
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { order_id } => {
                    format!("Order '{}' not found", order_id)
                }
                DomainError::TransactionNotFound { transaction_id } => {
                    format!("Transaction '{}' not found", transaction_id)
                }
                DomainError::ProviderUnavailable { code } => {
                    format!("Payment provider '{}' is not available", code)
                }
                DomainError::FraudRejected { .. } => {
                    "Payment request was rejected by fraud screening".to_string()
                }
                DomainError::AlreadyCompleted { transaction_id } => {
                    format!(
                        "Transaction '{}' is already completed and cannot be cancelled",
                        transaction_id
                    )
                }
                DomainError::InvalidCallback { reason } => {
                    format!("Callback rejected: {}", reason)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
            },
            AppErrorKind::Validation(ValidationError::Invalid { message }) => message.clone(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(ExternalError::PaymentProvider { is_retryable, .. }) => {
                *is_retryable
            }
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let is_retryable = err.is_retryable();
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable,
        }))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::Validation { message, .. } => {
                AppError::new(AppErrorKind::Validation(ValidationError::Invalid {
                    message: message.clone(),
                }))
            }
            _ => AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
                provider: "gateway".to_string(),
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            })),
        }
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        let kind = match err {
            OrchestratorError::Validation { message } => {
                AppErrorKind::Validation(ValidationError::Invalid { message })
            }
            OrchestratorError::OrderNotFound { order_id } => {
                AppErrorKind::Domain(DomainError::OrderNotFound { order_id })
            }
            OrchestratorError::ProviderUnavailable { code } => {
                AppErrorKind::Domain(DomainError::ProviderUnavailable { code })
            }
            OrchestratorError::FraudRejected { risk_score, .. } => {
                AppErrorKind::Domain(DomainError::FraudRejected { risk_score })
            }
            OrchestratorError::AlreadyCompleted { transaction_id } => {
                AppErrorKind::Domain(DomainError::AlreadyCompleted {
                    transaction_id: transaction_id.to_string(),
                })
            }
            OrchestratorError::TransactionNotFound { transaction_id } => {
                AppErrorKind::Domain(DomainError::TransactionNotFound { transaction_id })
            }
            OrchestratorError::Store(e) => {
                let is_retryable = e.is_retryable();
                AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: e.to_string(),
                    is_retryable,
                })
            }
        };
        AppError::new(kind)
    }
}

impl From<CallbackError> for AppError {
    fn from(err: CallbackError) -> Self {
        let kind = match err {
            CallbackError::UnknownProvider(code) => {
                AppErrorKind::Domain(DomainError::ProviderUnavailable { code })
            }
            CallbackError::InvalidPayload(reason) | CallbackError::SecurityRejected(reason) => {
                AppErrorKind::Domain(DomainError::InvalidCallback { reason })
            }
            CallbackError::TransactionNotFound(external_id) => {
                AppErrorKind::Domain(DomainError::TransactionNotFound {
                    transaction_id: external_id,
                })
            }
            CallbackError::Database(e) => {
                let is_retryable = e.is_retryable();
                AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: e.to_string(),
                    is_retryable,
                })
            }
            CallbackError::Processing(message) => {
                AppErrorKind::External(ExternalError::PaymentProvider {
                    provider: "callback".to_string(),
                    message,
                    is_retryable: false,
                })
            }
        };
        AppError::new(kind)
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_not_found_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::OrderNotFound {
            order_id: "O42".to_string(),
        }));

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::OrderNotFound);
        assert!(error.user_message().contains("O42"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_fraud_rejected_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::FraudRejected {
            risk_score: 85,
        }));

        assert_eq!(error.status_code(), 403);
        assert_eq!(error.error_code(), ErrorCode::FraudRejected);
        // Risk details stay internal.
        assert!(!error.user_message().contains("85"));
    }

    #[test]
    fn test_already_completed_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::AlreadyCompleted {
            transaction_id: "tx-1".to_string(),
        }));

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::AlreadyCompleted);
    }

    #[test]
    fn test_retryable_database_error() {
        let error = AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: "pool timed out".to_string(),
            is_retryable: true,
        }));

        assert_eq!(error.status_code(), 500);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_validation_error() {
        let error = AppError::new(AppErrorKind::Validation(ValidationError::Invalid {
            message: "amount must be greater than zero".to_string(),
        }));

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(!error.is_retryable());
    }
}
