use crate::gateways::error::GatewayError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GatewayCode {
    OrangeMoney,
    InwiMoney,
    CashPlus,
}

impl GatewayCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayCode::OrangeMoney => "orange_money",
            GatewayCode::InwiMoney => "inwi_money",
            GatewayCode::CashPlus => "cash_plus",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GatewayCode::OrangeMoney => "Orange Money",
            GatewayCode::InwiMoney => "inwi money",
            GatewayCode::CashPlus => "CashPlus",
        }
    }
}

impl TryFrom<String> for GatewayCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GatewayCode::from_str(&value).map_err(|_| format!("unknown gateway code: {}", value))
    }
}

impl std::fmt::Display for GatewayCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GatewayCode {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "orange_money" | "orange" => Ok(GatewayCode::OrangeMoney),
            "inwi_money" | "inwi" => Ok(GatewayCode::InwiMoney),
            "cash_plus" | "cashplus" => Ok(GatewayCode::CashPlus),
            _ => Err(GatewayError::Validation {
                message: format!("unsupported payment provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

/// Status of a payment transaction. Terminal statuses are never overwritten;
/// every mutation goes through a conditional update checked against
/// `valid_transitions`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn valid_transitions(&self) -> Vec<TransactionStatus> {
        match self {
            TransactionStatus::Pending => vec![
                TransactionStatus::Processing,
                TransactionStatus::Failed,
                TransactionStatus::Cancelled,
            ],
            TransactionStatus::Processing => vec![
                TransactionStatus::Completed,
                TransactionStatus::Failed,
                TransactionStatus::Cancelled,
            ],
            // Terminal statuses
            TransactionStatus::Completed
            | TransactionStatus::Failed
            | TransactionStatus::Cancelled => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
        )
    }

    /// Every status a transition into `target` is allowed from.
    pub fn allowed_sources(target: TransactionStatus) -> Vec<TransactionStatus> {
        [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ]
        .into_iter()
        .filter(|s| s.valid_transitions().contains(&target))
        .collect()
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_db_str(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "processing" => Some(TransactionStatus::Processing),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransactionStatus::from_db_str(&value)
            .ok_or_else(|| format!("unknown transaction status: {}", value))
    }
}

/// Per-gateway connection settings, supplied through the environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub merchant_id: String,
    pub api_key: String,
    pub secret_key: Option<String>,
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub test_mode: bool,
}

impl GatewayConfig {
    /// Read a gateway's settings from `<PREFIX>_API_URL`, `<PREFIX>_MERCHANT_ID`, ...
    pub fn from_env(prefix: &str, default_api_url: &str) -> Result<Self, GatewayError> {
        let var = |suffix: &str| std::env::var(format!("{}_{}", prefix, suffix));

        let merchant_id = var("MERCHANT_ID").map_err(|_| GatewayError::Validation {
            message: format!("{}_MERCHANT_ID environment variable is required", prefix),
            field: Some(format!("{}_MERCHANT_ID", prefix)),
        })?;
        let api_key = var("API_KEY").map_err(|_| GatewayError::Validation {
            message: format!("{}_API_KEY environment variable is required", prefix),
            field: Some(format!("{}_API_KEY", prefix)),
        })?;

        Ok(Self {
            api_url: var("API_URL").unwrap_or_else(|_| default_api_url.to_string()),
            merchant_id,
            api_key,
            secret_key: var("SECRET_KEY").ok(),
            webhook_url: var("WEBHOOK_URL").ok(),
            timeout_ms: var("TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            retry_attempts: var("RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
            test_mode: var("TEST_MODE")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
        })
    }
}

/// Payment creation request handed to an adapter.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub transaction_id: Uuid,
    pub order_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub phone_number: Option<String>,
    pub customer_name: Option<String>,
    pub description: String,
}

impl ChargeRequest {
    pub fn validate_amount(&self) -> Result<(), GatewayError> {
        if self.amount <= BigDecimal::from(0) {
            return Err(GatewayError::Validation {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(GatewayError::Validation {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub external_transaction_id: Option<String>,
    pub status: TransactionStatus,
    pub message: String,
    pub redirect_url: Option<String>,
    pub callback_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub status: TransactionStatus,
    pub message: String,
    pub amount: Option<BigDecimal>,
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub success: bool,
    pub message: String,
}

/// Result of an adapter's structural callback check. Final acceptance also
/// requires the security validator's signature and timestamp checks.
#[derive(Debug, Clone, Default)]
pub struct CallbackValidation {
    pub is_valid: bool,
    pub external_transaction_id: Option<String>,
    pub native_status: Option<String>,
    pub amount: Option<BigDecimal>,
    pub errors: Vec<String>,
}

impl CallbackValidation {
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            ..Default::default()
        }
    }
}
