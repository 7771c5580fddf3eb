use crate::gateways::error::{GatewayError, GatewayResult};
use crate::gateways::gateway::MobileMoneyGateway;
use crate::gateways::http::{verify_hmac_sha512_hex, GatewayHttpClient};
use crate::gateways::phone::Msisdn;
use crate::gateways::types::{
    CallbackValidation, CancellationOutcome, ChargeRequest, ChargeResponse, GatewayCode,
    GatewayConfig, GatewayStatus, TransactionStatus,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// inwi money adapter. Numbers travel in the international `+212...` form;
/// callbacks are signed with HMAC-SHA512. The gateway exposes no real
/// cancellation API.
pub struct InwiMoneyGateway {
    config: GatewayConfig,
    http: GatewayHttpClient,
}

impl InwiMoneyGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http = GatewayHttpClient::new(
            Duration::from_millis(config.timeout_ms),
            config.retry_attempts,
        )?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    fn map_message_error(message: String) -> GatewayError {
        let lowered = message.to_lowercase();
        if lowered.contains("invalid")
            || lowered.contains("missing")
            || lowered.contains("unsupported")
        {
            return GatewayError::Validation {
                message,
                field: None,
            };
        }
        GatewayError::Rejected {
            gateway: "inwi_money".to_string(),
            message,
            gateway_code: None,
        }
    }
}

#[async_trait]
impl MobileMoneyGateway for InwiMoneyGateway {
    fn code(&self) -> GatewayCode {
        GatewayCode::InwiMoney
    }

    async fn create_payment(&self, request: &ChargeRequest) -> GatewayResult<ChargeResponse> {
        request.validate_amount()?;
        let raw_phone = request
            .phone_number
            .as_deref()
            .ok_or(GatewayError::Validation {
                message: "phone_number is required for inwi_money payments".to_string(),
                field: Some("phone_number".to_string()),
            })?;
        let msisdn = Msisdn::parse(raw_phone).ok_or(GatewayError::Validation {
            message: format!("invalid Moroccan mobile number: {}", raw_phone),
            field: Some("phone_number".to_string()),
        })?;

        let payload = serde_json::json!({
            "merchant": self.config.merchant_id,
            "external_reference": request.transaction_id.to_string(),
            "order_reference": request.order_id,
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "customer": {
                "msisdn": msisdn.international(),
                "name": request.customer_name,
            },
            "description": request.description,
            "callback_url": self.config.webhook_url,
        });

        let raw: InwiEnvelope = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/payments"),
                Some(&self.config.api_key),
                Some(&payload),
                &[("Content-Type", "application/json")],
            )
            .await
            .map_err(|e| match e {
                GatewayError::Rejected { message, .. } => Self::map_message_error(message),
                other => other,
            })?;

        if raw.result.to_lowercase() != "success" {
            return Err(Self::map_message_error(raw.message));
        }

        let data = raw.data.unwrap_or_else(|| serde_json::json!({}));
        let payment_id = data
            .get("payment_id")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or(GatewayError::InvalidResponse {
                gateway: "inwi_money".to_string(),
                message: "missing payment_id in create response".to_string(),
            })?;
        let push_sent = data
            .get("push_sent")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        info!(payment_id = %payment_id, push_sent, "inwi_money payment initiated");

        Ok(ChargeResponse {
            external_transaction_id: Some(payment_id),
            status: TransactionStatus::Processing,
            message: if push_sent {
                "USSD confirmation push sent to customer".to_string()
            } else {
                "payment request accepted by inwi money".to_string()
            },
            redirect_url: data
                .get("confirmation_url")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            callback_data: Some(data),
        })
    }

    async fn check_status(&self, external_id: &str) -> GatewayResult<GatewayStatus> {
        let raw: InwiEnvelope = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/payments/{}", external_id)),
                Some(&self.config.api_key),
                None,
                &[],
            )
            .await
            .map_err(|e| match e {
                GatewayError::Rejected { message, .. } => Self::map_message_error(message),
                other => other,
            })?;

        if raw.result.to_lowercase() != "success" {
            return Err(Self::map_message_error(raw.message));
        }

        let data = raw.data.unwrap_or_else(|| serde_json::json!({}));
        let native = data
            .get("state")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        Ok(GatewayStatus {
            status: self.map_callback_status(native),
            message: format!("inwi_money reports {}", native),
            amount: data.get("amount").and_then(|v| {
                v.as_str()
                    .and_then(|s| BigDecimal::from_str(s).ok())
                    .or_else(|| v.as_i64().map(BigDecimal::from))
            }),
            transaction_date: data
                .get("updated_at")
                .and_then(|v| v.as_str())
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|v| v.with_timezone(&Utc)),
        })
    }

    /// inwi money has no cancellation endpoint. An unconfirmed push expires
    /// upstream on its own; locally the orchestrator remains the source of
    /// truth for the cancelled status.
    async fn cancel(&self, external_id: &str) -> GatewayResult<CancellationOutcome> {
        info!(external_id = %external_id, "inwi_money cancellation requested, gateway has no cancel API");
        Ok(CancellationOutcome {
            success: true,
            message: "inwi money does not support remote cancellation; the pending request will expire upstream".to_string(),
        })
    }

    fn validate_callback_data(&self, payload: &JsonValue) -> CallbackValidation {
        let mut errors = Vec::new();

        let payment_id = payload
            .get("payment_id")
            .or_else(|| payload.get("transaction_id"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if payment_id.is_none() {
            errors.push("missing payment_id".to_string());
        }

        let native_status = payload
            .get("state")
            .or_else(|| payload.get("status"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if native_status.is_none() {
            errors.push("missing state".to_string());
        }

        match payload.get("merchant").and_then(|v| v.as_str()) {
            Some(merchant) if merchant == self.config.merchant_id => {}
            Some(_) => errors.push("merchant does not match this merchant".to_string()),
            None => errors.push("missing merchant".to_string()),
        }

        let amount = match payload.get("amount") {
            Some(JsonValue::String(s)) => match BigDecimal::from_str(s) {
                Ok(v) => Some(v),
                Err(_) => {
                    errors.push(format!("unparseable amount: {}", s));
                    None
                }
            },
            Some(JsonValue::Number(n)) => BigDecimal::from_str(&n.to_string()).ok(),
            Some(_) => {
                errors.push("amount has an unexpected type".to_string());
                None
            }
            None => {
                errors.push("missing amount".to_string());
                None
            }
        };

        CallbackValidation {
            is_valid: errors.is_empty(),
            external_transaction_id: payment_id,
            native_status,
            amount,
            errors,
        }
    }

    fn map_native_status(&self, native_status: &str) -> Option<TransactionStatus> {
        match native_status.to_lowercase().as_str() {
            "created" | "awaiting_confirmation" | "in_progress" => {
                Some(TransactionStatus::Processing)
            }
            "confirmed" | "success" | "successful" | "completed" => {
                Some(TransactionStatus::Completed)
            }
            "failed" | "declined" | "timeout" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    fn supports_signatures(&self) -> bool {
        true
    }

    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool {
        let secret = self
            .config
            .secret_key
            .as_deref()
            .unwrap_or(&self.config.api_key);
        verify_hmac_sha512_hex(payload, secret, signature)
    }
}

#[derive(Debug, Deserialize)]
struct InwiEnvelope {
    result: String,
    message: String,
    #[serde(default)]
    data: Option<JsonValue>,
}
