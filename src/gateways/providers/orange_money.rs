use crate::gateways::error::{GatewayError, GatewayResult};
use crate::gateways::gateway::MobileMoneyGateway;
use crate::gateways::http::{verify_hmac_sha256_hex, GatewayHttpClient};
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

/// Orange Money WebPay adapter. Numbers are sent in the `212...` form;
/// callbacks are signed with HMAC-SHA256 over the raw body.
pub struct OrangeMoneyGateway {
    config: GatewayConfig,
    http: GatewayHttpClient,
}

impl OrangeMoneyGateway {
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

    fn require_msisdn(request: &ChargeRequest) -> GatewayResult<Msisdn> {
        let raw = request
            .phone_number
            .as_deref()
            .ok_or(GatewayError::Validation {
                message: "phone_number is required for orange_money payments".to_string(),
                field: Some("phone_number".to_string()),
            })?;
        Msisdn::parse(raw).ok_or(GatewayError::Validation {
            message: format!("invalid Moroccan mobile number: {}", raw),
            field: Some("phone_number".to_string()),
        })
    }
}

#[async_trait]
impl MobileMoneyGateway for OrangeMoneyGateway {
    fn code(&self) -> GatewayCode {
        GatewayCode::OrangeMoney
    }

    async fn create_payment(&self, request: &ChargeRequest) -> GatewayResult<ChargeResponse> {
        request.validate_amount()?;
        let msisdn = Self::require_msisdn(request)?;

        let payload = serde_json::json!({
            "merchant_id": self.config.merchant_id,
            "order_id": request.order_id,
            "reference": request.transaction_id.to_string(),
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "subscriber_msisdn": msisdn.unprefixed(),
            "description": request.description,
            "notif_url": self.config.webhook_url,
            "lang": "fr",
        });

        let raw: OrangeEnvelope<OrangeChargeData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/webpayment"),
                Some(&self.config.api_key),
                Some(&payload),
                &[("Content-Type", "application/json")],
            )
            .await?;

        if raw.status.to_uppercase() != "OK" {
            return Err(GatewayError::Rejected {
                gateway: "orange_money".to_string(),
                message: raw.message,
                gateway_code: raw.code,
            });
        }
        let data = raw.data.ok_or(GatewayError::InvalidResponse {
            gateway: "orange_money".to_string(),
            message: "missing data in webpayment response".to_string(),
        })?;
        info!(txn_id = %data.txn_id, "orange_money payment initiated");

        Ok(ChargeResponse {
            external_transaction_id: Some(data.txn_id.clone()),
            status: TransactionStatus::Processing,
            message: "payment request accepted by Orange Money".to_string(),
            redirect_url: data.payment_url,
            callback_data: Some(serde_json::json!({
                "pay_token": data.pay_token,
                "txn_id": data.txn_id,
            })),
        })
    }

    async fn check_status(&self, external_id: &str) -> GatewayResult<GatewayStatus> {
        let raw: OrangeEnvelope<OrangeStatusData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/webpayment/{}", external_id)),
                Some(&self.config.api_key),
                None,
                &[],
            )
            .await?;

        if raw.status.to_uppercase() != "OK" {
            return Err(GatewayError::Rejected {
                gateway: "orange_money".to_string(),
                message: raw.message,
                gateway_code: raw.code,
            });
        }
        let data = raw.data.ok_or(GatewayError::InvalidResponse {
            gateway: "orange_money".to_string(),
            message: "missing data in status response".to_string(),
        })?;

        Ok(GatewayStatus {
            status: self.map_callback_status(&data.txn_status),
            message: format!("orange_money reports {}", data.txn_status),
            amount: data
                .amount
                .as_deref()
                .and_then(|v| BigDecimal::from_str(v).ok()),
            transaction_date: data
                .txn_date
                .as_deref()
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|v| v.with_timezone(&Utc)),
        })
    }

    async fn cancel(&self, external_id: &str) -> GatewayResult<CancellationOutcome> {
        let raw: OrangeEnvelope<JsonValue> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/webpayment/{}/cancel", external_id)),
                Some(&self.config.api_key),
                Some(&serde_json::json!({ "merchant_id": self.config.merchant_id })),
                &[("Content-Type", "application/json")],
            )
            .await?;

        let success = raw.status.to_uppercase() == "OK";
        Ok(CancellationOutcome {
            success,
            message: if success {
                "cancellation accepted by Orange Money".to_string()
            } else {
                raw.message
            },
        })
    }

    fn validate_callback_data(&self, payload: &JsonValue) -> CallbackValidation {
        let mut errors = Vec::new();

        let txn_id = payload
            .get("txn_id")
            .or_else(|| payload.get("transaction_id"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if txn_id.is_none() {
            errors.push("missing txn_id".to_string());
        }

        let native_status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if native_status.is_none() {
            errors.push("missing status".to_string());
        }

        match payload.get("merchant_id").and_then(|v| v.as_str()) {
            Some(merchant) if merchant == self.config.merchant_id => {}
            Some(_) => errors.push("merchant_id does not match this merchant".to_string()),
            None => errors.push("missing merchant_id".to_string()),
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
            external_transaction_id: txn_id,
            native_status,
            amount,
            errors,
        }
    }

    fn map_native_status(&self, native_status: &str) -> Option<TransactionStatus> {
        match native_status.to_uppercase().as_str() {
            "INITIATED" | "PENDING" => Some(TransactionStatus::Processing),
            "SUCCESS" | "SUCCESSFUL" | "PAID" => Some(TransactionStatus::Completed),
            "FAILED" | "EXPIRED" => Some(TransactionStatus::Failed),
            "CANCELLED" | "CANCELED" => Some(TransactionStatus::Cancelled),
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
        verify_hmac_sha256_hex(payload, secret, signature)
    }
}

#[derive(Debug, Deserialize)]
struct OrangeEnvelope<T> {
    status: String,
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct OrangeChargeData {
    txn_id: String,
    #[serde(default)]
    payment_url: Option<String>,
    #[serde(default)]
    pay_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OrangeStatusData {
    txn_status: String,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    txn_date: Option<String>,
}
