use crate::gateways::error::{GatewayError, GatewayResult};
use crate::gateways::gateway::MobileMoneyGateway;
use crate::gateways::http::GatewayHttpClient;
use crate::gateways::phone::Msisdn;
use crate::gateways::types::{
    CallbackValidation, CancellationOutcome, ChargeRequest, ChargeResponse, GatewayCode,
    GatewayConfig, GatewayStatus, TransactionStatus,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// CashPlus adapter. The customer settles in cash at an agent counter against
/// a voucher; the voucher reference is our external transaction id. CashPlus
/// does not sign its callbacks, so only structural and merchant checks apply.
pub struct CashPlusGateway {
    config: GatewayConfig,
    http: GatewayHttpClient,
}

impl CashPlusGateway {
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
}

#[async_trait]
impl MobileMoneyGateway for CashPlusGateway {
    fn code(&self) -> GatewayCode {
        GatewayCode::CashPlus
    }

    async fn create_payment(&self, request: &ChargeRequest) -> GatewayResult<ChargeResponse> {
        request.validate_amount()?;
        // Phone is optional for counter payments, but when present it must be
        // a valid local number for the SMS voucher.
        let local_phone = match request.phone_number.as_deref() {
            Some(raw) => Some(
                Msisdn::parse(raw)
                    .ok_or(GatewayError::Validation {
                        message: format!("invalid Moroccan mobile number: {}", raw),
                        field: Some("phone_number".to_string()),
                    })?
                    .local(),
            ),
            None => None,
        };

        let payload = serde_json::json!({
            "partner_id": self.config.merchant_id,
            "reference": request.transaction_id.to_string(),
            "order_id": request.order_id,
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "beneficiary_phone": local_phone,
            "label": request.description,
        });

        let raw: CashPlusVoucher = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/vouchers"),
                Some(&self.config.api_key),
                Some(&payload),
                &[("Content-Type", "application/json")],
            )
            .await?;

        info!(voucher = %raw.voucher_code, "cash_plus voucher issued");

        Ok(ChargeResponse {
            external_transaction_id: Some(raw.voucher_code.clone()),
            status: TransactionStatus::Processing,
            message: format!(
                "voucher {} issued; payable at any CashPlus agent",
                raw.voucher_code
            ),
            redirect_url: None,
            callback_data: Some(serde_json::json!({
                "voucher_code": raw.voucher_code,
                "expires_at": raw.expires_at,
            })),
        })
    }

    async fn check_status(&self, external_id: &str) -> GatewayResult<GatewayStatus> {
        let raw: CashPlusVoucherState = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/vouchers/{}", external_id)),
                Some(&self.config.api_key),
                None,
                &[],
            )
            .await?;

        Ok(GatewayStatus {
            status: self.map_callback_status(&raw.state),
            message: format!("cash_plus voucher is {}", raw.state),
            amount: raw
                .amount
                .as_deref()
                .and_then(|v| BigDecimal::from_str(v).ok()),
            transaction_date: None,
        })
    }

    async fn cancel(&self, external_id: &str) -> GatewayResult<CancellationOutcome> {
        let raw: CashPlusVoucherState = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/vouchers/{}/void", external_id)),
                Some(&self.config.api_key),
                Some(&serde_json::json!({ "partner_id": self.config.merchant_id })),
                &[("Content-Type", "application/json")],
            )
            .await?;

        let voided = raw.state.to_uppercase() == "VOID";
        Ok(CancellationOutcome {
            success: voided,
            message: if voided {
                "voucher voided".to_string()
            } else {
                format!("voucher could not be voided, state is {}", raw.state)
            },
        })
    }

    fn validate_callback_data(&self, payload: &JsonValue) -> CallbackValidation {
        let mut errors = Vec::new();

        let voucher = payload
            .get("voucher_code")
            .or_else(|| payload.get("transaction_id"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if voucher.is_none() {
            errors.push("missing voucher_code".to_string());
        }

        let native_status = payload
            .get("state")
            .or_else(|| payload.get("status"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if native_status.is_none() {
            errors.push("missing state".to_string());
        }

        match payload.get("partner_id").and_then(|v| v.as_str()) {
            Some(partner) if partner == self.config.merchant_id => {}
            Some(_) => errors.push("partner_id does not match this partner".to_string()),
            None => errors.push("missing partner_id".to_string()),
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
            external_transaction_id: voucher,
            native_status,
            amount,
            errors,
        }
    }

    fn map_native_status(&self, native_status: &str) -> Option<TransactionStatus> {
        match native_status.to_uppercase().as_str() {
            "NEW" | "AWAITING_PAYMENT" => Some(TransactionStatus::Processing),
            "PAID" => Some(TransactionStatus::Completed),
            "EXPIRED" | "REJECTED" => Some(TransactionStatus::Failed),
            "VOID" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    fn supports_signatures(&self) -> bool {
        false
    }

    fn verify_signature(&self, _payload: &[u8], _signature: &str) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct CashPlusVoucher {
    voucher_code: String,
    #[serde(default)]
    expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CashPlusVoucherState {
    state: String,
    #[serde(default)]
    amount: Option<String>,
}
