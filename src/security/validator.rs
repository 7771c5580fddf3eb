use crate::database::transaction_repository::PaymentTransaction;
use crate::gateways::gateway::MobileMoneyGateway;
use crate::gateways::phone::Msisdn;
use crate::gateways::types::CallbackValidation;
use crate::security::audit::{AuditContext, AuditStatus, AuditTrail};
use crate::security::fraud::{self, FraudConfig, FraudSignal};
use crate::services::payment_orchestrator::CreatePayment;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Timelike, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::{Arc, OnceLock};
use tracing::debug;

pub const RISK_MISSING_FIELD: u8 = 25;
pub const RISK_HIGH_VALUE: u8 = 15;
pub const RISK_OFF_HOURS: u8 = 10;
pub const RISK_SUSPICIOUS_NAME: u8 = 10;
pub const RISK_SUSPICIOUS_PHONE: u8 = 10;
pub const RISK_MISSING_SIGNATURE: u8 = 10;
pub const RISK_INVALID_SIGNATURE: u8 = 40;
pub const RISK_STALE_CALLBACK: u8 = 15;
pub const RISK_UNKNOWN_STATUS: u8 = 10;

static SUSPICIOUS_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn suspicious_name_re() -> &'static Regex {
    SUSPICIOUS_NAME_RE
        .get_or_init(|| Regex::new(r#"[<>{}$;"\\]|[\x00-\x1f]"#).expect("valid regex"))
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub high_value_threshold: BigDecimal,
    pub callback_staleness_secs: i64,
    pub fraud: FraudConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: BigDecimal::from(10_000),
            callback_staleness_secs: 300,
            fraud: FraudConfig::default(),
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            high_value_threshold: std::env::var("HIGH_VALUE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.high_value_threshold),
            callback_staleness_secs: std::env::var("CALLBACK_STALENESS_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.callback_staleness_secs),
            fraud: FraudConfig::from_env(),
        }
    }
}

/// Outcome of one validation pass. Transient; only the audit entry derived
/// from it survives the call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub risk_score: u8,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            risk_score: 0,
        }
    }

    fn error(&mut self, message: impl Into<String>, weight: u8) {
        self.errors.push(message.into());
        self.is_valid = false;
        self.risk_score = self.risk_score.saturating_add(weight).min(100);
    }

    fn warning(&mut self, message: impl Into<String>, weight: u8) {
        self.warnings.push(message.into());
        self.risk_score = self.risk_score.saturating_add(weight).min(100);
    }

    fn absorb_score(&mut self, extra: u8) {
        self.risk_score = self.risk_score.saturating_add(extra).min(100);
    }

    fn audit_status(&self) -> AuditStatus {
        if !self.errors.is_empty() {
            AuditStatus::Failure
        } else if !self.warnings.is_empty() {
            AuditStatus::Warning
        } else {
            AuditStatus::Success
        }
    }

    fn summary(&self) -> String {
        if !self.errors.is_empty() {
            format!("errors: {}", self.errors.join("; "))
        } else if !self.warnings.is_empty() {
            format!("warnings: {}", self.warnings.join("; "))
        } else {
            "clean".to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestAssessment {
    pub report: ValidationReport,
    pub fraud: Option<FraudSignal>,
    pub high_risk: bool,
}

/// Validates payment requests before dispatch and callbacks before they are
/// allowed to touch state. Every pass leaves one entry on the audit trail.
pub struct SecurityValidator {
    config: SecurityConfig,
    audit: Arc<AuditTrail>,
}

impl SecurityValidator {
    pub fn new(config: SecurityConfig, audit: Arc<AuditTrail>) -> Self {
        Self { config, audit }
    }

    pub fn trail(&self) -> &AuditTrail {
        &self.audit
    }

    /// How far back the fraud engine looks; callers fetch recent transactions
    /// over this window before asking for an assessment.
    pub fn fraud_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.config.fraud.window_minutes)
    }

    pub fn record_rejection(&self, action: &str, ctx: &AuditContext, details: String, risk: u8) {
        self.audit
            .record(action, ctx, AuditStatus::Failure, details, risk);
    }

    pub fn assess_payment_request(
        &self,
        request: &CreatePayment,
        recent: &[PaymentTransaction],
        ctx: &AuditContext,
    ) -> RequestAssessment {
        self.assess_payment_request_at(request, recent, ctx, Utc::now())
    }

    pub fn assess_payment_request_at(
        &self,
        request: &CreatePayment,
        recent: &[PaymentTransaction],
        ctx: &AuditContext,
        now: DateTime<Utc>,
    ) -> RequestAssessment {
        let mut report = ValidationReport::new();

        if request.order_id.trim().is_empty() {
            report.error("order id is required", RISK_MISSING_FIELD);
        }
        if request.amount <= BigDecimal::from(0) {
            report.error("amount must be greater than zero", RISK_MISSING_FIELD);
        }
        if request.provider_code.trim().is_empty() {
            report.error("provider code is required", RISK_MISSING_FIELD);
        }

        let mut msisdn = None;
        if let Some(raw_phone) = request.phone_number.as_deref() {
            match Msisdn::parse(raw_phone) {
                Some(parsed) => {
                    if parsed.is_degenerate() {
                        report.warning(
                            format!("phone number {} matches a degenerate pattern", parsed),
                            RISK_SUSPICIOUS_PHONE,
                        );
                    }
                    msisdn = Some(parsed);
                }
                None => report.error(
                    format!("malformed phone number: {}", raw_phone),
                    RISK_MISSING_FIELD,
                ),
            }
        }

        if request.amount >= self.config.high_value_threshold {
            report.warning(
                format!(
                    "amount {} is at or above the high-value threshold {}",
                    request.amount, self.config.high_value_threshold
                ),
                RISK_HIGH_VALUE,
            );
        }

        let (open, close) = self.config.fraud.operating_hours;
        let hour = now.hour();
        if hour < open || hour >= close {
            report.warning(
                format!("request at {:02}:00 UTC is outside normal operating hours", hour),
                RISK_OFF_HOURS,
            );
        }

        if let Some(name) = request.customer_name.as_deref() {
            if suspicious_name_re().is_match(name) {
                report.warning(
                    "customer name contains suspicious characters",
                    RISK_SUSPICIOUS_NAME,
                );
            }
        }

        let fraud_signal = if self.config.fraud.enabled && msisdn.is_some() {
            let signal = fraud::detect(&self.config.fraud, &request.amount, recent, now);
            report.absorb_score(signal.risk_score);
            for factor in &signal.factors {
                report.warnings.push(format!("fraud signal: {}", factor));
            }
            Some(signal)
        } else {
            None
        };

        let high_risk = report.risk_score >= self.config.fraud.high_risk_threshold;

        self.audit.record(
            "payment_request_validation",
            ctx,
            if high_risk {
                AuditStatus::Failure
            } else {
                report.audit_status()
            },
            report.summary(),
            report.risk_score,
        );
        debug!(
            order_id = %request.order_id,
            risk_score = report.risk_score,
            high_risk,
            "payment request assessed"
        );

        RequestAssessment {
            report,
            fraud: fraud_signal,
            high_risk,
        }
    }

    /// Security check of an inbound callback: signature, replay window,
    /// status vocabulary. Structural problems found by the adapter are folded
    /// in so the audit entry carries the full picture.
    pub fn validate_callback(
        &self,
        raw_body: &[u8],
        payload: &JsonValue,
        gateway: &dyn MobileMoneyGateway,
        structural: &CallbackValidation,
        signature: Option<&str>,
        ctx: &AuditContext,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        for error in &structural.errors {
            report.error(error.clone(), RISK_MISSING_FIELD);
        }

        if gateway.supports_signatures() {
            match signature {
                None => report.warning(
                    format!("{} callback arrived without a signature", gateway.code()),
                    RISK_MISSING_SIGNATURE,
                ),
                Some(sig) => {
                    if !gateway.verify_signature(raw_body, sig) {
                        report.error(
                            format!("invalid {} callback signature", gateway.code()),
                            RISK_INVALID_SIGNATURE,
                        );
                    }
                }
            }
        }

        if let Some(native) = structural.native_status.as_deref() {
            if gateway.map_native_status(native).is_none() {
                report.warning(
                    format!("unrecognized {} status: {}", gateway.code(), native),
                    RISK_UNKNOWN_STATUS,
                );
            }
        }

        if let Some(age_secs) = callback_age_secs(payload, Utc::now()) {
            if age_secs > self.config.callback_staleness_secs {
                report.warning(
                    format!("callback timestamp is {}s old, possible replay", age_secs),
                    RISK_STALE_CALLBACK,
                );
            }
        }

        self.audit.record(
            "callback_validation",
            ctx,
            report.audit_status(),
            format!("provider={} {}", gateway.code(), report.summary()),
            report.risk_score,
        );

        report
    }
}

/// Age of the callback's embedded timestamp, accepting RFC 3339 strings or
/// epoch seconds. `None` when no timestamp is present.
fn callback_age_secs(payload: &JsonValue, now: DateTime<Utc>) -> Option<i64> {
    let value = payload.get("timestamp")?;
    let parsed = match value {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|v| v.with_timezone(&Utc)),
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }?;
    Some((now - parsed).num_seconds())
}
