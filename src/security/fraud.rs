//! Fraud scoring over a customer's recent transaction activity.
//!
//! Pure: the caller fetches the recent-transaction slice for the phone number
//! in question; detection only combines signals into a score.

use crate::database::transaction_repository::PaymentTransaction;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

pub const RISK_VELOCITY: u8 = 40;
pub const RISK_REPEATED_AMOUNTS: u8 = 25;
pub const RISK_OFF_HOURS: u8 = 10;

#[derive(Debug, Clone)]
pub struct FraudConfig {
    pub enabled: bool,
    /// Window, in minutes, over which recent transactions are considered.
    pub window_minutes: i64,
    /// Transactions from one phone number within the window before the
    /// velocity signal fires.
    pub velocity_threshold: usize,
    /// Repeated near-identical amounts before the repetition signal fires.
    pub repetition_threshold: usize,
    /// Two amounts within this distance count as near-identical.
    pub amount_tolerance: BigDecimal,
    /// Aggregate score at or above which a request is outright rejected.
    pub high_risk_threshold: u8,
    /// Inclusive start and exclusive end of normal operating hours (UTC).
    pub operating_hours: (u32, u32),
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: 10,
            velocity_threshold: 5,
            repetition_threshold: 3,
            amount_tolerance: BigDecimal::from(1),
            high_risk_threshold: 70,
            operating_hours: (6, 23),
        }
    }
}

impl FraudConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("FRAUD_DETECTION_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enabled),
            window_minutes: std::env::var("FRAUD_WINDOW_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.window_minutes),
            velocity_threshold: std::env::var("FRAUD_VELOCITY_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.velocity_threshold),
            repetition_threshold: std::env::var("FRAUD_REPETITION_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.repetition_threshold),
            amount_tolerance: defaults.amount_tolerance,
            high_risk_threshold: std::env::var("FRAUD_HIGH_RISK_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.high_risk_threshold),
            operating_hours: defaults.operating_hours,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FraudSignal {
    pub is_high_risk: bool,
    pub risk_score: u8,
    pub factors: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn detect(
    config: &FraudConfig,
    amount: &BigDecimal,
    recent: &[PaymentTransaction],
    now: DateTime<Utc>,
) -> FraudSignal {
    let mut score: u8 = 0;
    let mut factors = Vec::new();
    let mut recommendations = Vec::new();

    if recent.len() >= config.velocity_threshold {
        score = score.saturating_add(RISK_VELOCITY);
        factors.push(format!(
            "{} transactions from this phone number in the last {} minutes",
            recent.len(),
            config.window_minutes
        ));
        recommendations.push("throttle further attempts from this phone number".to_string());
    }

    let near_identical = recent
        .iter()
        .filter(|t| {
            let delta = (&t.amount - amount).abs();
            delta <= config.amount_tolerance
        })
        .count();
    if near_identical >= config.repetition_threshold {
        score = score.saturating_add(RISK_REPEATED_AMOUNTS);
        factors.push(format!(
            "{} recent transactions with a near-identical amount",
            near_identical
        ));
        recommendations.push("review for automated card-testing behavior".to_string());
    }

    let hour = now.hour();
    let (open, close) = config.operating_hours;
    if hour < open || hour >= close {
        score = score.saturating_add(RISK_OFF_HOURS);
        factors.push(format!("transaction at {:02}:00 UTC, outside normal hours", hour));
    }

    let is_high_risk = score >= config.high_risk_threshold;
    if is_high_risk {
        recommendations.push("block this request and flag the account for manual review".to_string());
    }

    FraudSignal {
        is_high_risk,
        risk_score: score.min(100),
        factors,
        recommendations,
    }
}
