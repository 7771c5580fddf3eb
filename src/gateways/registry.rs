use crate::gateways::error::{GatewayError, GatewayResult};
use crate::gateways::gateway::MobileMoneyGateway;
use crate::gateways::providers::{CashPlusGateway, InwiMoneyGateway, OrangeMoneyGateway};
use crate::gateways::types::{GatewayCode, GatewayConfig};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Static catalog entry for a provider. Seeded at startup, toggled through
/// configuration, never deleted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderInfo {
    pub code: GatewayCode,
    pub display_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub enum RegistryError {
    Unknown(String),
    Inactive(GatewayCode),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Unknown(code) => write!(f, "unknown payment provider: {}", code),
            RegistryError::Inactive(code) => write!(f, "payment provider {} is inactive", code),
        }
    }
}

impl std::error::Error for RegistryError {}

struct RegistryEntry {
    info: ProviderInfo,
    gateway: Arc<dyn MobileMoneyGateway>,
}

/// Explicit adapter registry, built once at startup and injected into the
/// orchestrator and callback processor.
pub struct GatewayRegistry {
    entries: HashMap<GatewayCode, RegistryEntry>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, info: ProviderInfo, gateway: Arc<dyn MobileMoneyGateway>) {
        self.entries.insert(info.code, RegistryEntry { info, gateway });
    }

    /// Resolve an adapter for dispatching a new payment. Inactive providers
    /// are rejected here, before anything is persisted.
    pub fn resolve_active(
        &self,
        code: &str,
    ) -> Result<Arc<dyn MobileMoneyGateway>, RegistryError> {
        let parsed =
            GatewayCode::from_str(code).map_err(|_| RegistryError::Unknown(code.to_string()))?;
        let entry = self
            .entries
            .get(&parsed)
            .ok_or_else(|| RegistryError::Unknown(code.to_string()))?;
        if !entry.info.is_active {
            return Err(RegistryError::Inactive(parsed));
        }
        Ok(Arc::clone(&entry.gateway))
    }

    /// Resolve an adapter for an inbound callback. Deactivating a provider
    /// must not orphan its in-flight transactions, so the active flag is not
    /// consulted here.
    pub fn get(&self, code: GatewayCode) -> Option<Arc<dyn MobileMoneyGateway>> {
        self.entries.get(&code).map(|e| Arc::clone(&e.gateway))
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> =
            self.entries.values().map(|e| e.info.clone()).collect();
        infos.sort_by_key(|i| i.code.as_str());
        infos
    }

    /// Build the production registry from the environment. The active set
    /// comes from `ACTIVE_PAYMENT_PROVIDERS` (defaults to all three).
    pub fn from_env() -> GatewayResult<Self> {
        let active_raw = std::env::var("ACTIVE_PAYMENT_PROVIDERS")
            .unwrap_or_else(|_| "orange_money,inwi_money,cash_plus".to_string());
        let mut active = Vec::new();
        for part in active_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            active.push(GatewayCode::from_str(value)?);
        }
        if active.is_empty() {
            return Err(GatewayError::Validation {
                message: "at least one payment provider must be active".to_string(),
                field: Some("ACTIVE_PAYMENT_PROVIDERS".to_string()),
            });
        }

        let mut registry = Self::new();

        let orange_cfg =
            GatewayConfig::from_env("ORANGE_MONEY", "https://api.orange.com/orange-money-webpay")?;
        registry.register(
            info(GatewayCode::OrangeMoney, &active),
            Arc::new(OrangeMoneyGateway::new(orange_cfg)?),
        );

        let inwi_cfg = GatewayConfig::from_env("INWI_MONEY", "https://api.inwi.ma/money/v1")?;
        registry.register(
            info(GatewayCode::InwiMoney, &active),
            Arc::new(InwiMoneyGateway::new(inwi_cfg)?),
        );

        let cashplus_cfg =
            GatewayConfig::from_env("CASH_PLUS", "https://api.cashplus.ma/partner/v1")?;
        registry.register(
            info(GatewayCode::CashPlus, &active),
            Arc::new(CashPlusGateway::new(cashplus_cfg)?),
        );

        Ok(registry)
    }
}

fn info(code: GatewayCode, active: &[GatewayCode]) -> ProviderInfo {
    ProviderInfo {
        code,
        display_name: code.display_name().to_string(),
        is_active: active.contains(&code),
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::providers::CashPlusGateway;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            api_url: "https://api.example.test".to_string(),
            merchant_id: "M-1".to_string(),
            api_key: "key".to_string(),
            secret_key: None,
            webhook_url: None,
            timeout_ms: 1_000,
            retry_attempts: 0,
            test_mode: true,
        }
    }

    #[test]
    fn resolve_active_rejects_unknown_and_inactive() {
        let mut registry = GatewayRegistry::new();
        registry.register(
            ProviderInfo {
                code: GatewayCode::CashPlus,
                display_name: "CashPlus".to_string(),
                is_active: false,
            },
            Arc::new(CashPlusGateway::new(test_config()).expect("gateway init")),
        );

        assert!(matches!(
            registry.resolve_active("mpesa"),
            Err(RegistryError::Unknown(_))
        ));
        assert!(matches!(
            registry.resolve_active("orange_money"),
            Err(RegistryError::Unknown(_))
        ));
        assert!(matches!(
            registry.resolve_active("cash_plus"),
            Err(RegistryError::Inactive(GatewayCode::CashPlus))
        ));
        // Callback resolution ignores the active flag.
        assert!(registry.get(GatewayCode::CashPlus).is_some());
    }
}
