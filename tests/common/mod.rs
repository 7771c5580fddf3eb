//! Shared test doubles: in-memory stores, a scriptable mock gateway, and a
//! counting rewards sink, wired into a full orchestrator + callback
//! processor.
#![allow(dead_code)]

use async_trait::async_trait;
use atlaseats_backend::database::error::DatabaseError;
use atlaseats_backend::database::order_repository::Order;
use atlaseats_backend::database::repository::{OrderStore, TransactionStore};
use atlaseats_backend::database::transaction_repository::{
    NewTransaction, PaymentStatistics, PaymentTransaction, ProviderStats, StatsRange,
    StatusChanges, TransactionFilter,
};
use atlaseats_backend::gateways::error::{GatewayError, GatewayResult};
use atlaseats_backend::gateways::gateway::MobileMoneyGateway;
use atlaseats_backend::gateways::phone::Msisdn;
use atlaseats_backend::gateways::registry::{GatewayRegistry, ProviderInfo};
use atlaseats_backend::gateways::types::{
    CallbackValidation, CancellationOutcome, ChargeRequest, ChargeResponse, GatewayCode,
    GatewayStatus, TransactionStatus,
};
use atlaseats_backend::security::audit::AuditTrail;
use atlaseats_backend::security::fraud::FraudConfig;
use atlaseats_backend::security::validator::{SecurityConfig, SecurityValidator};
use atlaseats_backend::services::notification::NotificationService;
use atlaseats_backend::services::payment_orchestrator::PaymentOrchestrator;
use atlaseats_backend::services::rewards::RewardsSink;
use atlaseats_backend::services::webhook_processor::CallbackProcessor;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const TEST_MERCHANT: &str = "M-TEST";

// ---------------------------------------------------------------------------
// In-memory transaction store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTransactionStore {
    rows: Mutex<HashMap<Uuid, PaymentTransaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing the orchestrator. For test fixtures.
    pub fn put(&self, txn: PaymentTransaction) {
        self.rows.lock().unwrap().insert(txn.id, txn);
    }

    pub fn get(&self, id: Uuid) -> Option<PaymentTransaction> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn insert(&self, new: NewTransaction) -> Result<PaymentTransaction, DatabaseError> {
        let txn = PaymentTransaction {
            id: new.id,
            order_id: new.order_id,
            provider: new.provider,
            amount: new.amount,
            currency: new.currency,
            phone_number: new.phone_number,
            status: TransactionStatus::Pending,
            external_transaction_id: None,
            callback_data: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.rows.lock().unwrap().insert(txn.id, txn.clone());
        Ok(txn)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentTransaction>, DatabaseError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentTransaction>, DatabaseError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|t| t.external_transaction_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn update_status_if_in(
        &self,
        id: Uuid,
        new_status: TransactionStatus,
        allowed: &[TransactionStatus],
        changes: StatusChanges,
    ) -> Result<Option<PaymentTransaction>, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if !allowed.contains(&row.status) {
            return Ok(None);
        }
        row.status = new_status;
        if changes.external_transaction_id.is_some() {
            row.external_transaction_id = changes.external_transaction_id;
        }
        if changes.error_message.is_some() {
            row.error_message = changes.error_message;
        }
        if changes.callback_data.is_some() {
            row.callback_data = changes.callback_data;
        }
        if changes.completed_at.is_some() {
            row.completed_at = changes.completed_at;
        }
        Ok(Some(row.clone()))
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<PaymentTransaction> = rows
            .values()
            .filter(|t| filter.provider.map_or(true, |p| t.provider == p))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| {
                filter
                    .order_id
                    .as_deref()
                    .map_or(true, |o| t.order_id == o)
            })
            .filter(|t| {
                filter
                    .phone_number
                    .as_deref()
                    .map_or(true, |p| t.phone_number.as_deref() == Some(p))
            })
            .filter(|t| filter.from.map_or(true, |from| t.created_at >= from))
            .filter(|t| filter.to.map_or(true, |to| t.created_at < to))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(filter.limit.unwrap_or(100) as usize);
        Ok(out)
    }

    async fn statistics(&self, range: &StatsRange) -> Result<PaymentStatistics, DatabaseError> {
        let rows = self.rows.lock().unwrap();
        let in_range: Vec<&PaymentTransaction> = rows
            .values()
            .filter(|t| range.from.map_or(true, |from| t.created_at >= from))
            .filter(|t| range.to.map_or(true, |to| t.created_at < to))
            .collect();

        let total = in_range.len() as u64;
        let total_amount: BigDecimal = in_range
            .iter()
            .map(|t| t.amount.clone())
            .fold(BigDecimal::from(0), |acc, a| acc + a);
        let completed = in_range
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .count() as u64;
        let failed = in_range
            .iter()
            .filter(|t| t.status == TransactionStatus::Failed)
            .count() as u64;
        let cancelled = in_range
            .iter()
            .filter(|t| t.status == TransactionStatus::Cancelled)
            .count() as u64;

        let mut by_provider: HashMap<GatewayCode, (u64, BigDecimal)> = HashMap::new();
        for t in &in_range {
            let entry = by_provider
                .entry(t.provider)
                .or_insert((0, BigDecimal::from(0)));
            entry.0 += 1;
            entry.1 = entry.1.clone() + t.amount.clone();
        }
        let mut per_provider: Vec<ProviderStats> = by_provider
            .into_iter()
            .map(|(provider, (transactions, amount))| ProviderStats {
                provider,
                transactions,
                amount,
            })
            .collect();
        per_provider.sort_by_key(|p| p.provider.as_str());

        Ok(PaymentStatistics {
            total_transactions: total,
            total_amount,
            completed,
            failed,
            cancelled,
            success_rate: if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64 * 100.0
            },
            per_provider,
        })
    }

    async fn recent_by_phone(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PaymentTransaction>, DatabaseError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.phone_number.as_deref() == Some(phone) && t.created_at >= since)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory order store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, DatabaseError> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Counting rewards sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingRewards {
    pub loyalty_credits: AtomicUsize,
    pub promotions_consumed: AtomicUsize,
}

impl CountingRewards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loyalty_count(&self) -> usize {
        self.loyalty_credits.load(Ordering::SeqCst)
    }

    pub fn promotion_count(&self) -> usize {
        self.promotions_consumed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RewardsSink for CountingRewards {
    async fn credit_loyalty_points(&self, _order_id: &str, _amount: &BigDecimal) {
        self.loyalty_credits.fetch_add(1, Ordering::SeqCst);
    }

    async fn consume_promotion(&self, _order_id: &str) {
        self.promotions_consumed.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Scriptable mock gateway
// ---------------------------------------------------------------------------

pub struct MockGateway {
    pub gateway_code: GatewayCode,
    pub external_id: String,
    pub fail_create: Option<GatewayError>,
    pub check_result: Mutex<TransactionStatus>,
    pub signed: bool,
}

impl MockGateway {
    pub fn acknowledging(code: GatewayCode, external_id: &str) -> Self {
        Self {
            gateway_code: code,
            external_id: external_id.to_string(),
            fail_create: None,
            check_result: Mutex::new(TransactionStatus::Processing),
            signed: false,
        }
    }

    pub fn signing(code: GatewayCode, external_id: &str) -> Self {
        Self {
            signed: true,
            ..Self::acknowledging(code, external_id)
        }
    }

    pub fn set_check_result(&self, status: TransactionStatus) {
        *self.check_result.lock().unwrap() = status;
    }
}

#[async_trait]
impl MobileMoneyGateway for MockGateway {
    fn code(&self) -> GatewayCode {
        self.gateway_code
    }

    async fn create_payment(&self, request: &ChargeRequest) -> GatewayResult<ChargeResponse> {
        request.validate_amount()?;
        if let Some(raw) = request.phone_number.as_deref() {
            if Msisdn::parse(raw).is_none() {
                return Err(GatewayError::Validation {
                    message: format!("invalid Moroccan mobile number: {}", raw),
                    field: Some("phone_number".to_string()),
                });
            }
        }
        if let Some(err) = &self.fail_create {
            return Err(err.clone());
        }
        Ok(ChargeResponse {
            external_transaction_id: Some(self.external_id.clone()),
            status: TransactionStatus::Processing,
            message: "payment request accepted".to_string(),
            redirect_url: Some("https://pay.example.test/checkout".to_string()),
            callback_data: None,
        })
    }

    async fn check_status(&self, _external_id: &str) -> GatewayResult<GatewayStatus> {
        let status = *self.check_result.lock().unwrap();
        Ok(GatewayStatus {
            status,
            message: format!("gateway reports {}", status),
            amount: None,
            transaction_date: None,
        })
    }

    async fn cancel(&self, _external_id: &str) -> GatewayResult<CancellationOutcome> {
        Ok(CancellationOutcome {
            success: true,
            message: "cancelled".to_string(),
        })
    }

    fn validate_callback_data(&self, payload: &JsonValue) -> CallbackValidation {
        let mut errors = Vec::new();
        let txn_id = payload
            .get("transaction_id")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if txn_id.is_none() {
            errors.push("missing transaction_id".to_string());
        }
        let native_status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        if native_status.is_none() {
            errors.push("missing status".to_string());
        }
        match payload.get("merchant_id").and_then(|v| v.as_str()) {
            Some(m) if m == TEST_MERCHANT => {}
            Some(_) => errors.push("merchant_id does not match".to_string()),
            None => errors.push("missing merchant_id".to_string()),
        }
        let amount = match payload.get("amount").and_then(|v| v.as_str()) {
            Some(s) => match BigDecimal::from_str(s) {
                Ok(v) => Some(v),
                Err(_) => {
                    errors.push(format!("unparseable amount: {}", s));
                    None
                }
            },
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
        match native_status {
            "SUCCESS" => Some(TransactionStatus::Completed),
            "FAILED" => Some(TransactionStatus::Failed),
            "PENDING" => Some(TransactionStatus::Processing),
            "CANCELLED" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    fn supports_signatures(&self) -> bool {
        self.signed
    }

    fn verify_signature(&self, _payload: &[u8], signature: &str) -> bool {
        signature == "valid-signature"
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryTransactionStore>,
    pub orders: Arc<MemoryOrderStore>,
    pub rewards: Arc<CountingRewards>,
    pub validator: Arc<SecurityValidator>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub processor: Arc<CallbackProcessor>,
    pub gateway: Arc<MockGateway>,
}

/// Security config that keeps tests independent of the wall clock.
pub fn test_security_config() -> SecurityConfig {
    SecurityConfig {
        fraud: FraudConfig {
            operating_hours: (0, 24),
            ..FraudConfig::default()
        },
        ..SecurityConfig::default()
    }
}

pub fn harness_with(gateway: MockGateway, active: bool) -> Harness {
    let code = gateway.gateway_code;
    let gateway = Arc::new(gateway);
    let mut registry = GatewayRegistry::new();
    registry.register(
        ProviderInfo {
            code,
            display_name: code.display_name().to_string(),
            is_active: active,
        },
        Arc::clone(&gateway) as Arc<dyn MobileMoneyGateway>,
    );
    let registry = Arc::new(registry);

    let store = Arc::new(MemoryTransactionStore::new());
    let orders = Arc::new(MemoryOrderStore::new());
    let rewards = Arc::new(CountingRewards::new());
    let validator = Arc::new(SecurityValidator::new(
        test_security_config(),
        Arc::new(AuditTrail::default()),
    ));

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        Arc::clone(&registry),
        Arc::clone(&store) as Arc<dyn TransactionStore>,
        Arc::clone(&orders) as Arc<dyn OrderStore>,
        Arc::clone(&validator),
        Arc::clone(&rewards) as Arc<dyn RewardsSink>,
        Arc::new(NotificationService::new()),
    ));
    let processor = Arc::new(CallbackProcessor::new(
        Arc::clone(&registry),
        Arc::clone(&validator),
        Arc::clone(&orchestrator),
    ));

    Harness {
        store,
        orders,
        rewards,
        validator,
        orchestrator,
        processor,
        gateway,
    }
}

pub fn harness(gateway: MockGateway) -> Harness {
    harness_with(gateway, true)
}

pub fn order(id: &str, total: i64) -> Order {
    Order {
        id: id.to_string(),
        customer_name: Some("Amine B".to_string()),
        phone_number: Some("+212661234567".to_string()),
        total_amount: BigDecimal::from(total),
        status: "confirmed".to_string(),
    }
}

pub fn seeded_txn(
    provider: GatewayCode,
    status: TransactionStatus,
    amount: i64,
    external_id: Option<&str>,
) -> PaymentTransaction {
    PaymentTransaction {
        id: Uuid::new_v4(),
        order_id: "O-SEED".to_string(),
        provider,
        amount: BigDecimal::from(amount),
        currency: "MAD".to_string(),
        phone_number: Some("+212661234567".to_string()),
        status,
        external_transaction_id: external_id.map(|v| v.to_string()),
        callback_data: None,
        error_message: None,
        created_at: Utc::now(),
        completed_at: None,
    }
}
