use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Warning,
    Failure,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStatus::Success => write!(f, "success"),
            AuditStatus::Warning => write!(f, "warning"),
            AuditStatus::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityAudit {
    pub id: Uuid,
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    pub details: String,
    pub risk_score: u8,
}

/// Caller metadata attached to audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Bounded, append-only audit trail. Once the capacity ceiling is reached the
/// oldest entry is evicted; lossy eviction under load is acceptable, this is
/// not the durable audit log.
pub struct AuditTrail {
    capacity: usize,
    entries: Mutex<VecDeque<SecurityAudit>>,
}

impl AuditTrail {
    pub const DEFAULT_CAPACITY: usize = 1_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(
        &self,
        action: &str,
        ctx: &AuditContext,
        status: AuditStatus,
        details: String,
        risk_score: u8,
    ) -> SecurityAudit {
        let entry = SecurityAudit {
            id: Uuid::new_v4(),
            action: action.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            timestamp: Utc::now(),
            status,
            details,
            risk_score,
        };
        let mut entries = self.entries.lock().expect("audit trail lock poisoned");
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        entry
    }

    pub fn recent(&self, limit: usize) -> Vec<SecurityAudit> {
        let entries = self.entries.lock().expect("audit trail lock poisoned");
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit trail lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
