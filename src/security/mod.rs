//! Security and fraud-risk layer: request/callback validation, fraud
//! scoring, and the bounded audit trail.

pub mod audit;
pub mod fraud;
pub mod validator;

pub use audit::{AuditContext, AuditStatus, AuditTrail, SecurityAudit};
pub use fraud::{FraudConfig, FraudSignal};
pub use validator::{RequestAssessment, SecurityConfig, SecurityValidator, ValidationReport};
