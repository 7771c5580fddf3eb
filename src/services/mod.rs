//! Services module for business logic and integrations

pub mod notification;
pub mod payment_orchestrator;
pub mod rewards;
pub mod webhook_processor;

pub use payment_orchestrator::{
    AppliedUpdate, CreatePayment, OrchestratorError, OrchestratorResult, PaymentOrchestrator,
    PaymentResult,
};
pub use webhook_processor::{CallbackError, CallbackOutcome, CallbackProcessor};
