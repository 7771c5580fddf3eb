//! Mobile-money gateway integrations: the adapter contract, one module per
//! gateway, the startup registry, and the shared HTTP/retry plumbing.

pub mod error;
pub mod gateway;
pub mod http;
pub mod phone;
pub mod providers;
pub mod registry;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use gateway::MobileMoneyGateway;
pub use registry::{GatewayRegistry, ProviderInfo, RegistryError};
pub use types::{
    CallbackValidation, CancellationOutcome, ChargeRequest, ChargeResponse, GatewayCode,
    GatewayConfig, GatewayStatus, TransactionStatus,
};
