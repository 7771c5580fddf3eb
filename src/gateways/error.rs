use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Gateway rejected request: gateway={gateway}, message={message}")]
    Rejected {
        gateway: String,
        message: String,
        gateway_code: Option<String>,
    },

    #[error("Invalid gateway response: gateway={gateway}, message={message}")]
    InvalidResponse { gateway: String, message: String },
}

impl GatewayError {
    /// Only transport-level failures are retried; an explicit rejection from
    /// the gateway never is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transport { .. })
    }

    /// Message safe to show an end user. Raw gateway error bodies stay out of
    /// user-facing responses.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Validation { message, .. } => message.clone(),
            GatewayError::Transport { .. } => {
                "Payment provider is temporarily unreachable. Please try again".to_string()
            }
            GatewayError::Rejected { gateway, .. } => {
                format!("Payment was declined by {}", gateway)
            }
            GatewayError::InvalidResponse { gateway, .. } => {
                format!("{} returned an unexpected response", gateway)
            }
        }
    }
}
