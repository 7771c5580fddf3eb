pub mod payments;
pub mod webhooks;

use crate::error::AppError;
use crate::gateways::registry::GatewayRegistry;
use crate::services::payment_orchestrator::PaymentOrchestrator;
use crate::services::webhook_processor::CallbackProcessor;
use crate::security::audit::AuditContext;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared state injected into every handler.
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub processor: Arc<CallbackProcessor>,
    pub registry: Arc<GatewayRegistry>,
    pub pool: PgPool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": self.error_code(),
            "message": self.user_message(),
        }));
        (status, body).into_response()
    }
}

/// Caller metadata for the audit trail, read off the request headers.
pub fn audit_context(headers: &HeaderMap) -> AuditContext {
    AuditContext {
        ip_address: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string()),
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
    }
}
