use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{audit_context, AppState};
use crate::services::webhook_processor::CallbackError;

/// POST /webhooks/{provider}
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    info!(provider = %provider, "Received webhook");

    // Each gateway delivers its signature in its own header; CashPlus does
    // not sign at all.
    let signature = match provider.as_str() {
        "orange_money" => headers
            .get("x-orange-signature")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        "inwi_money" => headers
            .get("x-inwi-signature")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        _ => None,
    };

    let ctx = audit_context(&headers);
    match state
        .processor
        .process_callback(&provider, body.as_bytes(), signature.as_deref(), &ctx)
        .await
    {
        Ok(outcome) => {
            info!(
                provider = %provider,
                transaction_id = %outcome.transaction_id,
                applied = outcome.applied,
                "Webhook processed"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "processed",
                    "transaction_id": outcome.transaction_id,
                    "transaction_status": outcome.new_status,
                    "applied": outcome.applied,
                })),
            )
                .into_response()
        }
        Err(e) => {
            warn!(provider = %provider, error = %e, "Webhook rejected");
            let status = match &e {
                CallbackError::UnknownProvider(_) => StatusCode::NOT_FOUND,
                CallbackError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                CallbackError::SecurityRejected(_) => StatusCode::UNAUTHORIZED,
                CallbackError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                CallbackError::Database(_) | CallbackError::Processing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (
                status,
                Json(serde_json::json!({
                    "status": "rejected",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
