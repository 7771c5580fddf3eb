use atlaseats_backend::api::{payments, webhooks, AppState};
use atlaseats_backend::config::AppConfig;
use atlaseats_backend::database::{init_pool_from_config, order_repository::OrderRepository, transaction_repository::TransactionRepository};
use atlaseats_backend::gateways::registry::GatewayRegistry;
use atlaseats_backend::logging::init_tracing;
use atlaseats_backend::security::audit::AuditTrail;
use atlaseats_backend::security::validator::{SecurityConfig, SecurityValidator};
use atlaseats_backend::services::notification::NotificationService;
use atlaseats_backend::services::payment_orchestrator::PaymentOrchestrator;
use atlaseats_backend::services::rewards::HttpRewardsSink;
use atlaseats_backend::services::webhook_processor::CallbackProcessor;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting AtlasEats payment service"
    );

    info!("📊 Initializing database connection pool...");
    let pool = init_pool_from_config(&config.database).await?;

    info!("💳 Building gateway registry...");
    let registry = Arc::new(GatewayRegistry::from_env().map_err(|e| anyhow::anyhow!("{}", e))?);
    for provider in registry.providers() {
        info!(
            provider = %provider.code,
            active = provider.is_active,
            "registered payment provider"
        );
    }

    let transactions = Arc::new(TransactionRepository::new(pool.clone()));
    let orders = Arc::new(OrderRepository::new(pool.clone()));
    let audit_capacity = std::env::var("AUDIT_TRAIL_CAPACITY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(AuditTrail::DEFAULT_CAPACITY);
    let validator = Arc::new(SecurityValidator::new(
        SecurityConfig::from_env(),
        Arc::new(AuditTrail::new(audit_capacity)),
    ));
    let rewards = Arc::new(HttpRewardsSink::from_env());
    let notifications = Arc::new(NotificationService::new());

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        Arc::clone(&registry),
        transactions,
        orders,
        Arc::clone(&validator),
        rewards,
        notifications,
    ));
    let processor = Arc::new(CallbackProcessor::new(
        Arc::clone(&registry),
        Arc::clone(&validator),
        Arc::clone(&orchestrator),
    ));

    let state = Arc::new(AppState {
        orchestrator,
        processor,
        registry,
        pool,
    });

    let app = Router::new()
        .route(
            "/api/payments",
            post(payments::create_payment).get(payments::payment_history),
        )
        .route("/api/payments/statistics", get(payments::payment_statistics))
        .route("/api/payments/{id}/status", get(payments::payment_status))
        .route("/api/payments/{id}/cancel", post(payments::cancel_payment))
        .route("/api/providers", get(payments::list_providers))
        .route("/webhooks/{provider}", post(webhooks::handle_webhook))
        .route("/health", get(payments::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(addr = %addr, "✅ Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
