//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Instant;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
}

pub async fn check_health(pool: &PgPool) -> HealthStatus {
    let mut checks = HashMap::new();

    let started = Instant::now();
    let database = match crate::database::health_check(pool).await {
        Ok(()) => ComponentHealth {
            status: ComponentState::Up,
            response_time_ms: Some(started.elapsed().as_millis()),
            details: None,
        },
        Err(e) => ComponentHealth {
            status: ComponentState::Down,
            response_time_ms: Some(started.elapsed().as_millis()),
            details: Some(e.to_string()),
        },
    };
    let overall = if database.status == ComponentState::Up {
        HealthState::Healthy
    } else {
        HealthState::Unhealthy
    };
    checks.insert("database".to_string(), database);

    HealthStatus {
        status: overall,
        checks,
        timestamp: chrono::Utc::now(),
    }
}
