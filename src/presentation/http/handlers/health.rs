//! Health Check Handlers
//!
//! # Endpoints
//! - `GET /health` - Static liveness answer with the build version
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe with per-dependency checks

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::infrastructure::metrics;
use crate::startup::AppState;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Pin the uptime origin to process start rather than the first probe.
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
    pub hub: HubHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HubHealth {
    pub status: HealthStatus,
    pub connections: usize,
    pub identified: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Dependency turned off in configuration
    Disabled,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// 200 while the database answers, 503 otherwise. A failing Redis only
/// degrades the service since presence falls back to "offline".
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let redis = check_redis(&state).await;
    let hub = HubHealth {
        status: HealthStatus::Healthy,
        connections: state.hub.connection_count(),
        identified: state.hub.identified_count(),
    };

    metrics::update_db_pool_stats(
        state.db.num_idle() as u32,
        state.db.size().saturating_sub(state.db.num_idle() as u32),
        state.settings.database.max_connections,
    );

    let status = determine_overall_status(&database, &redis);
    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks {
            database,
            redis,
            hub,
        },
    };

    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (code, Json(response))
}

fn timed(latency_ms: u64, degraded_above_ms: u64) -> ServiceHealth {
    ServiceHealth {
        status: if latency_ms < degraded_above_ms {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        latency_ms: Some(latency_ms),
        message: None,
    }
}

fn failed(message: String) -> ServiceHealth {
    ServiceHealth {
        status: HealthStatus::Unhealthy,
        latency_ms: None,
        message: Some(message),
    }
}

async fn check_database(state: &AppState) -> ServiceHealth {
    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => timed(start.elapsed().as_millis() as u64, 100),
        Err(e) => failed(format!("Database connection failed: {}", e)),
    }
}

async fn check_redis(state: &AppState) -> ServiceHealth {
    let Some(redis) = &state.redis else {
        return ServiceHealth {
            status: HealthStatus::Disabled,
            latency_ms: None,
            message: None,
        };
    };

    let start = Instant::now();
    let mut conn = redis.clone();
    let pong: Result<String, redis::RedisError> = redis::cmd("PING").query_async(&mut conn).await;
    match pong {
        Ok(_) => timed(start.elapsed().as_millis() as u64, 50),
        Err(e) => failed(format!("Redis connection failed: {}", e)),
    }
}

fn determine_overall_status(db: &ServiceHealth, redis: &ServiceHealth) -> HealthStatus {
    match (db.status, redis.status) {
        (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
        (HealthStatus::Degraded, _) => HealthStatus::Degraded,
        (_, HealthStatus::Unhealthy | HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}
