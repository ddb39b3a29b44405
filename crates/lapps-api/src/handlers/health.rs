//! Health check handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::middleware::metrics;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub total_requests: u64,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is alive", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
        total_requests: state.get_request_count(),
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

/// Per-service startup state
#[derive(Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub sentences: bool,
    pub entities: bool,
    /// Startup diagnostics of services that failed to start
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

/// Readiness probe - both services started and the server is not shutting down
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Services are ready", body = ReadinessResponse),
        (status = 503, description = "A service failed to start or the server is shutting down", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let failures = state
        .services()
        .iter()
        .filter_map(|s| s.startup_failure().map(|f| format!("{}: {:#}", s.name(), f.error())))
        .collect();

    let response = ReadinessResponse {
        ready: state.is_ready(),
        checks: ReadinessChecks {
            sentences: state.sentences.is_healthy(),
            entities: state.entities.is_healthy(),
            failures,
        },
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Prometheus metrics in text exposition format
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain")
    )
)]
pub async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let body = metrics::render(&state)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
