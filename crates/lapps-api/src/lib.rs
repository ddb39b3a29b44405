//! LAPPS API - HTTP front end of the sentence splitter and named entity recognizer
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, routing::get, Json, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "LAPPS NLP services",
        description = "Sentence splitting and named entity recognition over LIF documents"
    ),
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::health::prometheus_metrics,
        handlers::services::list_services,
        handlers::services::execute_service,
        handlers::services::service_metadata,
    ),
    components(schemas(
        error::ApiError,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        handlers::services::EnvelopeDoc,
        handlers::services::ServiceSummary,
    )),
    tags(
        (name = "health", description = "Liveness, readiness and metrics"),
        (name = "services", description = "LAPPS services")
    )
)]
pub struct ApiDoc;

/// Build the application router around `state`
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_size;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::prometheus_metrics))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(routes::service_routes())
        .layer(from_fn_with_state(state.clone(), middleware::metrics_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router with default configuration, for tests
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::default()))
}
