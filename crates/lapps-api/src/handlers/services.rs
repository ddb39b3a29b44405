//! Service execution handlers
//!
//! Every request to a known service is answered with status 200 and a
//! response envelope; failures travel inside the envelope.
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use lapps_core::{uri, Envelope, ServiceMetadata};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Request or response envelope: `discriminator`, `payload`, optional `parameters`
#[derive(ToSchema)]
#[schema(value_type = Object)]
#[allow(dead_code)]
pub struct EnvelopeDoc(Value);

/// Service summary
#[derive(Serialize, ToSchema)]
pub struct ServiceSummary {
    #[schema(example = "sentences")]
    pub name: String,
    pub healthy: bool,
    #[schema(value_type = Option<Object>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ServiceMetadata>,
}

/// List the available services
#[utoipa::path(
    get,
    path = "/services",
    tag = "services",
    responses(
        (status = 200, description = "Available services", body = Vec<ServiceSummary>)
    )
)]
pub async fn list_services(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let services: Vec<ServiceSummary> = state
        .services()
        .iter()
        .map(|s| ServiceSummary {
            name: s.name().to_string(),
            healthy: s.is_healthy(),
            metadata: s.metadata().cloned(),
        })
        .collect();

    Json(services)
}

/// Execute a service on a request envelope
#[utoipa::path(
    post,
    path = "/services/{name}",
    tag = "services",
    params(
        ("name" = String, Path, description = "Service name: sentences or entities")
    ),
    request_body(content = EnvelopeDoc, content_type = "application/json"),
    responses(
        (status = 200, description = "Response envelope, possibly an error envelope", body = EnvelopeDoc),
        (status = 404, description = "Unknown service", body = ApiError)
    )
)]
pub async fn execute_service(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let service = state
        .service(&name)
        .ok_or_else(|| AppError::NotFound(format!("Service '{name}'")))?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("execute", service = %name, request_id = %request_id);
    let output = service.execute_json(&body).instrument(span).await;

    Ok(([(header::CONTENT_TYPE, "application/json")], output))
}

/// Metadata descriptor of a service
#[utoipa::path(
    get,
    path = "/services/{name}/metadata",
    tag = "services",
    params(
        ("name" = String, Path, description = "Service name: sentences or entities")
    ),
    responses(
        (status = 200, description = "Metadata envelope, or the startup diagnostic", body = EnvelopeDoc),
        (status = 404, description = "Unknown service", body = ApiError)
    )
)]
pub async fn service_metadata(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    let service = state
        .service(&name)
        .ok_or_else(|| AppError::NotFound(format!("Service '{name}'")))?;

    let response = service
        .execute(Envelope::new(uri::GET_METADATA, Value::Null))
        .await;
    Ok(Json(response))
}
