//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::services;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Routes of the hosted services
pub fn service_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/services", get(services::list_services))
        .route("/services/:name", post(services::execute_service))
        .route("/services/:name/metadata", get(services::service_metadata))
}
