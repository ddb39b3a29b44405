//! LAPPS API Server
//!
//! Hosts the sentence splitter and the named entity recognizer over HTTP.
//!
//! Author: hephaex@gmail.com

use lapps_api::{create_router, state::AppState};
use lapps_core::{AppConfig, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Path of an optional TOML configuration file
const CONFIG_ENV: &str = "LAPPS_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config));
    for service in state.services() {
        if let Some(failure) = service.startup_failure() {
            tracing::warn!(service = service.name(), error = %format!("{:#}", failure.error()), "Service unavailable");
        }
    }

    // Create router
    let app = create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("LAPPS API Server starting on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("LAPPS API Server stopped");
    Ok(())
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "lapps_api={level},lapps_engine={level},tower_http=info",
            level = config.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for Ctrl-C, then close the services so queued requests are released
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Unable to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    state.shutdown();
}
