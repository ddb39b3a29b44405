//! Metrics tracking middleware
//!
//! Tracks request latency, counts, and status codes for Prometheus metrics
//!
//! Author: hephaex@gmail.com

use crate::state::{AppState, ENTITIES, SENTENCES};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

lazy_static! {
    /// Registry for every metric exported on `/metrics`
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("lapps".to_string()), None)
            .expect("metric prefix is valid");
        register_process_collector(&registry);
        registry
    };

    /// HTTP requests by endpoint, method and status
    pub static ref HTTP_REQUESTS: IntCounterVec = {
        let counter = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by endpoint and status"),
            &["endpoint", "method", "status"],
        )
        .expect("metric definition is valid");
        register(Box::new(counter.clone()));
        counter
    };

    /// HTTP request latency
    pub static ref HTTP_DURATION: HistogramVec = {
        let histogram = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["endpoint", "method"],
        )
        .expect("metric definition is valid");
        register(Box::new(histogram.clone()));
        histogram
    };

    /// Sentence pipeline pool gauges: capacity, available, checkouts, busy rejections
    pub static ref POOL: IntGaugeVec = {
        let gauge = IntGaugeVec::new(
            Opts::new("splitter_pool", "Sentence pipeline pool state"),
            &["stat"],
        )
        .expect("metric definition is valid");
        register(Box::new(gauge.clone()));
        gauge
    };

    /// Services that failed to start
    pub static ref FAILED_SERVICES: IntGauge = {
        let gauge = IntGauge::new("failed_services", "Services running in startup-failure mode")
            .expect("metric definition is valid");
        register(Box::new(gauge.clone()));
        gauge
    };

    /// Seconds since the server started
    pub static ref UPTIME: IntGauge = {
        let gauge = IntGauge::new("uptime_seconds", "Time since server start")
            .expect("metric definition is valid");
        register(Box::new(gauge.clone()));
        gauge
    };
}

#[cfg(target_os = "linux")]
fn register_process_collector(registry: &Registry) {
    let collector = prometheus::process_collector::ProcessCollector::for_self();
    if let Err(e) = registry.register(Box::new(collector)) {
        tracing::warn!(error = %e, "Unable to register the process collector");
    }
}

#[cfg(not(target_os = "linux"))]
fn register_process_collector(_registry: &Registry) {}

fn register(collector: Box<dyn prometheus::core::Collector>) {
    if let Err(e) = REGISTRY.register(collector) {
        tracing::warn!(error = %e, "Unable to register metric");
    }
}

/// Metrics tracking middleware
///
/// Records:
/// - Request count per endpoint
/// - Request latency distribution
/// - Response status codes
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    // Normalize the path for metrics (bounded label set)
    let endpoint = normalize_endpoint(request.uri().path());

    let response = next.run(request).await;

    state.increment_requests();
    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS
        .with_label_values(&[endpoint.as_str(), method.as_str(), status.as_str()])
        .inc();
    HTTP_DURATION
        .with_label_values(&[endpoint.as_str(), method.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Refresh the gauges from `state` and encode every metric
pub fn render(state: &AppState) -> Result<String, prometheus::Error> {
    UPTIME.set(state.uptime_secs() as i64);
    FAILED_SERVICES.set(state.services().iter().filter(|s| !s.is_healthy()).count() as i64);

    if let Some(stats) = state.pool_stats() {
        POOL.with_label_values(&["capacity"]).set(stats.capacity as i64);
        POOL.with_label_values(&["available"]).set(stats.available as i64);
        POOL.with_label_values(&["checkouts"]).set(stats.total_checkouts as i64);
        POOL.with_label_values(&["busy_rejections"]).set(stats.busy_rejections as i64);
    }

    // Touch the request metrics so they are exported before the first request
    lazy_static::initialize(&HTTP_REQUESTS);
    lazy_static::initialize(&HTTP_DURATION);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Normalize endpoint paths for consistent metrics
///
/// Unknown service names and numeric or UUID segments are replaced with
/// placeholders so label cardinality stays bounded.
fn normalize_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let normalized: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(i, seg)| {
            let after_services = i > 0 && segments[i - 1] == "services";
            if after_services && *seg != SENTENCES && *seg != ENTITIES {
                ":name".to_string()
            } else if is_uuid(seg) || is_numeric(seg) {
                ":id".to_string()
            } else {
                (*seg).to_string()
            }
        })
        .collect();

    normalized.join("/")
}

/// Check if a string looks like a UUID
fn is_uuid(s: &str) -> bool {
    s.len() == 36
        && s.chars().enumerate().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

/// Check if a string is numeric (likely an ID)
fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
