//! HTTP middleware
//!
//! Author: hephaex@gmail.com

pub mod metrics;

pub use metrics::metrics_middleware;
