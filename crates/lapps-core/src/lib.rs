//! LAPPS Core - Annotation model, message envelope, and shared types
//!
//! This crate defines the data exchanged by every LAPPS service:
//! - Message envelopes and their discriminators
//! - Documents, views and annotations (LIF container model)
//! - Document-scoped annotation id generation
//! - Service metadata descriptors
//! - Configuration management
//! - Common error types

pub mod config;
pub mod discriminator;
pub mod document;
pub mod envelope;
pub mod ids;
pub mod metadata;

pub use config::{AppConfig, ConfigError, LoggingConfig, NerConfig, PoolConfig, ServerConfig};
pub use discriminator::{uri, Discriminator};
pub use document::{Annotation, Contains, Document, View, ViewMetadata};
pub use envelope::{Envelope, Parameters};
pub use ids::IdGenerator;
pub use metadata::{IoSpecification, ServiceMetadata};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for LAPPS operations
#[derive(Error, Debug)]
pub enum LappsError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LappsError>;
