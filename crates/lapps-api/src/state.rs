//! Application state management
//!
//! Author: hephaex@gmail.com

use lapps_core::AppConfig;
use lapps_engine::service::{NamedEntityRecognizer, SentenceSplitter};
use lapps_engine::{Dispatcher, PoolStats, Processor};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Path name of the sentence splitter service
pub const SENTENCES: &str = "sentences";

/// Path name of the named entity recognizer service
pub const ENTITIES: &str = "entities";

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Sentence splitter front end
    pub sentences: Dispatcher,
    /// Named entity recognizer front end
    pub entities: Dispatcher,
    /// Splitter handle for pool statistics, if it started
    splitter: Option<Arc<SentenceSplitter>>,
}

impl AppState {
    /// Create both services from the configuration
    ///
    /// A service that cannot be created is kept in failed mode and answers
    /// every request with its startup diagnostic.
    pub fn new(config: AppConfig) -> Self {
        let splitter = SentenceSplitter::new(&config.pool).map(Arc::new);
        let splitter_handle = splitter.as_ref().ok().cloned();

        let sentences = Dispatcher::from_result(
            SENTENCES,
            splitter.map(|s| s as Arc<dyn Processor>),
        );
        let entities = Dispatcher::from_result(
            ENTITIES,
            NamedEntityRecognizer::new(&config.ner).map(|r| Arc::new(r) as Arc<dyn Processor>),
        );

        let mut state = Self::with_services(config, sentences, entities);
        state.splitter = splitter_handle;
        state
    }

    /// Create state around already built services
    pub fn with_services(config: AppConfig, sentences: Dispatcher, entities: Dispatcher) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            sentences,
            entities,
            splitter: None,
        }
    }

    /// Look up a service by its path name
    pub fn service(&self, name: &str) -> Option<&Dispatcher> {
        match name {
            SENTENCES => Some(&self.sentences),
            ENTITIES => Some(&self.entities),
            _ => None,
        }
    }

    pub fn services(&self) -> [&Dispatcher; 2] {
        [&self.sentences, &self.entities]
    }

    /// Sentence pipeline pool statistics
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.splitter.as_ref().map(|s| s.pool().stats())
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Ready when not shutting down and every service started
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst) && self.services().iter().all(|s| s.is_healthy())
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Stop accepting work; waiting requests receive a shutdown error
    pub fn shutdown(&self) {
        self.set_ready(false);
        for service in self.services() {
            service.close();
        }
        tracing::info!("Services closed");
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
