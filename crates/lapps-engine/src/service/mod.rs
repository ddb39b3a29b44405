//! Service dispatch
//!
//! A [`Dispatcher`] turns one request envelope into one response envelope.
//! It never fails: every problem, from an unparsable request to a busy
//! engine pool, is answered with an error envelope.
//!
//! Order of checks:
//! 1. a service that failed to start answers every request with its
//!    startup diagnostic
//! 2. the request is parsed
//! 3. the discriminator selects a [`Route`]
//! 4. document requests are handed to the service's [`Processor`]

use std::sync::Arc;

use async_trait::async_trait;
use lapps_core::{uri, Discriminator, Document, Envelope, Parameters, ServiceMetadata};
use once_cell::sync::OnceCell;
use serde_json::Value;
use thiserror::Error;

use crate::pool::PoolError;
use crate::registry::RegistryError;
use crate::EngineError;

pub mod entities;
pub mod sentences;

pub use entities::NamedEntityRecognizer;
pub use sentences::SentenceSplitter;

/// User-visible error messages
pub mod messages {
    pub const BUSY: &str = "The service is currently busy.  Please try again shortly.";
    pub const MISSING_DISCRIMINATOR: &str = "Invalid input: no discriminator specified.";
    pub const MISSING_PAYLOAD: &str = "Invalid input: no payload found.";
    pub const UNSUPPORTED_INPUT_TYPE: &str = "Unsupported input type: ";
    pub const UNPARSABLE: &str = "Unable to parse input.";
    pub const MISSING_CLASSIFIER: &str = "No classifier parameter provided.";
    pub const NO_SUCH_CLASSIFIER: &str = "No such classifier: ";
    pub const NO_TOKENS: &str = "Unable to initialize a list of tokens.";
}

// ============================================================================
// Errors
// ============================================================================

/// Request-level failures; the display string is the error envelope payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{}", messages::BUSY)]
    Busy,

    #[error("{0}")]
    Unavailable(String),

    #[error("{}", messages::MISSING_PAYLOAD)]
    MissingPayload,

    #[error("{}", messages::UNPARSABLE)]
    Unparsable,

    #[error("{}", messages::MISSING_CLASSIFIER)]
    MissingClassifier,

    #[error("{}{0}", messages::NO_SUCH_CLASSIFIER)]
    NoSuchClassifier(String),

    #[error("{}", messages::NO_TOKENS)]
    NoTokens,

    #[error("{0}")]
    Engine(String),
}

impl From<PoolError> for ServiceError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Busy(_) => Self::Busy,
            PoolError::Closed => Self::Unavailable(err.to_string()),
            PoolError::NoEngines => Self::Engine(err.to_string()),
            PoolError::Failed(message) => Self::Engine(message),
        }
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) | RegistryError::Load { name, .. } => {
                Self::NoSuchClassifier(name)
            }
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err.to_string())
    }
}

// ============================================================================
// Processor
// ============================================================================

/// The document-processing half of a service
#[async_trait]
pub trait Processor: Send + Sync {
    /// Descriptor returned for metadata requests
    fn metadata(&self) -> &ServiceMetadata;

    /// Whether documents of this kind can be processed
    fn accepts(&self, kind: &Discriminator) -> bool;

    /// Annotate `document`, returning it with any new views
    async fn process(
        &self,
        document: Document,
        parameters: &Parameters,
    ) -> Result<Document, ServiceError>;

    /// Release engines; later requests may fail with [`ServiceError::Unavailable`]
    fn close(&self) {}
}

/// What to do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// No discriminator supplied
    Missing,
    /// Error envelopes are passed through untouched
    Error,
    /// Answer with the service descriptor
    Metadata,
    /// Process the payload as a document of this kind
    Document(Discriminator),
    /// Kind not handled by this service; carries the raw discriminator
    Unsupported(String),
}

impl Route {
    pub fn of(envelope: &Envelope, processor: &dyn Processor) -> Self {
        match envelope.kind() {
            None => Self::Missing,
            Some(Discriminator::Error) => Self::Error,
            Some(Discriminator::GetMetadata) => Self::Metadata,
            Some(kind) if kind.is_document() && processor.accepts(&kind) => Self::Document(kind),
            Some(_) => Self::Unsupported(envelope.discriminator().to_string()),
        }
    }
}

// ============================================================================
// Startup failure
// ============================================================================

/// Error raised while a service was being created
///
/// The rendered diagnostic includes the cause chain; it is built on first
/// use and reused for every later request.
#[derive(Debug)]
pub struct StartupFailure {
    error: anyhow::Error,
    diagnostic: OnceCell<String>,
}

impl StartupFailure {
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            error,
            diagnostic: OnceCell::new(),
        }
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn diagnostic(&self) -> &str {
        self.diagnostic.get_or_init(|| format!("{:?}", self.error))
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Envelope-in, envelope-out front of a service
pub struct Dispatcher {
    name: String,
    state: Result<Arc<dyn Processor>, StartupFailure>,
}

impl Dispatcher {
    pub fn new(name: impl Into<String>, processor: Arc<dyn Processor>) -> Self {
        Self {
            name: name.into(),
            state: Ok(processor),
        }
    }

    /// A dispatcher for a service that could not be created
    pub fn failed(name: impl Into<String>, error: anyhow::Error) -> Self {
        let name = name.into();
        tracing::error!(service = %name, error = %format!("{error:#}"), "Unable to create service");
        Self {
            name,
            state: Err(StartupFailure::new(error)),
        }
    }

    pub fn from_result(name: impl Into<String>, result: anyhow::Result<Arc<dyn Processor>>) -> Self {
        match result {
            Ok(processor) => Self::new(name, processor),
            Err(error) => Self::failed(name, error),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// False when the service failed to start
    pub fn is_healthy(&self) -> bool {
        self.state.is_ok()
    }

    pub fn metadata(&self) -> Option<&ServiceMetadata> {
        self.state.as_ref().ok().map(|p| p.metadata())
    }

    pub fn startup_failure(&self) -> Option<&StartupFailure> {
        self.state.as_ref().err()
    }

    pub fn close(&self) {
        if let Ok(processor) = &self.state {
            processor.close();
        }
    }

    /// Handle a request envelope
    pub async fn execute(&self, envelope: Envelope) -> Envelope {
        let processor = match &self.state {
            Ok(processor) => processor,
            Err(failure) => return Envelope::error(failure.diagnostic()),
        };

        tracing::info!(service = %self.name, discriminator = %envelope.discriminator(), "Executing service");

        match Route::of(&envelope, processor.as_ref()) {
            Route::Missing => Envelope::error(messages::MISSING_DISCRIMINATOR),
            Route::Error => envelope,
            Route::Metadata => Envelope::metadata(processor.metadata())
                .unwrap_or_else(|e| Envelope::error(e.to_string())),
            Route::Unsupported(discriminator) => {
                let message = format!("{}{}", messages::UNSUPPORTED_INPUT_TYPE, discriminator);
                tracing::warn!(service = %self.name, "{message}");
                Envelope::error(message)
            }
            Route::Document(kind) => match self.process(processor.as_ref(), &kind, envelope).await {
                Ok(response) => {
                    tracing::info!(service = %self.name, "Service complete");
                    response
                }
                Err(e) => {
                    tracing::warn!(service = %self.name, error = %e, "Request failed");
                    Envelope::error(e.to_string())
                }
            },
        }
    }

    /// Handle a serialized request envelope
    ///
    /// Error envelopes are returned exactly as received.
    pub async fn execute_json(&self, input: &str) -> String {
        if let Err(failure) = &self.state {
            return render(&Envelope::error(failure.diagnostic()));
        }

        let envelope = match Envelope::from_json(input) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(service = %self.name, error = %e, "Unable to parse input");
                return render(&Envelope::error(messages::UNPARSABLE));
            }
        };

        if envelope.kind() == Some(Discriminator::Error) {
            return input.to_string();
        }

        render(&self.execute(envelope).await)
    }

    async fn process(
        &self,
        processor: &dyn Processor,
        kind: &Discriminator,
        envelope: Envelope,
    ) -> Result<Envelope, ServiceError> {
        let (payload, parameters) = envelope.into_parts();
        let document = build_document(kind, payload)?;
        let document = processor.process(document, &parameters).await?;
        Envelope::document(&document, parameters).map_err(|e| ServiceError::Engine(e.to_string()))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("healthy", &self.is_healthy())
            .finish()
    }
}

/// Build the document carried by a request payload
///
/// Text payloads become a fresh document; the other kinds carry a
/// serialized document, either inline or as a JSON string.
pub fn build_document(kind: &Discriminator, payload: Value) -> Result<Document, ServiceError> {
    match (kind, payload) {
        (_, Value::Null) => Err(ServiceError::MissingPayload),
        (Discriminator::Text, Value::String(text)) => Ok(Document::new(text)),
        (Discriminator::Text, _) => Err(ServiceError::Unparsable),
        (_, Value::String(json)) => Document::from_json(&json).map_err(|_| ServiceError::Unparsable),
        (_, value @ Value::Object(_)) => {
            Document::from_value(value).map_err(|_| ServiceError::Unparsable)
        }
        (_, _) => Err(ServiceError::Unparsable),
    }
}

fn render(envelope: &Envelope) -> String {
    envelope.to_json().unwrap_or_else(|e| {
        serde_json::json!({ "discriminator": uri::ERROR, "payload": e.to_string() }).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapps_core::View;
    use serde_json::json;

    /// Adds an empty view and records the parameters it saw
    struct MarkingProcessor {
        metadata: ServiceMetadata,
    }

    impl MarkingProcessor {
        fn dispatcher() -> Dispatcher {
            Dispatcher::new(
                "marking",
                Arc::new(Self {
                    metadata: ServiceMetadata::new("marking", "0.0.1", "Test service"),
                }),
            )
        }
    }

    #[async_trait]
    impl Processor for MarkingProcessor {
        fn metadata(&self) -> &ServiceMetadata {
            &self.metadata
        }

        fn accepts(&self, kind: &Discriminator) -> bool {
            matches!(kind, Discriminator::Text | Discriminator::Lapps)
        }

        async fn process(
            &self,
            mut document: Document,
            _parameters: &Parameters,
        ) -> Result<Document, ServiceError> {
            if document.text() == "busy" {
                return Err(PoolError::Busy(std::time::Duration::from_millis(1)).into());
            }
            document.add_view(View::with_id("marked"));
            Ok(document)
        }
    }

    #[tokio::test]
    async fn test_text_request_is_processed() {
        let dispatcher = MarkingProcessor::dispatcher();
        let response = dispatcher
            .execute(Envelope::text("hello").with_parameter("k", "v"))
            .await;

        assert_eq!(response.kind(), Some(Discriminator::Lapps));
        assert_eq!(response.parameter("k"), Some(&json!("v")));

        let document = Document::from_value(response.payload().clone()).unwrap();
        assert_eq!(document.text(), "hello");
        assert_eq!(document.views()[0].id(), "marked");
    }

    #[tokio::test]
    async fn test_missing_discriminator() {
        let dispatcher = MarkingProcessor::dispatcher();
        let response = dispatcher.execute(Envelope::new("", json!("text"))).await;
        assert_eq!(response.error_message(), Some(messages::MISSING_DISCRIMINATOR));
    }

    #[tokio::test]
    async fn test_unsupported_discriminator_names_it() {
        let dispatcher = MarkingProcessor::dispatcher();
        let response = dispatcher
            .execute(Envelope::new(uri::JSON, json!({})))
            .await;
        assert_eq!(
            response.error_message(),
            Some(format!("{}{}", messages::UNSUPPORTED_INPUT_TYPE, uri::JSON).as_str())
        );

        let response = dispatcher.execute(Envelope::new("bogus", json!("x"))).await;
        assert_eq!(response.error_message(), Some("Unsupported input type: bogus"));
    }

    #[tokio::test]
    async fn test_metadata_request() {
        let dispatcher = MarkingProcessor::dispatcher();
        let response = dispatcher.execute(Envelope::new(uri::GET_METADATA, Value::Null)).await;

        assert_eq!(response.kind(), Some(Discriminator::Meta));
        assert_eq!(response.payload()["name"], "marking");
    }

    #[tokio::test]
    async fn test_error_envelope_passes_through() {
        let dispatcher = MarkingProcessor::dispatcher();
        let request = Envelope::error("upstream failed").with_parameter("step", 3);

        let response = dispatcher.execute(request.clone()).await;
        assert_eq!(response, request);
    }

    #[tokio::test]
    async fn test_execute_json_error_is_byte_identical() {
        let dispatcher = MarkingProcessor::dispatcher();
        let input = r#"{ "discriminator" : "http://vocab.lappsgrid.org/ns/error",   "payload": "x" }"#;

        let once = dispatcher.execute_json(input).await;
        let twice = dispatcher.execute_json(&once).await;

        assert_eq!(once, input);
        assert_eq!(twice, input);
    }

    #[tokio::test]
    async fn test_execute_json_unparsable() {
        let dispatcher = MarkingProcessor::dispatcher();
        let output = dispatcher.execute_json("this is not json").await;

        let response = Envelope::from_json(&output).unwrap();
        assert_eq!(response.error_message(), Some(messages::UNPARSABLE));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_payload() {
        let dispatcher = MarkingProcessor::dispatcher();

        let response = dispatcher.execute(Envelope::new(uri::TEXT, Value::Null)).await;
        assert_eq!(response.error_message(), Some(messages::MISSING_PAYLOAD));

        let response = dispatcher.execute(Envelope::new(uri::LAPPS, json!("{ nope"))).await;
        assert_eq!(response.error_message(), Some(messages::UNPARSABLE));

        let response = dispatcher.execute(Envelope::new(uri::LAPPS, json!(42))).await;
        assert_eq!(response.error_message(), Some(messages::UNPARSABLE));
    }

    #[tokio::test]
    async fn test_lapps_payload_as_object_or_string() {
        let dispatcher = MarkingProcessor::dispatcher();
        let document = serde_json::to_value(Document::new("inline")).unwrap();

        let response = dispatcher
            .execute(Envelope::new(uri::LAPPS, document.clone()))
            .await;
        assert_eq!(response.kind(), Some(Discriminator::Lapps));

        let response = dispatcher
            .execute(Envelope::new(uri::LAPPS, Value::String(document.to_string())))
            .await;
        assert_eq!(response.kind(), Some(Discriminator::Lapps));
    }

    #[tokio::test]
    async fn test_processor_error_becomes_error_envelope() {
        let dispatcher = MarkingProcessor::dispatcher();
        let response = dispatcher.execute(Envelope::text("busy")).await;
        assert_eq!(response.error_message(), Some(messages::BUSY));
    }

    #[tokio::test]
    async fn test_startup_failure_answers_every_request() {
        let error = anyhow::anyhow!("model directory missing").context("Unable to create service");
        let dispatcher = Dispatcher::failed("broken", error);
        assert!(!dispatcher.is_healthy());
        assert!(dispatcher.metadata().is_none());

        let first = dispatcher.execute(Envelope::text("a")).await;
        let second = dispatcher.execute(Envelope::new(uri::GET_METADATA, Value::Null)).await;

        let message = first.error_message().unwrap();
        assert!(message.contains("Unable to create service"));
        assert!(message.contains("model directory missing"));
        assert_eq!(first, second);

        let output = dispatcher.execute_json("not even json").await;
        assert_eq!(Envelope::from_json(&output).unwrap(), first);
    }

    #[test]
    fn test_startup_diagnostic_is_computed_once() {
        let failure = StartupFailure::new(anyhow::anyhow!("boom"));
        let first = failure.diagnostic();
        let second = failure.diagnostic();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_error_conversions() {
        assert_eq!(
            ServiceError::from(PoolError::Busy(std::time::Duration::from_secs(5))).to_string(),
            messages::BUSY
        );
        assert_eq!(
            ServiceError::from(PoolError::Closed).to_string(),
            PoolError::Closed.to_string()
        );
        assert_eq!(
            ServiceError::from(RegistryError::Load {
                name: "x.model".to_string(),
                message: "bad".to_string()
            })
            .to_string(),
            "No such classifier: x.model"
        );
    }

    #[test]
    fn test_build_document() {
        let document = build_document(&Discriminator::Text, json!("")).unwrap();
        assert_eq!(document.text(), "");

        assert_eq!(
            build_document(&Discriminator::Text, json!({"a": 1})).unwrap_err(),
            ServiceError::Unparsable
        );
        assert_eq!(
            build_document(&Discriminator::Json, Value::Null).unwrap_err(),
            ServiceError::MissingPayload
        );
    }
}
