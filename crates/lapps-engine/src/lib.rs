//! LAPPS Engine - Engine pooling, classifier registry and service dispatch
//!
//! Sentence pipelines are expensive, stateful and not safe for concurrent
//! use, so a fixed number of them is kept in an [`pool::EnginePool`] that
//! hands out exclusive, time-bounded checkouts. Named-entity classifiers are
//! loaded on first use by a [`registry::ClassifierRegistry`] and shared
//! afterwards. The [`service`] module routes envelopes to either path and
//! projects engine output into LIF views.

use std::path::PathBuf;

use thiserror::Error;

pub mod gazetteer;
pub mod pool;
pub mod projector;
pub mod registry;
pub mod service;
pub mod splitter;

pub use gazetteer::{GazetteerClassifier, GazetteerLoader};
pub use pool::{EnginePool, PoolError, PoolStats, PooledEngine};
pub use projector::{EntityProjector, SentenceProjector};
pub use registry::{ClassifierLoader, ClassifierRegistry, RegistryError};
pub use service::{Dispatcher, Processor, ServiceError, StartupFailure};
pub use splitter::RegexPipeline;

/// Tag used by classifiers for tokens outside any entity
pub const OUTSIDE: &str = "O";

/// Token as seen by engines, with character offsets into the document text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub start: usize,
    pub end: usize,
    pub lemma: Option<String>,
    pub pos: Option<String>,
    pub category: Option<String>,
    /// Entity tag supplied with the input, if any
    pub ner: Option<String>,
    /// Tag assigned by a classifier
    pub answer: Option<String>,
}

impl Token {
    pub fn new(word: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            word: word.into(),
            start,
            end,
            ..Self::default()
        }
    }

    pub fn with_pos(mut self, pos: impl Into<String>) -> Self {
        self.pos = Some(pos.into());
        self
    }

    pub fn with_lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = Some(lemma.into());
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    /// Classifier tag, [`OUTSIDE`] when none was assigned
    pub fn tag(&self) -> &str {
        self.answer.as_deref().unwrap_or(OUTSIDE)
    }
}

/// Sentence span and its tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub start: usize,
    pub end: usize,
    pub tokens: Vec<Token>,
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to read model {path}: {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model {path}: {message}")]
    MalformedModel { path: PathBuf, message: String },

    #[error("Engine failure: {0}")]
    Processing(String),
}

/// Stateful sentence/token pipeline
///
/// Annotation takes `&mut self`: instances keep scratch state between calls
/// and must never be used by two callers at once. Share them through an
/// [`EnginePool`].
pub trait SentencePipeline: Send {
    fn name(&self) -> &str;

    fn annotate(&mut self, text: &str) -> Result<Vec<Sentence>, EngineError>;
}

/// Token sequence classifier
///
/// Classification takes `&self` and implementations must be `Sync`: a
/// loaded classifier is read-only and may serve any number of concurrent
/// callers without locking.
pub trait SequenceClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Return a copy of `tokens` with `answer` set on every token
    fn classify(&self, tokens: &[Token]) -> Result<Vec<Token>, EngineError>;
}

impl std::fmt::Debug for dyn SequenceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceClassifier")
            .field("name", &self.name())
            .finish()
    }
}
