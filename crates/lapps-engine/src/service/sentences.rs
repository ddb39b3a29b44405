//! Sentence splitter service
//!
//! Pipelines are stateful, so each request checks one out of a fixed-size
//! pool for the duration of the annotation and gives up with a busy error
//! if none frees up within the configured timeout.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lapps_core::{uri, Discriminator, Document, Parameters, PoolConfig, ServiceMetadata};

use super::{Processor, ServiceError};
use crate::pool::{EnginePool, PoolError};
use crate::projector::{producer_id, SentenceProjector};
use crate::splitter::RegexPipeline;
use crate::SentencePipeline;

type Pipeline = Box<dyn SentencePipeline>;

/// Splits text into sentences and tokens
pub struct SentenceSplitter {
    pool: EnginePool<Pipeline>,
    timeout: Duration,
    metadata: ServiceMetadata,
    projector: SentenceProjector,
}

impl SentenceSplitter {
    /// Create `config.size` regex pipelines
    pub fn new(config: &PoolConfig) -> anyhow::Result<Self> {
        let engines = (0..config.size)
            .map(|_| RegexPipeline::new().map(|p| Box::new(p) as Pipeline))
            .collect::<Result<Vec<_>, _>>()
            .context("Unable to create the sentence pipelines")?;

        Self::with_engines(engines, config.acquire_timeout())
    }

    pub fn with_engines(engines: Vec<Pipeline>, timeout: Duration) -> anyhow::Result<Self> {
        let pool = EnginePool::new(engines).context("Unable to create the sentence pipeline pool")?;
        tracing::info!(engines = pool.capacity(), timeout = ?timeout, "Sentence splitter created");

        Ok(Self {
            pool,
            timeout,
            metadata: Self::descriptor(),
            projector: SentenceProjector::new(producer_id::<Self>()),
        })
    }

    pub fn descriptor() -> ServiceMetadata {
        ServiceMetadata::new(
            std::any::type_name::<Self>(),
            env!("CARGO_PKG_VERSION"),
            "Regular expression sentence splitter and tokenizer",
        )
        .requires_format(uri::TEXT)
        .requires_format(uri::LAPPS)
        .produces_format(uri::LAPPS)
        .produces_annotation(uri::SENTENCE)
        .produces_annotation(uri::TOKEN)
        .with_language("en")
    }

    pub fn pool(&self) -> &EnginePool<Pipeline> {
        &self.pool
    }
}

#[async_trait]
impl Processor for SentenceSplitter {
    fn metadata(&self) -> &ServiceMetadata {
        &self.metadata
    }

    fn accepts(&self, kind: &Discriminator) -> bool {
        kind.is_document()
    }

    async fn process(
        &self,
        mut document: Document,
        _parameters: &Parameters,
    ) -> Result<Document, ServiceError> {
        if document.text().is_empty() {
            tracing::info!("Empty text, nothing to split");
            return Ok(document);
        }

        let engine = match self.pool.acquire(self.timeout).await {
            Ok(engine) => engine,
            Err(e) => {
                if matches!(e, PoolError::Busy(_)) {
                    tracing::warn!(
                        timeout = ?self.timeout,
                        "The sentence splitter was unable to respond to a request in a timely fashion"
                    );
                }
                return Err(e.into());
            }
        };

        let text = document.text().to_string();
        let (pipeline, sentences) = engine
            .run_blocking(move |pipeline| {
                let name = pipeline.name().to_string();
                pipeline.annotate(&text).map(|sentences| (name, sentences))
            })
            .await??;

        let count = self.projector.project(&mut document, &sentences, &pipeline);
        tracing::info!(sentences = count, "Sentence splitter complete");
        Ok(document)
    }

    fn close(&self) {
        tracing::info!("Closing the sentence pipeline pool");
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{messages, Dispatcher};
    use crate::{EngineError, Sentence};
    use lapps_core::Envelope;
    use std::sync::Arc;
    use std::time::Instant;

    /// Pipeline that holds its engine for a while before answering
    struct SlowPipeline {
        delay: Duration,
    }

    impl SentencePipeline for SlowPipeline {
        fn name(&self) -> &str {
            "slow"
        }

        fn annotate(&mut self, text: &str) -> Result<Vec<Sentence>, EngineError> {
            std::thread::sleep(self.delay);
            let len = text.chars().count();
            Ok(vec![Sentence {
                start: 0,
                end: len,
                tokens: Vec::new(),
            }])
        }
    }

    fn splitter() -> SentenceSplitter {
        SentenceSplitter::new(&PoolConfig {
            size: 2,
            acquire_timeout_secs: 1,
        })
        .unwrap()
    }

    fn document_of(envelope: &Envelope) -> Document {
        Document::from_value(envelope.payload().clone()).unwrap()
    }

    #[tokio::test]
    async fn test_split_text() {
        let dispatcher = Dispatcher::new("sentences", Arc::new(splitter()));
        let response = dispatcher
            .execute(Envelope::text("Karen flew to Paris. She liked it."))
            .await;

        assert_eq!(response.kind(), Some(Discriminator::Lapps));
        let document = document_of(&response);
        let view = &document.views()[0];

        assert_eq!(view.annotations_of(uri::SENTENCE).count(), 2);
        assert_eq!(view.annotations_of(uri::TOKEN).count(), 9);
        assert_eq!(view.contains(uri::TOKEN).unwrap().name, "tokenization:regex");
        assert!(view.undeclared_types().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_produces_no_view() {
        let splitter = Arc::new(splitter());
        let dispatcher = Dispatcher::new("sentences", splitter.clone());
        let response = dispatcher.execute(Envelope::text("")).await;

        assert_eq!(response.kind(), Some(Discriminator::Lapps));
        let document = document_of(&response);
        assert_eq!(document.text(), "");
        assert!(document.views().is_empty());
        assert_eq!(splitter.pool().stats().total_checkouts, 0);
    }

    #[tokio::test]
    async fn test_lapps_input_keeps_existing_views() {
        let dispatcher = Dispatcher::new("sentences", Arc::new(splitter()));
        let first = dispatcher.execute(Envelope::text("One. Two.")).await;
        let second = dispatcher
            .execute(Envelope::new(uri::LAPPS, first.payload().clone()))
            .await;

        let document = document_of(&second);
        assert_eq!(document.views().len(), 2);

        let ids: Vec<&str> = document.views()[1]
            .annotations_of(uri::SENTENCE)
            .map(|a| a.id())
            .collect();
        assert_eq!(ids, vec!["s2", "s3"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_of_one_reports_busy() {
        let slow: Vec<Pipeline> = vec![Box::new(SlowPipeline {
            delay: Duration::from_millis(500),
        })];
        let splitter = SentenceSplitter::with_engines(slow, Duration::from_millis(100)).unwrap();
        let dispatcher = Arc::new(Dispatcher::new("sentences", Arc::new(splitter)));

        let holder = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.execute(Envelope::text("first")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let rejected = dispatcher.execute(Envelope::text("second")).await;
        let waited = started.elapsed();

        assert_eq!(rejected.error_message(), Some(messages::BUSY));
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(450));

        let served = holder.await.unwrap();
        assert_eq!(served.kind(), Some(Discriminator::Lapps));

        let after = dispatcher.execute(Envelope::text("third")).await;
        assert_eq!(after.kind(), Some(Discriminator::Lapps));
    }

    #[tokio::test]
    async fn test_closed_pool_reports_shutdown() {
        let dispatcher = Dispatcher::new("sentences", Arc::new(splitter()));
        dispatcher.close();

        let response = dispatcher.execute(Envelope::text("late")).await;
        assert_eq!(response.error_message(), Some(PoolError::Closed.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_metadata_descriptor() {
        let dispatcher = Dispatcher::new("sentences", Arc::new(splitter()));
        let response = dispatcher
            .execute(Envelope::new(uri::GET_METADATA, serde_json::Value::Null))
            .await;

        let metadata: ServiceMetadata = serde_json::from_value(response.payload().clone()).unwrap();
        assert_eq!(metadata, SentenceSplitter::descriptor());
        assert!(metadata.produces.annotations.contains(&uri::SENTENCE.to_string()));
    }

    #[test]
    fn test_zero_engines_is_startup_error() {
        let result = SentenceSplitter::new(&PoolConfig {
            size: 0,
            acquire_timeout_secs: 1,
        });
        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("Pool capacity must be > 0"));
    }
}
