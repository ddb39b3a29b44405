//! Named entity recognizer service
//!
//! Classifies the tokens of a LIF document with a classifier chosen per
//! request through the `classifier` parameter. Classifiers are loaded from
//! the model root on first use.

use anyhow::Context;
use async_trait::async_trait;
use lapps_core::{uri, Discriminator, Document, NerConfig, Parameters, ServiceMetadata};
use serde_json::Value;

use super::{Processor, ServiceError};
use crate::projector::{producer_id, EntityProjector};
use crate::registry::ClassifierRegistry;
use crate::Token;

/// Request parameter naming the classifier to use
pub const CLASSIFIER_PARAMETER: &str = "classifier";

/// Tags tokens with entity types using a selectable classifier
pub struct NamedEntityRecognizer {
    registry: ClassifierRegistry,
    metadata: ServiceMetadata,
    projector: EntityProjector,
}

impl NamedEntityRecognizer {
    /// Create a recognizer over the models in `config.model_root`
    pub fn new(config: &NerConfig) -> anyhow::Result<Self> {
        let root = &config.model_root;
        let info = std::fs::metadata(root)
            .with_context(|| format!("Unable to open the classifier root {}", root.display()))?;
        if !info.is_dir() {
            anyhow::bail!("The classifier root {} is not a directory", root.display());
        }

        tracing::info!(root = %root.display(), "Named entity recognizer created");
        Ok(Self::with_registry(ClassifierRegistry::new(root)))
    }

    pub fn with_registry(registry: ClassifierRegistry) -> Self {
        Self {
            registry,
            metadata: Self::descriptor(),
            projector: EntityProjector::new(producer_id::<Self>()),
        }
    }

    pub fn descriptor() -> ServiceMetadata {
        ServiceMetadata::new(
            std::any::type_name::<Self>(),
            env!("CARGO_PKG_VERSION"),
            "Named entity recognizer (selectable classifier)",
        )
        .requires_format(uri::LAPPS)
        .requires_annotation(uri::TOKEN)
        .produces_format(uri::LAPPS)
        .produces_annotation(uri::DATE)
        .produces_annotation(uri::PERSON)
        .produces_annotation(uri::LOCATION)
        .produces_annotation(uri::ORGANIZATION)
        .with_language("en")
    }

    pub fn registry(&self) -> &ClassifierRegistry {
        &self.registry
    }
}

#[async_trait]
impl Processor for NamedEntityRecognizer {
    fn metadata(&self) -> &ServiceMetadata {
        &self.metadata
    }

    fn accepts(&self, kind: &Discriminator) -> bool {
        matches!(
            kind,
            Discriminator::Lapps | Discriminator::Json | Discriminator::JsonLd
        )
    }

    async fn process(
        &self,
        mut document: Document,
        parameters: &Parameters,
    ) -> Result<Document, ServiceError> {
        let tokens = tokens_from_document(&document)?;

        let name = match parameters.get(CLASSIFIER_PARAMETER) {
            None | Some(Value::Null) => return Err(ServiceError::MissingClassifier),
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
        };

        let classifier = self.registry.resolve(&name).await?;
        let classified = tokio::task::spawn_blocking(move || classifier.classify(&tokens))
            .await
            .map_err(|e| ServiceError::Engine(e.to_string()))??;

        tracing::info!(classifier = %name, labels = classified.len(), "Classification complete");
        self.projector.project(&mut document, &classified, &name);
        Ok(document)
    }
}

/// Tokens of the most recent view declaring `Token` annotations
///
/// Missing `word` features fall back to the covered text and missing
/// lemmas to the lowercase word. A token whose span is reversed or runs
/// past the end of the text makes the document unparsable.
pub fn tokens_from_document(document: &Document) -> Result<Vec<Token>, ServiceError> {
    let view = document
        .find_view_containing(uri::TOKEN)
        .ok_or(ServiceError::NoTokens)?;
    let len = document.char_len();

    let tokens: Vec<Token> = view
        .annotations_of(uri::TOKEN)
        .map(|a| {
            if a.start() > a.end() || a.end() > len {
                tracing::warn!(
                    id = a.id(),
                    start = a.start(),
                    end = a.end(),
                    len,
                    "Token span outside the document text"
                );
                return Err(ServiceError::Unparsable);
            }

            let word = a
                .feature("word")
                .map(str::to_string)
                .or_else(|| document.slice_chars(a.start(), a.end()))
                .unwrap_or_default();
            let lemma = a
                .feature("lemma")
                .map(str::to_string)
                .unwrap_or_else(|| word.to_lowercase());

            Ok(Token {
                lemma: Some(lemma),
                pos: a.feature("pos").map(str::to_string),
                category: a.feature("category").map(str::to_string),
                ner: a.feature("ner").map(str::to_string),
                ..Token::new(word, a.start(), a.end())
            })
        })
        .collect::<Result<_, _>>()?;

    if tokens.is_empty() {
        tracing::warn!("{}", super::messages::NO_TOKENS);
        return Err(ServiceError::NoTokens);
    }
    Ok(tokens)
}
