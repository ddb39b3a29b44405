//! Projection of engine output into LIF views
//!
//! Every projection appends exactly one new view to the document and
//! declares, for each annotation type it writes, which component produced it.

use lapps_core::{uri, Annotation, Document, IdGenerator, View};

use crate::{Sentence, Token, OUTSIDE};

/// Provenance string for a component: `<type path>:<crate version>`
pub fn producer_id<T: ?Sized>() -> String {
    format!("{}:{}", std::any::type_name::<T>(), env!("CARGO_PKG_VERSION"))
}

/// Vocabulary type for a classifier tag
///
/// Unknown tags are used verbatim as the annotation type.
pub fn type_uri_for(tag: &str) -> &str {
    match tag {
        "PERSON" => uri::PERSON,
        "DATE" => uri::DATE,
        "LOCATION" => uri::LOCATION,
        "ORGANIZATION" => uri::ORGANIZATION,
        "MISC" => uri::NE,
        other => other,
    }
}

// ============================================================================
// Named entities
// ============================================================================

/// Writes classified tokens into a named-entity view
#[derive(Debug, Clone)]
pub struct EntityProjector {
    producer: String,
}

impl EntityProjector {
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
        }
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// Add one annotation per non-`O` token; returns the number added
    ///
    /// `model` is recorded as the concrete producer in each `contains`
    /// declaration. An empty token list leaves the document untouched.
    pub fn project(&self, document: &mut Document, tokens: &[Token], model: &str) -> usize {
        if tokens.is_empty() {
            tracing::warn!(model, "Classifier returned no tokens");
            return 0;
        }

        let mut ids = IdGenerator::for_document(document);
        let mut view = View::new();

        for token in tokens {
            let tag = token.tag();
            if tag == OUTSIDE {
                continue;
            }

            let type_uri = type_uri_for(tag);
            tracing::debug!(label = tag, word = %token.word, start = token.start, "Entity");

            view.add_annotation(
                Annotation::new(ids.generate("ne"), type_uri, token.start, token.end)
                    .with_label(tag)
                    .with_optional_feature("lemma", token.lemma.as_deref())
                    .with_optional_feature("category", token.category.as_deref())
                    .with_optional_feature("pos", token.pos.as_deref())
                    .with_optional_feature("ner", token.ner.as_deref())
                    .with_feature("word", token.word.as_str()),
            );
            if view.contains(type_uri).is_none() {
                view.add_contains(type_uri, self.producer.as_str(), model);
            }
        }

        let added = view.annotations().len();
        document.add_view(view);
        added
    }
}

// ============================================================================
// Sentences and tokens
// ============================================================================

/// Name recorded for sentence annotations
pub const SENTENCE_CHUNKER: &str = "chunk:sentence";

/// Writes sentence and token spans into a view
#[derive(Debug, Clone)]
pub struct SentenceProjector {
    producer: String,
}

impl SentenceProjector {
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
        }
    }

    /// Add sentence and token annotations; returns the number of sentences
    pub fn project(&self, document: &mut Document, sentences: &[Sentence], pipeline: &str) -> usize {
        let mut ids = IdGenerator::for_document(document);
        let mut view = View::new();
        view.add_contains(uri::SENTENCE, self.producer.as_str(), SENTENCE_CHUNKER);
        view.add_contains(uri::TOKEN, self.producer.as_str(), pipeline);

        for sentence in sentences {
            view.add_annotation(Annotation::new(
                ids.generate("s"),
                uri::SENTENCE,
                sentence.start,
                sentence.end,
            ));
            for token in &sentence.tokens {
                view.add_annotation(
                    Annotation::new(ids.generate("tok"), uri::TOKEN, token.start, token.end)
                        .with_feature("word", token.word.as_str()),
                );
            }
        }

        document.add_view(view);
        sentences.len()
    }
}
