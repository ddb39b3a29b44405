//! Gazetteer sequence classifier
//!
//! A classifier model is a JSON file of known phrases and regex patterns:
//!
//! ```json
//! {
//!   "name": "english.all.3class",
//!   "case_sensitive": false,
//!   "entries": { "Karen": "PERSON", "New York": "LOCATION" },
//!   "patterns": [ { "regex": "^\\d{4}$", "label": "DATE" } ]
//! }
//! ```
//!
//! Multi-word phrases tag every token they cover with the phrase's label;
//! tokens are never merged into one span.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;

use crate::registry::ClassifierLoader;
use crate::{EngineError, SequenceClassifier, Token, OUTSIDE};

// ============================================================================
// Model file format
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    case_sensitive: bool,

    #[serde(default)]
    entries: HashMap<String, String>,

    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

#[derive(Debug, Deserialize)]
struct PatternEntry {
    regex: String,
    label: String,
}

// ============================================================================
// Classifier
// ============================================================================

/// Phrase in the gazetteer, split into words
#[derive(Debug, Clone)]
struct Phrase {
    words: Vec<String>,
    label: String,
}

/// Dictionary and pattern based token classifier
///
/// Immutable once built; safe to share between threads.
#[derive(Debug)]
pub struct GazetteerClassifier {
    name: String,
    case_sensitive: bool,
    /// First word -> phrases starting with it, longest first
    phrases: HashMap<String, Vec<Phrase>>,
    patterns: Vec<(Regex, String)>,
}

impl GazetteerClassifier {
    /// Create an empty classifier
    pub fn new(name: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            name: name.into(),
            case_sensitive,
            phrases: HashMap::new(),
            patterns: Vec::new(),
        }
    }

    /// Parse a model from its JSON text
    pub fn from_json(default_name: &str, json: &str, path: &Path) -> Result<Self, EngineError> {
        let model: ModelFile =
            serde_json::from_str(json).map_err(|e| EngineError::MalformedModel {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let name = model.name.unwrap_or_else(|| default_name.to_string());
        let mut classifier = Self::new(name, model.case_sensitive);

        for (phrase, label) in &model.entries {
            classifier.add_phrase(phrase, label);
        }

        for pattern in &model.patterns {
            classifier
                .add_pattern(&pattern.regex, &pattern.label)
                .map_err(|e| EngineError::MalformedModel {
                    path: path.to_path_buf(),
                    message: format!("invalid pattern {:?}: {e}", pattern.regex),
                })?;
        }

        Ok(classifier)
    }

    /// Load a model file
    pub fn load(default_name: &str, path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::ModelRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(default_name, &json, path)
    }

    /// Add a phrase; empty phrases are ignored
    pub fn add_phrase(&mut self, phrase: &str, label: &str) {
        let words: Vec<String> = phrase.split_whitespace().map(|w| self.normalize(w)).collect();
        let Some(first) = words.first().cloned() else {
            return;
        };

        let bucket = self.phrases.entry(first).or_default();
        bucket.push(Phrase {
            words,
            label: label.to_string(),
        });
        bucket.sort_by(|a, b| b.words.len().cmp(&a.words.len()));
    }

    /// Add a regex pattern applied to single tokens
    pub fn add_pattern(&mut self, pattern: &str, label: &str) -> Result<(), regex::Error> {
        self.patterns.push((Regex::new(pattern)?, label.to_string()));
        Ok(())
    }

    fn normalize(&self, word: &str) -> String {
        if self.case_sensitive {
            word.to_string()
        } else {
            word.to_lowercase()
        }
    }

    /// Longest phrase starting at `tokens[0]`
    fn match_phrase(&self, tokens: &[String]) -> Option<&Phrase> {
        let candidates = self.phrases.get(tokens.first()?)?;
        candidates.iter().find(|phrase| {
            phrase.words.len() <= tokens.len()
                && phrase.words.iter().zip(tokens).all(|(a, b)| a == b)
        })
    }

    fn match_pattern(&self, word: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(regex, _)| regex.is_match(word))
            .map(|(_, label)| label.as_str())
    }
}

impl SequenceClassifier for GazetteerClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, tokens: &[Token]) -> Result<Vec<Token>, EngineError> {
        let normalized: Vec<String> = tokens.iter().map(|t| self.normalize(&t.word)).collect();
        let mut tags: Vec<Option<&str>> = vec![None; tokens.len()];

        let mut i = 0;
        while i < tokens.len() {
            if let Some(phrase) = self.match_phrase(&normalized[i..]) {
                for tag in &mut tags[i..i + phrase.words.len()] {
                    *tag = Some(phrase.label.as_str());
                }
                i += phrase.words.len();
            } else {
                tags[i] = self.match_pattern(&tokens[i].word);
                i += 1;
            }
        }

        Ok(tokens
            .iter()
            .zip(tags)
            .map(|(token, tag)| {
                let mut token = token.clone();
                token.answer = Some(tag.unwrap_or(OUTSIDE).to_string());
                token
            })
            .collect())
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Loads [`GazetteerClassifier`] model files for the registry
#[derive(Debug, Default, Clone, Copy)]
pub struct GazetteerLoader;

impl ClassifierLoader for GazetteerLoader {
    fn load(&self, name: &str, path: &Path) -> Result<Arc<dyn SequenceClassifier>, EngineError> {
        let classifier = GazetteerClassifier::load(name, path)?;
        tracing::info!(
            classifier = name,
            phrases = classifier.phrases.values().map(Vec::len).sum::<usize>(),
            patterns = classifier.patterns.len(),
            "Loaded gazetteer classifier"
        );
        Ok(Arc::new(classifier))
    }
}
