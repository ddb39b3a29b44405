//! LIF document model
//!
//! A [`Document`] holds the text under analysis and the [`View`]s added by
//! each processing stage. The text is fixed when the document is created;
//! annotations refer to it by character offsets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discriminator::uri;
use crate::Result;

/// Text under analysis plus accumulated annotation views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "@context", default = "default_context")]
    context: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    metadata: serde_json::Map<String, Value>,

    text: Text,

    #[serde(default)]
    views: Vec<View>,
}

fn default_context() -> String {
    uri::LIF_CONTEXT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Text {
    #[serde(rename = "@value")]
    value: String,

    #[serde(rename = "@language", default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
}

impl Document {
    /// Create a document over `text` with no views
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            context: default_context(),
            metadata: serde_json::Map::new(),
            text: Text {
                value: text.into(),
                language: None,
            },
            views: Vec::new(),
        }
    }

    /// Set the language tag of the text
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.text.language = Some(language.into());
        self
    }

    /// Deserialize a document from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Deserialize a document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn text(&self) -> &str {
        &self.text.value
    }

    pub fn language(&self) -> Option<&str> {
        self.text.language.as_deref()
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// Length of the text in characters
    pub fn char_len(&self) -> usize {
        self.text.value.chars().count()
    }

    /// Text between two character offsets, `None` when out of range
    pub fn slice_chars(&self, start: usize, end: usize) -> Option<String> {
        if start > end || end > self.char_len() {
            return None;
        }
        Some(self.text.value.chars().skip(start).take(end - start).collect())
    }

    /// Append a view, assigning it an id (`v0`, `v1`, ...) if it has none
    pub fn add_view(&mut self, mut view: View) -> &View {
        if view.id.is_empty() {
            view.id = format!("v{}", self.views.len());
        }
        self.views.push(view);
        &self.views[self.views.len() - 1]
    }

    /// The most recent view declaring annotations of `type_uri`
    pub fn find_view_containing(&self, type_uri: &str) -> Option<&View> {
        self.views.iter().rev().find(|v| v.contains(type_uri).is_some())
    }

    /// Iterate over every annotation in every view
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.views.iter().flat_map(|v| v.annotations.iter())
    }
}

/// Annotations produced by one processing stage, with provenance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    #[serde(default)]
    id: String,

    #[serde(default)]
    metadata: ViewMetadata,

    #[serde(default)]
    annotations: Vec<Annotation>,
}

/// View metadata; `contains` maps annotation type to its producer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewMetadata {
    #[serde(default)]
    pub contains: BTreeMap<String, Contains>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Provenance declaration for one annotation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contains {
    /// Component and version that produced the annotations
    pub producer: String,

    /// Concrete engine or model used
    #[serde(rename = "type")]
    pub name: String,
}

impl View {
    /// Create an empty view; an empty id is filled in by [`Document::add_view`]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn metadata(&self) -> &ViewMetadata {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Declare that annotations of `type_uri` in this view come from `producer`
    pub fn add_contains(
        &mut self,
        type_uri: impl Into<String>,
        producer: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.metadata.contains.insert(
            type_uri.into(),
            Contains {
                producer: producer.into(),
                name: name.into(),
            },
        );
    }

    /// Provenance declaration for `type_uri`, if any
    pub fn contains(&self, type_uri: &str) -> Option<&Contains> {
        self.metadata.contains.get(type_uri)
    }

    /// Annotation types present in the view without a provenance declaration
    pub fn undeclared_types(&self) -> Vec<&str> {
        let mut missing: Vec<&str> = self
            .annotations
            .iter()
            .map(|a| a.type_uri.as_str())
            .filter(|t| !self.metadata.contains.contains_key(*t))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Annotations of a given type, in insertion order
    pub fn annotations_of<'a>(&'a self, type_uri: &'a str) -> impl Iterator<Item = &'a Annotation> {
        self.annotations.iter().filter(move |a| a.type_uri == type_uri)
    }
}

/// Typed, offset-bounded span with a feature map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,

    #[serde(rename = "@type")]
    type_uri: String,

    #[serde(default)]
    start: usize,

    #[serde(default)]
    end: usize,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    features: BTreeMap<String, Value>,
}

impl Annotation {
    pub fn new(id: impl Into<String>, type_uri: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            id: id.into(),
            label: None,
            type_uri: type_uri.into(),
            start,
            end,
            features: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.features.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Add a feature only when a value is present
    pub fn with_optional_feature(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.with_feature(name, value),
            None => self,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn type_uri(&self) -> &str {
        &self.type_uri
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// String-valued feature
    pub fn feature(&self, name: &str) -> Option<&str> {
        self.features.get(name).and_then(Value::as_str)
    }

    pub fn features(&self) -> &BTreeMap<String, Value> {
        &self.features
    }
}
