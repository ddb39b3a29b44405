//! Service metadata descriptors
//!
//! Returned for `getMetadata` requests without touching any engine.

use serde::{Deserialize, Serialize};

use crate::discriminator::uri;

/// Capability descriptor of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    #[serde(rename = "$schema")]
    pub schema: String,

    /// Fully qualified service name
    pub name: String,

    pub version: String,

    pub vendor: String,

    pub description: String,

    /// Who may use the service
    pub allow: String,

    pub license: String,

    pub requires: IoSpecification,

    pub produces: IoSpecification,
}

/// Formats and annotation types consumed or produced by a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoSpecification {
    #[serde(default)]
    pub format: Vec<String>,

    #[serde(default)]
    pub annotations: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language: Vec<String>,
}

impl ServiceMetadata {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            schema: uri::METADATA_SCHEMA.to_string(),
            name: name.into(),
            version: version.into(),
            vendor: "http://www.anc.org".to_string(),
            description: description.into(),
            allow: "any".to_string(),
            license: "apache2".to_string(),
            requires: IoSpecification::default(),
            produces: IoSpecification::default(),
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn requires_format(mut self, format: &str) -> Self {
        self.requires.format.push(format.to_string());
        self
    }

    pub fn requires_annotation(mut self, annotation: &str) -> Self {
        self.requires.annotations.push(annotation.to_string());
        self
    }

    pub fn produces_format(mut self, format: &str) -> Self {
        self.produces.format.push(format.to_string());
        self
    }

    pub fn produces_annotation(mut self, annotation: &str) -> Self {
        self.produces.annotations.push(annotation.to_string());
        self
    }

    /// Declare the language on both input and output
    pub fn with_language(mut self, language: &str) -> Self {
        self.requires.language.push(language.to_string());
        self.produces.language.push(language.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let meta = ServiceMetadata::new("splitter", "1.0.0", "Sentence splitter")
            .requires_format(uri::TEXT)
            .produces_format(uri::LAPPS)
            .produces_annotation(uri::SENTENCE)
            .produces_annotation(uri::TOKEN)
            .with_language("en");

        assert_eq!(meta.requires.format, vec![uri::TEXT]);
        assert_eq!(meta.produces.annotations, vec![uri::SENTENCE, uri::TOKEN]);
        assert_eq!(meta.requires.language, vec!["en"]);
    }

    #[test]
    fn test_serialized_shape() {
        let meta = ServiceMetadata::new("ner", "1.0.0", "NER").requires_annotation(uri::TOKEN);
        let value = serde_json::to_value(&meta).unwrap();

        assert_eq!(value["$schema"], uri::METADATA_SCHEMA);
        assert_eq!(value["allow"], "any");
        assert_eq!(value["requires"]["annotations"][0], uri::TOKEN);
        assert!(value["requires"].get("language").is_none());
    }
}
