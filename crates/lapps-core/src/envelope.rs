//! Request/response envelope
//!
//! An envelope is the unit exchanged with a service: a discriminator naming
//! the payload kind, the payload itself, and free-form parameters. Envelopes
//! are never modified in place; a response is always a new envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discriminator::{uri, Discriminator};
use crate::document::Document;
use crate::metadata::ServiceMetadata;
use crate::Result;

/// Free-form request parameters (e.g. `classifier`)
pub type Parameters = serde_json::Map<String, Value>;

/// Self-describing service message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    discriminator: String,

    #[serde(default)]
    payload: Value,

    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    parameters: Parameters,
}

impl Envelope {
    /// Create an envelope with no parameters
    pub fn new(discriminator: impl Into<String>, payload: Value) -> Self {
        Self {
            discriminator: discriminator.into(),
            payload,
            parameters: Parameters::new(),
        }
    }

    /// Plain text payload
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(uri::TEXT, Value::String(text.into()))
    }

    /// Error envelope carrying a human-readable message
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(uri::ERROR, Value::String(message.into()))
    }

    /// Document envelope with the given parameters carried over
    pub fn document(document: &Document, parameters: Parameters) -> Result<Self> {
        Ok(Self {
            discriminator: uri::LAPPS.to_string(),
            payload: serde_json::to_value(document)?,
            parameters,
        })
    }

    /// Metadata response envelope
    pub fn metadata(metadata: &ServiceMetadata) -> Result<Self> {
        Ok(Self::new(uri::META, serde_json::to_value(metadata)?))
    }

    /// Add a parameter, returning the new envelope
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Parse an envelope from its serialized form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the envelope
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize the envelope with indentation
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Raw discriminator as supplied by the sender
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// Parsed discriminator, `None` when the sender did not supply one
    pub fn kind(&self) -> Option<Discriminator> {
        if self.discriminator.trim().is_empty() {
            None
        } else {
            Some(Discriminator::parse(&self.discriminator))
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Look up a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).filter(|v| !v.is_null())
    }

    /// Whether this is an error envelope
    pub fn is_error(&self) -> bool {
        self.kind() == Some(Discriminator::Error)
    }

    /// Error message carried by an error envelope
    pub fn error_message(&self) -> Option<&str> {
        if self.is_error() {
            self.payload.as_str()
        } else {
            None
        }
    }

    /// Split into payload and parameters
    pub fn into_parts(self) -> (Value, Parameters) {
        (self.payload, self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope() {
        let env = Envelope::error("boom");
        assert!(env.is_error());
        assert_eq!(env.error_message(), Some("boom"));
        assert_eq!(env.discriminator(), uri::ERROR);
    }

    #[test]
    fn test_missing_fields_default() {
        let env = Envelope::from_json("{}").unwrap();
        assert_eq!(env.kind(), None);
        assert!(env.payload().is_null());
        assert!(env.parameters().is_empty());
    }

    #[test]
    fn test_short_discriminator_is_kept_verbatim() {
        let env = Envelope::from_json(r#"{"discriminator":"text","payload":"hi"}"#).unwrap();
        assert_eq!(env.discriminator(), "text");
        assert_eq!(env.kind(), Some(Discriminator::Text));
    }

    #[test]
    fn test_parameters() {
        let env = Envelope::text("Karen flew to Paris.")
            .with_parameter("classifier", "english.all.3class.distsim.crf.ser.gz")
            .with_parameter("unused", Value::Null);

        assert_eq!(
            env.parameter("classifier").and_then(Value::as_str),
            Some("english.all.3class.distsim.crf.ser.gz")
        );
        assert!(env.parameter("unused").is_none());
        assert!(env.parameter("missing").is_none());
    }

    #[test]
    fn test_field_names_on_the_wire() {
        let env = Envelope::text("hello").with_parameter("k", 1);
        let value: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "discriminator": uri::TEXT,
                "payload": "hello",
                "parameters": { "k": 1 }
            })
        );
    }

    #[test]
    fn test_document_envelope() {
        let doc = Document::new("Hello world.");
        let env = Envelope::document(&doc, Parameters::new()).unwrap();
        assert_eq!(env.kind(), Some(Discriminator::Lapps));
        assert_eq!(env.payload()["text"]["@value"], "Hello world.");
    }
}
