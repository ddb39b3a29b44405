//! Message discriminators
//!
//! Every envelope names the kind of its payload with a URI from the LAPPS
//! vocabulary. Short names (`text`, `lapps`, ...) are accepted on input and
//! normalized to the full URI.

use serde::{Deserialize, Serialize};

/// Vocabulary URIs for discriminators and annotation types
pub mod uri {
    pub const TEXT: &str = "http://vocab.lappsgrid.org/ns/media/text";
    pub const JSON: &str = "http://vocab.lappsgrid.org/ns/media/json";
    pub const JSON_LD: &str = "http://vocab.lappsgrid.org/ns/media/jsonld";
    pub const LAPPS: &str = "http://vocab.lappsgrid.org/ns/media/jsonld#lif";
    pub const ERROR: &str = "http://vocab.lappsgrid.org/ns/error";
    pub const GET_METADATA: &str = "http://vocab.lappsgrid.org/ns/action/metadata";
    pub const META: &str = "http://vocab.lappsgrid.org/ns/meta";

    pub const TOKEN: &str = "http://vocab.lappsgrid.org/Token";
    pub const SENTENCE: &str = "http://vocab.lappsgrid.org/Sentence";
    pub const NE: &str = "http://vocab.lappsgrid.org/NamedEntity";
    pub const PERSON: &str = "http://vocab.lappsgrid.org/Person";
    pub const LOCATION: &str = "http://vocab.lappsgrid.org/Location";
    pub const ORGANIZATION: &str = "http://vocab.lappsgrid.org/Organization";
    pub const DATE: &str = "http://vocab.lappsgrid.org/Date";

    pub const LIF_CONTEXT: &str = "http://vocab.lappsgrid.org/context-1.0.0.jsonld";
    pub const METADATA_SCHEMA: &str =
        "http://vocab.lappsgrid.org/schema/1.1.0/metadata-schema.json";
}

/// Closed set of message kinds a service understands
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Discriminator {
    Text,
    Json,
    JsonLd,
    Lapps,
    Error,
    GetMetadata,
    Meta,
    Other(String),
}

impl Discriminator {
    /// Parse a discriminator from either its URI or its short name
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            uri::TEXT | "text" => Self::Text,
            uri::JSON | "json" => Self::Json,
            uri::JSON_LD | "jsonld" | "json-ld" => Self::JsonLd,
            uri::LAPPS | "lapps" | "lif" => Self::Lapps,
            uri::ERROR | "error" => Self::Error,
            uri::GET_METADATA | "metadata" | "getmetadata" => Self::GetMetadata,
            uri::META | "meta" => Self::Meta,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical URI for this discriminator
    pub fn as_uri(&self) -> &str {
        match self {
            Self::Text => uri::TEXT,
            Self::Json => uri::JSON,
            Self::JsonLd => uri::JSON_LD,
            Self::Lapps => uri::LAPPS,
            Self::Error => uri::ERROR,
            Self::GetMetadata => uri::GET_METADATA,
            Self::Meta => uri::META,
            Self::Other(value) => value,
        }
    }

    /// Whether the payload carries a document (plain text or a serialized container)
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Text | Self::Json | Self::JsonLd | Self::Lapps)
    }
}

impl From<String> for Discriminator {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Discriminator> for String {
    fn from(value: Discriminator) -> Self {
        value.as_uri().to_string()
    }
}

impl std::fmt::Display for Discriminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_uri())
    }
}
