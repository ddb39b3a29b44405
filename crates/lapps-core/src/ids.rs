//! Document-scoped annotation id generation

use std::collections::HashMap;

use crate::document::Document;

/// Generates ids of the form `<prefix><n>` with one counter per prefix
///
/// A generator seeded from a document continues after the highest id already
/// present for each prefix, so new annotations never collide with earlier
/// views of the same document. Counters are wider than the parsed ids, so
/// continuing after `u64::MAX` cannot overflow.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    counters: HashMap<String, u128>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator that continues the numbering used in `document`
    pub fn for_document(document: &Document) -> Self {
        let mut generator = Self::new();
        for annotation in document.annotations() {
            if let Some((prefix, n)) = split_id(annotation.id()) {
                let next = generator.counters.entry(prefix.to_string()).or_insert(0);
                *next = (*next).max(u128::from(n) + 1);
            }
        }
        generator
    }

    /// Next id for `prefix`
    pub fn generate(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let id = format!("{prefix}{counter}");
        *counter += 1;
        id
    }
}

/// Split `ne12` into (`ne`, 12)
fn split_id(id: &str) -> Option<(&str, u64)> {
    let digits = id.len() - id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || digits == id.len() {
        return None;
    }
    let (prefix, number) = id.split_at(id.len() - digits);
    number.parse().ok().map(|n| (prefix, n))
}
