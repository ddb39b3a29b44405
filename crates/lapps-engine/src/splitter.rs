//! Regex sentence/token pipeline
//!
//! Tokens are runs of word characters (with inner apostrophes) or single
//! punctuation marks. A sentence ends after `.`, `!` or `?`, together with
//! any closing quotes or brackets that follow it.

use regex::Regex;

use crate::{EngineError, Sentence, SentencePipeline, Token};

const TOKEN_PATTERN: &str = r"\w+(?:['’]\w+)*|[^\w\s]";

const TERMINATORS: &[&str] = &[".", "!", "?"];

const CLOSERS: &[&str] = &["\"", "'", "”", "’", ")", "]", "}"];

const ABBREVIATIONS: &[&str] = &[
    "Mr", "Mrs", "Ms", "Dr", "Prof", "St", "Jr", "Sr", "Inc", "Ltd", "Co", "vs",
];

/// Sentence splitter and tokenizer backed by a regular expression
pub struct RegexPipeline {
    token_pattern: Regex,
    /// Tokens of the sentence being assembled; reused between calls
    scratch: Vec<Token>,
}

impl RegexPipeline {
    pub fn new() -> Result<Self, EngineError> {
        let token_pattern =
            Regex::new(TOKEN_PATTERN).map_err(|e| EngineError::Processing(e.to_string()))?;

        tracing::info!("Regex sentence pipeline created.");
        Ok(Self {
            token_pattern,
            scratch: Vec::new(),
        })
    }

    /// Tokenize `text`, converting byte offsets to character offsets
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut byte_cursor = 0;
        let mut char_cursor = 0;

        for mat in self.token_pattern.find_iter(text) {
            char_cursor += text[byte_cursor..mat.start()].chars().count();
            let len = mat.as_str().chars().count();
            tokens.push(Token::new(mat.as_str(), char_cursor, char_cursor + len));
            char_cursor += len;
            byte_cursor = mat.end();
        }

        tokens
    }

    fn flush(&mut self, sentences: &mut Vec<Sentence>) {
        if self.scratch.is_empty() {
            return;
        }
        let tokens = std::mem::take(&mut self.scratch);
        sentences.push(Sentence {
            start: tokens[0].start,
            end: tokens[tokens.len() - 1].end,
            tokens,
        });
    }
}

impl SentencePipeline for RegexPipeline {
    fn name(&self) -> &str {
        "tokenization:regex"
    }

    fn annotate(&mut self, text: &str) -> Result<Vec<Sentence>, EngineError> {
        self.scratch.clear();
        let mut sentences = Vec::new();
        let mut closing = false;

        for token in self.tokenize(text) {
            let word = token.word.as_str();
            if closing && !TERMINATORS.contains(&word) && !CLOSERS.contains(&word) {
                self.flush(&mut sentences);
                closing = false;
            }

            let ends_sentence = TERMINATORS.contains(&word)
                && !(word == "."
                    && self
                        .scratch
                        .last()
                        .is_some_and(|prev| ABBREVIATIONS.contains(&prev.word.as_str())));

            self.scratch.push(token);
            closing |= ends_sentence;
        }

        self.flush(&mut sentences);
        Ok(sentences)
    }
}
