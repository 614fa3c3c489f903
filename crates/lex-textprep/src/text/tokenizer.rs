//! Deterministic word tokenizer.

use once_cell::sync::Lazy;
use regex::Regex;

// Characters removed before splitting: . , / # ! $ % ^ & * ; : { } = - _ ` ~ ( )
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[.,/#!$%^&*;:{}=\-_`~()]").expect("Invalid regex: punctuation set")
});

/// Lowercases, strips a fixed punctuation set, and splits on whitespace.
///
/// No stemming, no stopwords, no locale-dependent rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tokenizer;

impl Tokenizer {
    pub fn new() -> Self {
        Self
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        PUNCTUATION
            .replace_all(&lowered, "")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}
