//! Token → index vocabulary built from the training split.
//!
//! Two indices are reserved: [`PAD_INDEX`] fills sequences to length and
//! [`OOV_INDEX`] stands in for any token the training data never produced.
//! Every other token gets the next free index the first time it is seen,
//! walking rows in order and tokens left to right.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use tracing::debug;

use super::tokenizer::Tokenizer;
use crate::types::NormalizedRow;

pub const PAD_TOKEN: &str = "<PAD>";
pub const OOV_TOKEN: &str = "<OOV>";
pub const PAD_INDEX: u32 = 0;
pub const OOV_INDEX: u32 = 1;

/// Immutable mapping from token to index, plus its inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    index: HashMap<String, u32>,
    tokens: Vec<String>,
}

impl Vocabulary {
    /// A vocabulary holding only the two reserved tokens.
    pub fn reserved() -> Self {
        let mut vocab = Self {
            index: HashMap::new(),
            tokens: Vec::new(),
        };
        vocab.insert(PAD_TOKEN);
        vocab.insert(OOV_TOKEN);
        vocab
    }

    fn insert(&mut self, token: &str) {
        if self.index.contains_key(token) {
            return;
        }
        let next = self.tokens.len() as u32;
        self.index.insert(token.to_string(), next);
        self.tokens.push(token.to_string());
    }

    /// Index of `token`, or `None` if it was never seen.
    pub fn get(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    /// Index of `token`, falling back to [`OOV_INDEX`].
    pub fn index_of(&self, token: &str) -> u32 {
        self.get(token).unwrap_or(OOV_INDEX)
    }

    /// Token stored at `index`.
    pub fn token(&self, index: u32) -> Option<&str> {
        self.tokens.get(index as usize).map(String::as_str)
    }

    /// Number of entries, reserved tokens included.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Always false: the reserved tokens are present from construction.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of entries learned from data.
    pub fn learned_len(&self) -> usize {
        self.len().saturating_sub(2)
    }

    /// `(token, index)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, token)| (token.as_str(), i as u32))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::reserved()
    }
}

/// Serialized as a JSON object in index order.
impl Serialize for Vocabulary {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (token, index) in self.iter() {
            map.serialize_entry(token, &index)?;
        }
        map.end()
    }
}

/// Builds a [`Vocabulary`] from training rows only.
#[derive(Debug, Clone, Default)]
pub struct VocabularyBuilder {
    tokenizer: Tokenizer,
}

impl VocabularyBuilder {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn build(&self, rows: &[NormalizedRow]) -> Vocabulary {
        let mut vocab = Vocabulary::reserved();
        for row in rows {
            for token in self.tokenizer.tokenize(&row.text) {
                vocab.insert(&token);
            }
        }
        debug!(
            "Built vocabulary: {} tokens from {} rows",
            vocab.learned_len(),
            rows.len()
        );
        vocab
    }
}
