//! Text → integer sequence conversion.
//!
//! The same [`Tokenizer`] feeds vocabulary construction, dataset encoding and
//! single-text prediction, so indices never diverge between the three.

pub mod encoder;
pub mod tokenizer;
pub mod vocabulary;

pub use encoder::{EncodedDataset, EncodedSequence, IntTensor, SequenceEncoder, pad_or_truncate};
pub use tokenizer::Tokenizer;
pub use vocabulary::{OOV_INDEX, OOV_TOKEN, PAD_INDEX, PAD_TOKEN, Vocabulary, VocabularyBuilder};
