//! Fixed-length integer encoding and tensor assembly.

use serde::{Deserialize, Serialize};

use super::tokenizer::Tokenizer;
use super::vocabulary::{OOV_INDEX, PAD_INDEX, Vocabulary};
use crate::dataset::NormalizedTable;
use crate::error::{PipelineError, Result};
use crate::types::{DatasetRole, NormalizedRow};

/// Truncate on the right or pad on the right with [`PAD_INDEX`] until the
/// sequence has exactly `length` entries.
pub fn pad_or_truncate(mut indices: Vec<u32>, length: usize) -> Vec<u32> {
    indices.resize(length, PAD_INDEX);
    indices
}

/// One encoded text, always exactly the encoder's length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedSequence(Vec<u32>);

impl EncodedSequence {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Positions holding a real or out-of-vocabulary token.
    pub fn token_count(&self) -> usize {
        self.0.iter().filter(|&&i| i != PAD_INDEX).count()
    }

    pub fn oov_count(&self) -> usize {
        self.0.iter().filter(|&&i| i == OOV_INDEX).count()
    }
}

impl From<EncodedSequence> for Vec<u32> {
    fn from(seq: EncodedSequence) -> Self {
        seq.0
    }
}

/// Row-major 2-D integer tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntTensor {
    pub shape: [usize; 2],
    pub data: Vec<i32>,
}

impl IntTensor {
    /// Build a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: [usize; 2], data: Vec<i32>) -> Result<Self> {
        if shape[0] * shape[1] != data.len() {
            return Err(PipelineError::Encoding(format!(
                "tensor shape {:?} needs {} values, got {}",
                shape,
                shape[0] * shape[1],
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    /// Row `index`, or `None` past the last row.
    pub fn row(&self, index: usize) -> Option<&[i32]> {
        if index >= self.rows() {
            return None;
        }
        let cols = self.cols();
        self.data.get(index * cols..(index + 1) * cols)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[i32]> {
        (0..self.rows()).filter_map(move |i| self.row(i))
    }
}

/// Encoded sequences and labels of one role, in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedDataset {
    pub role: DatasetRole,
    pub sequence_length: usize,
    pub sequences: Vec<EncodedSequence>,
    pub labels: Vec<u8>,
}

impl EncodedDataset {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Share of non-pad positions that hold [`OOV_INDEX`].
    pub fn oov_rate(&self) -> f32 {
        let (oov, total) = self.sequences.iter().fold((0, 0), |(oov, total), seq| {
            (oov + seq.oov_count(), total + seq.token_count())
        });
        if total == 0 {
            0.0
        } else {
            oov as f32 / total as f32
        }
    }

    /// Check that every sequence has the same length and labels line up.
    pub fn validate(&self) -> Result<()> {
        if self.sequences.len() != self.labels.len() {
            return Err(PipelineError::Encoding(format!(
                "{} dataset has {} sequences but {} labels",
                self.role,
                self.sequences.len(),
                self.labels.len()
            )));
        }
        if let Some((row, seq)) = self
            .sequences
            .iter()
            .enumerate()
            .find(|(_, s)| s.len() != self.sequence_length)
        {
            return Err(PipelineError::Encoding(format!(
                "{} dataset row {} has length {}, expected {}",
                self.role,
                row,
                seq.len(),
                self.sequence_length
            )));
        }
        Ok(())
    }

    /// Features `[n, L]` and labels `[n, 1]`.
    pub fn to_tensors(&self) -> Result<(IntTensor, IntTensor)> {
        self.validate()?;
        let n = self.len();
        let features = self
            .sequences
            .iter()
            .flat_map(|s| s.as_slice().iter().map(|&i| i as i32))
            .collect();
        let labels = self.labels.iter().map(|&l| i32::from(l)).collect();
        Ok((
            IntTensor::new([n, self.sequence_length], features)?,
            IntTensor::new([n, 1], labels)?,
        ))
    }
}

/// Maps text to fixed-length index sequences against a vocabulary.
#[derive(Debug, Clone)]
pub struct SequenceEncoder {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl SequenceEncoder {
    pub fn new(max_length: usize) -> Self {
        Self::with_tokenizer(Tokenizer, max_length)
    }

    pub fn with_tokenizer(tokenizer: Tokenizer, max_length: usize) -> Self {
        Self {
            tokenizer,
            max_length,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn encode_tokens<S: AsRef<str>>(&self, tokens: &[S], vocab: &Vocabulary) -> EncodedSequence {
        let indices = tokens
            .iter()
            .take(self.max_length)
            .map(|t| vocab.index_of(t.as_ref()))
            .collect();
        EncodedSequence(pad_or_truncate(indices, self.max_length))
    }

    pub fn encode_text(&self, text: &str, vocab: &Vocabulary) -> EncodedSequence {
        self.encode_tokens(&self.tokenizer.tokenize(text), vocab)
    }

    pub fn encode_rows(
        &self,
        role: DatasetRole,
        rows: &[NormalizedRow],
        vocab: &Vocabulary,
    ) -> EncodedDataset {
        EncodedDataset {
            role,
            sequence_length: self.max_length,
            sequences: rows.iter().map(|r| self.encode_text(&r.text, vocab)).collect(),
            labels: rows.iter().map(|r| r.label).collect(),
        }
    }

    /// Encode a role's rows and confirm the result is rectangular.
    pub fn encode_dataset(
        &self,
        role: DatasetRole,
        table: &NormalizedTable,
        vocab: &Vocabulary,
    ) -> Result<EncodedDataset> {
        let dataset = self.encode_rows(role, &table.rows, vocab);
        dataset.validate()?;
        Ok(dataset)
    }
}
