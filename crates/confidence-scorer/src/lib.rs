//! Confidence Scoring
//!
//! Turns raw classifier logits into a probability distribution and picks the
//! winning class with its confidence percentage.

mod scorer;

pub use scorer::{argmax, softmax, top_k, ConfidenceScorer, Score};

use thiserror::Error;

/// Errors during scoring
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("Cannot score an empty logit vector")]
    EmptyInput,
    #[error("Logit at index {index} is not finite")]
    NonFinite { index: usize },
}
