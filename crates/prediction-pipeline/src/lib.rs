//! Prediction Pipeline
//!
//! Runs one uploaded image through preprocessing, inference and scoring, and
//! resolves the winning label through the class index. Every stage failure is
//! caught here and reported as a [`Prediction::Failure`].

mod pipeline;

pub use pipeline::{Classification, Prediction, PredictionPipeline};

use class_index::LookupError;
use confidence_scorer::ScoreError;
use image_preprocessor::PreprocessError;
use inference_engine::InferenceError;
use thiserror::Error;

/// Any failure of a pipeline stage
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Decode(#[from] PreprocessError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

impl ClassifyError {
    /// Stage label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::Decode(_) => "decode",
            ClassifyError::Inference(_) => "inference",
            ClassifyError::Lookup(_) => "lookup",
            ClassifyError::Score(_) => "score",
        }
    }
}
