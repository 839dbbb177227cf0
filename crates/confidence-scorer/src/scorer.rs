//! Softmax scoring

use serde::{Deserialize, Serialize};

use crate::ScoreError;

/// Winning class of one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Label index with the highest probability
    pub index: usize,
    /// Probability of that label (0.0 to 1.0)
    pub probability: f64,
    /// Probability as a percentage (0.0 to 100.0)
    pub confidence: f64,
}

/// Picks the most probable class from a logit vector
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Create a scorer
    pub fn new() -> Self {
        Self
    }

    /// Softmax the logits and return the first maximum
    pub fn score(&self, logits: &[f32]) -> Result<Score, ScoreError> {
        let probabilities = softmax(logits)?;
        let index = argmax(&probabilities).ok_or(ScoreError::EmptyInput)?;
        let probability = probabilities[index];

        Ok(Score {
            index,
            probability,
            confidence: (probability * 100.0).clamp(0.0, 100.0),
        })
    }
}

/// Softmax with the maximum logit subtracted before exponentiating.
///
/// Accumulates in f64 so large class counts still sum to 1 within tolerance.
pub fn softmax(logits: &[f32]) -> Result<Vec<f64>, ScoreError> {
    if logits.is_empty() {
        return Err(ScoreError::EmptyInput);
    }
    if let Some(index) = logits.iter().position(|v| !v.is_finite()) {
        return Err(ScoreError::NonFinite { index });
    }

    let max = logits.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v as f64));
    let exps: Vec<f64> = logits.iter().map(|&v| (v as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Index of the largest value; ties go to the lowest index
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// The `k` most probable labels, descending, ties by lowest index
pub fn top_k(probabilities: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = probabilities.iter().copied().enumerate().collect();
    // stable sort keeps index order among equal probabilities
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed
}
