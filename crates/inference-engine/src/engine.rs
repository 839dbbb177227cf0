//! Inference Engine Contract

use image_preprocessor::ImageTensor;

use crate::InferenceError;

/// Raw per-class scores from one forward pass, positionally aligned with the
/// class index
#[derive(Debug, Clone, PartialEq)]
pub struct Logits(Vec<f32>);

impl Logits {
    /// Wrap a score vector
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Build from a model output of shape `[N]` or `[1, N]`
    pub fn from_output(shape: &[usize], values: Vec<f32>) -> Result<Self, InferenceError> {
        let width = match shape {
            [n] | [1, n] => *n,
            other => {
                return Err(InferenceError::InvalidOutput(format!(
                    "expected output shape [N] or [1, N], got {:?}",
                    other
                )))
            }
        };

        if values.len() != width {
            return Err(InferenceError::InvalidOutput(format!(
                "output shape {:?} declares {} scores but {} were produced",
                shape,
                width,
                values.len()
            )));
        }

        Ok(Self(values))
    }

    /// Scores as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Number of scores
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no scores were produced
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying vector
    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for Logits {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Forward-pass capability shared by every backend.
///
/// Implementations are loaded once and then used read-only from any number
/// of request threads.
pub trait InferenceEngine: Send + Sync {
    /// Run one preprocessed image through the model
    fn infer(&self, input: ImageTensor) -> Result<Logits, InferenceError>;

    /// NCHW shape the model accepts
    fn input_shape(&self) -> [usize; 4];

    /// Number of scores the model emits, when the artifact declares it
    fn output_width(&self) -> Option<usize> {
        None
    }

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Reject tensors whose shape differs from what the model expects
pub(crate) fn check_input(expected: [usize; 4], input: &ImageTensor) -> Result<(), InferenceError> {
    let actual = input.shape();
    if actual == expected {
        Ok(())
    } else {
        Err(InferenceError::InvalidInputShape {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        })
    }
}
