//! Fixed-output engine for tests and local development

use image_preprocessor::{ImageTensor, PreprocessConfig};
use tracing::info;

use crate::engine::check_input;
use crate::{InferenceEngine, InferenceError, Logits};

/// Engine that returns the same logits for every valid input
#[derive(Debug, Clone)]
pub struct MockEngine {
    logits: Vec<f32>,
    input_shape: [usize; 4],
}

impl MockEngine {
    /// Create a mock engine emitting `logits`
    pub fn new(logits: Vec<f32>) -> Self {
        info!("Creating mock inference engine with {} classes", logits.len());
        Self {
            logits,
            input_shape: PreprocessConfig::default().tensor_shape(),
        }
    }

    /// Accept a different input shape
    pub fn with_input_shape(mut self, input_shape: [usize; 4]) -> Self {
        self.input_shape = input_shape;
        self
    }
}

impl InferenceEngine for MockEngine {
    fn infer(&self, input: ImageTensor) -> Result<Logits, InferenceError> {
        check_input(self.input_shape, &input)?;
        Ok(Logits::new(self.logits.clone()))
    }

    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    fn output_width(&self) -> Option<usize> {
        Some(self.logits.len())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
