//! Portable backend using tract

use std::path::Path;

use image_preprocessor::ImageTensor;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::engine::check_input;
use crate::{InferenceEngine, InferenceError, Logits};

type TractPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// ONNX artifact executed by tract.
///
/// The optimized plan is immutable after load and `Sync`, so requests run
/// against it concurrently without locking.
pub struct TractEngine {
    plan: TractPlan,
    input_shape: [usize; 4],
    output_width: Option<usize>,
}

impl TractEngine {
    /// Load and optimize an ONNX model with a fixed input shape
    pub fn load(path: &Path, input_shape: [usize; 4]) -> Result<Self, InferenceError> {
        info!("Loading tract model from {} with input {:?}", path.display(), input_shape);

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|m| m.into_optimized())
            .map_err(|e| InferenceError::ModelLoad(format!("{e:#}")))?;

        let output_width = model
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().and_then(|dims| dims.last().copied()));

        let plan = model
            .into_runnable()
            .map_err(|e| InferenceError::ModelLoad(format!("{e:#}")))?;

        info!("Tract model ready (output width: {:?})", output_width);
        Ok(Self {
            plan,
            input_shape,
            output_width,
        })
    }
}

impl InferenceEngine for TractEngine {
    fn infer(&self, input: ImageTensor) -> Result<Logits, InferenceError> {
        check_input(self.input_shape, &input)?;

        let tensor = Tensor::from_shape(&input.shape(), input.as_slice())
            .map_err(|e| InferenceError::InferenceFailed(format!("{e:#}")))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::InferenceFailed(format!("{e:#}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::InvalidOutput("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InvalidOutput(format!("{e:#}")))?;

        debug!("tract output shape {:?}", view.shape());
        Logits::from_output(view.shape(), view.iter().copied().collect())
    }

    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    fn backend_name(&self) -> &'static str {
        "tract"
    }
}
