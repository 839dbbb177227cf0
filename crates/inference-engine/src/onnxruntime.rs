//! ONNX Runtime backend

use std::path::Path;
use std::sync::Mutex;

use image_preprocessor::ImageTensor;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::engine::check_input;
use crate::{InferenceEngine, InferenceError, Logits};

/// ONNX artifact executed by ONNX Runtime.
///
/// All requests go through one session; the mutex is the single acquisition
/// point so the session is never re-created per request.
pub struct OrtEngine {
    session: Mutex<Session>,
    input_shape: [usize; 4],
}

impl OrtEngine {
    /// Load a model with full graph optimization
    pub fn load(
        path: &Path,
        input_shape: [usize; 4],
        intra_threads: Option<usize>,
    ) -> Result<Self, InferenceError> {
        info!(
            "Loading ONNX Runtime model from {} with input {:?}",
            path.display(),
            input_shape
        );

        let load_err = |e: ort::Error| InferenceError::ModelLoad(e.to_string());

        let mut builder = Session::builder()
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?;

        if let Some(threads) = intra_threads {
            debug!("Using {} intra-op threads", threads);
            builder = builder.with_intra_threads(threads).map_err(load_err)?;
        }

        let session = builder.commit_from_file(path).map_err(load_err)?;
        info!("ONNX Runtime session ready");

        Ok(Self {
            session: Mutex::new(session),
            input_shape,
        })
    }
}

impl InferenceEngine for OrtEngine {
    fn infer(&self, input: ImageTensor) -> Result<Logits, InferenceError> {
        check_input(self.input_shape, &input)?;

        let run_err = |e: ort::Error| InferenceError::InferenceFailed(e.to_string());

        let shape = input.shape();
        let value = Tensor::from_array((shape, input.into_vec())).map_err(run_err)?;

        let session = self
            .session
            .lock()
            .map_err(|_| InferenceError::InferenceFailed("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![value].map_err(run_err)?)
            .map_err(run_err)?;

        let (dims, data) = outputs[0]
            .try_extract_raw_tensor::<f32>()
            .map_err(|e| InferenceError::InvalidOutput(e.to_string()))?;

        let dims = dims
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| InferenceError::InvalidOutput(format!("dynamic output shape {:?}", dims)))?;

        debug!("ort output shape {:?}", dims);
        Logits::from_output(&dims, data.to_vec())
    }

    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    fn backend_name(&self) -> &'static str {
        "ort"
    }
}
