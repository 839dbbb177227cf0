//! ONNX Inference Engine
//!
//! Forward-pass contract for the classifier plus interchangeable backends:
//! tract for portable pure-Rust execution, ONNX Runtime for the full native
//! runtime. The backend is chosen by configuration; callers only see
//! [`InferenceEngine`].

mod config;
mod engine;
mod mock;
mod onnxruntime;
mod tract;

pub use config::{EngineBackend, EngineConfig};
pub use engine::{InferenceEngine, Logits};
pub use mock::MockEngine;
pub use onnxruntime::OrtEngine;
pub use tract::TractEngine;

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

/// Load the configured backend
pub fn load_engine(config: &EngineConfig) -> Result<Arc<dyn InferenceEngine>, InferenceError> {
    info!(
        "Loading {} engine from {}",
        config.backend.as_str(),
        config.model_path.display()
    );

    if !config.model_path.is_file() {
        error!("Model artifact not found at {}", config.model_path.display());
        return Err(InferenceError::ModelLoad(format!(
            "model file not found: {}",
            config.model_path.display()
        )));
    }

    let input_shape = config.input_shape();
    let engine: Arc<dyn InferenceEngine> = match config.backend {
        EngineBackend::Tract => Arc::new(TractEngine::load(&config.model_path, input_shape)?),
        EngineBackend::Ort => Arc::new(OrtEngine::load(
            &config.model_path,
            input_shape,
            config.intra_threads,
        )?),
    };

    Ok(engine)
}
