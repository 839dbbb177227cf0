//! Engine configuration

use std::path::PathBuf;

use image_preprocessor::DEFAULT_INPUT_SIZE;
use serde::{Deserialize, Serialize};

/// Model runtime backing the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// Pure-Rust portable graph execution (tract)
    #[default]
    Tract,
    /// ONNX Runtime
    Ort,
}

impl EngineBackend {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineBackend::Tract => "tract",
            EngineBackend::Ort => "ort",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Runtime to load the artifact with
    pub backend: EngineBackend,
    /// Path to the ONNX artifact
    pub model_path: PathBuf,
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Intra-op thread count (ONNX Runtime only)
    pub intra_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::default(),
            model_path: PathBuf::from("model.onnx"),
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            intra_threads: None,
        }
    }
}

impl EngineConfig {
    /// NCHW input shape for a single image
    pub fn input_shape(&self) -> [usize; 4] {
        [1, 3, self.input_height as usize, self.input_width as usize]
    }
}
