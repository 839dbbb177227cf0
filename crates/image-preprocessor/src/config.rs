//! Preprocessing configuration

use serde::{Deserialize, Serialize};

/// ImageNet per-channel mean (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Default square model input side
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Preprocessing parameters, fixed for the lifetime of a preprocessor.
///
/// The defaults reproduce the transform the classifier was trained with.
/// Changing them produces tensors the model was never trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Per-channel mean subtracted after scaling to [0, 1]
    pub mean: [f32; 3],
    /// Per-channel divisor applied after mean subtraction
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_INPUT_SIZE,
            height: DEFAULT_INPUT_SIZE,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl PreprocessConfig {
    /// Default normalization with a different output size
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// NCHW shape of the tensors this config produces
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }
}
