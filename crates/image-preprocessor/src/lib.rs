//! Image Preprocessing
//!
//! Decodes uploaded photographs and converts them into the exact tensor the
//! classifier was trained on:
//! - RGB, 224x224, bilinear resize without letterboxing
//! - ImageNet mean/std normalization
//! - `[1, 3, H, W]` channel-first layout

mod config;
mod error;
mod preprocessor;
mod tensor;

pub use config::{PreprocessConfig, DEFAULT_INPUT_SIZE, IMAGENET_MEAN, IMAGENET_STD};
pub use error::PreprocessError;
pub use preprocessor::{decode, ImagePreprocessor};
pub use tensor::ImageTensor;
