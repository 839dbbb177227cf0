//! Class Index
//!
//! Maps class names to the integer labels a classifier was trained with, and
//! back. Built once at startup from the training-time mapping document and
//! read-only afterwards.

mod document;
mod error;
mod index;

pub use document::WRAPPER_KEY;
pub use error::{ConfigError, LookupError};
pub use index::ClassIndex;
