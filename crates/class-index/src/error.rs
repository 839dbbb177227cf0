//! Class Index Error Types

use thiserror::Error;

/// Errors raised while loading a class mapping document
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Mapping file could not be read
    #[error("Failed to read class mapping {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Document is not a name -> index object
    #[error("Malformed class mapping: {0}")]
    Malformed(String),

    /// A class maps to something other than a non-negative integer
    #[error("Class '{name}' has an invalid index: expected a non-negative integer, found {found}")]
    InvalidIndex { name: String, found: &'static str },

    /// The same class name appears twice
    #[error("Duplicate class name '{0}'")]
    DuplicateName(String),

    /// Two class names share one index
    #[error("Index {index} is assigned to both '{first}' and '{second}'")]
    DuplicateIndex {
        index: usize,
        first: String,
        second: String,
    },

    /// Indices do not form the range [0, len)
    #[error("Index {index} of class '{name}' is outside the contiguous range [0, {len})")]
    NonContiguous {
        name: String,
        index: usize,
        len: usize,
    },

    /// Mapping holds no classes
    #[error("Class mapping is empty")]
    Empty,
}

/// Errors raised while resolving model output against the class mapping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Index outside [0, num_classes)
    #[error("Class index {index} is out of range for {len} classes")]
    OutOfRange { index: usize, len: usize },

    /// Model output width disagrees with the class count
    #[error("Model produced {actual} scores but the class mapping has {expected} classes")]
    WidthMismatch { expected: usize, actual: usize },
}
