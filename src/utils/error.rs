//! Error types for the lesion diagnosis pipeline.
//!
//! Every pipeline stage has its own error kind so callers branch on the
//! failure instead of testing for sentinel values. Uses thiserror for
//! ergonomic error definitions.

use thiserror::Error;

/// Main error type for dermascan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Uploaded bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Image format is outside the supported allow-list
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Model checkpoint missing, corrupt, or incompatible (startup-fatal)
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// Forward pass failed at runtime
    #[error("Inference error: {0}")]
    Inference(String),

    /// Gradient capture or attribution computation failed
    #[error("Explanation error: {0}")]
    Explanation(String),

    /// Class index outside the valid range [0, K-1]
    #[error("Class index {0} out of range (valid: 0..={max})", max = crate::NUM_CLASSES - 1)]
    ClassIndex(usize),

    /// Startup configuration problem (e.g. incomplete class registry)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Convenience Result type for dermascan operations.
pub type Result<T> = std::result::Result<T, Error>;
