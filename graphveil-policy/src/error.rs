//! Policy error types

use std::path::PathBuf;
use thiserror::Error;

/// Policy-related errors
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Policy file could not be read
    #[error("cannot read policy file {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Policy file is not valid JSON
    #[error("policy file is not valid JSON: {source}")]
    Json {
        /// Underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Policy file is not a JSON array
    #[error("policy file must be a JSON array of constraint objects")]
    NotAnArray,
}

/// Result type alias for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
