//! Graph error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading or reading the dataset.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Dataset file could not be read
    #[error("cannot read dataset file {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Turtle lexical or syntax error
    #[error("turtle error at byte {position}: {message}")]
    Turtle {
        /// Byte offset into the document
        position: usize,
        /// What went wrong
        message: String,
    },
}

impl GraphError {
    /// Create a Turtle error.
    pub fn turtle(position: usize, message: impl Into<String>) -> Self {
        Self::Turtle {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
