//! CLI error type

use std::path::PathBuf;
use thiserror::Error;

/// Errors the adapter reports before exiting nonzero.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file given on the command line could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// No query was supplied
    #[error("either --query or --query-file is required")]
    MissingQuery,

    /// Dataset loading failed
    #[error(transparent)]
    Graph(#[from] graphveil_graph::GraphError),

    /// Policy loading failed
    #[error(transparent)]
    Policy(#[from] graphveil_policy::PolicyError),

    /// Query parsing failed
    #[error(transparent)]
    Parse(#[from] graphveil_sparql::ParseError),
}

/// Result type alias for the adapter.
pub type CliResult<T> = std::result::Result<T, CliError>;
