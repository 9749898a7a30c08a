//! Parse error type

use thiserror::Error;

/// Errors produced while lexing or parsing a query.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Lexical error with byte position
    #[error("lexical error at byte {position}: {message}")]
    Lex {
        /// Byte offset into the input
        position: usize,
        /// What went wrong
        message: String,
    },

    /// Syntax error with byte position
    #[error("syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset into the input
        position: usize,
        /// What went wrong
        message: String,
    },
}

impl ParseError {
    /// Create a lexical error.
    pub fn lex(position: usize, message: impl Into<String>) -> Self {
        Self::Lex {
            position,
            message: message.into(),
        }
    }

    /// Create a syntax error.
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;
