// error.rs - Error types for the constraint language.

use thiserror::Error;

/// Errors that can occur while parsing constraint source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CclError {
    /// The source text is not valid CCL.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// The source parsed but contained no statements.
    #[error("constraint source contains no statements")]
    Empty,
}
