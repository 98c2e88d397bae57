use std::io;

use thiserror::Error;

/// Errors surfaced by the matrix, engine and tree layers.
///
/// `Io` and `Format` are kept apart so callers can tell a missing or truncated file
/// from a file that was read but could not be understood.
#[derive(Debug, Error)]
pub enum NjError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("format error at line {line}: {message}")]
    Format { line: usize, message: String },
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("index {index} is out of bounds for a matrix of {n} elements")]
    OutOfBounds { index: usize, n: usize },
    #[error("inconsistent tree: {0}")]
    Structure(String),
}

impl NjError {
    pub fn format<S: Into<String>>(line: usize, message: S) -> Self {
        NjError::Format {
            line,
            message: message.into(),
        }
    }

    pub fn precondition<S: Into<String>>(message: S) -> Self {
        NjError::Precondition(message.into())
    }

    pub fn structure<S: Into<String>>(message: S) -> Self {
        NjError::Structure(message.into())
    }
}

pub type NjResult<T> = Result<T, NjError>;
