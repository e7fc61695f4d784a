//! Error types for pweld

use thiserror::Error;

/// Main error type for pweld operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for pweld operations
pub type Result<T> = std::result::Result<T, Error>;
