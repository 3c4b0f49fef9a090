//! Error types for DSX

use thiserror::Error;

/// Result type alias for DSX common operations
pub type Result<T> = std::result::Result<T, DsxError>;

/// Errors raised by shared DSX code
#[derive(Error, Debug)]
pub enum DsxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
