// src/error.rs
// Error types for the conversation store

use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum MinervaError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported MIME type: {0}")]
    UnsupportedMime(String),

    #[error("malformed image payload: {0}")]
    MalformedImage(String),

    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Result using MinervaError
pub type Result<T> = std::result::Result<T, MinervaError>;

impl From<base64::DecodeError> for MinervaError {
    fn from(err: base64::DecodeError) -> Self {
        MinervaError::MalformedImage(err.to_string())
    }
}
