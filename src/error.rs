use std::io;
use thiserror::Error;

/// Error type returned by fallible helpers and the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("{0}")]
    InvalidHeader(String),
    #[error("cookie secret required for signed cookies")]
    MissingCookieSecret,
    #[error("invalid cookie secret: {0}")]
    InvalidCookieSecret(String),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Panic: {0}")]
    PanicError(String),
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::ParseError(_) => 400,
            ServerError::IoError(_)
            | ServerError::InvalidPattern { .. }
            | ServerError::InvalidHeader(_)
            | ServerError::MissingCookieSecret
            | ServerError::InvalidCookieSecret(_)
            | ServerError::Json(_)
            | ServerError::PanicError(_) => 500,
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Error value handed to `Next::fail`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
