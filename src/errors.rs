//! Stable machine-readable error envelope for the tool surface.
//!
//! Every failure that crosses the tool boundary is reported as a structured
//! envelope with one of five stable codes. Codes are part of the wire
//! contract and must not be renamed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Caller violated an argument contract (unknown direction, bad depth,
    /// out-of-range pagination).
    InvalidInput,
    /// Target path or symbol is absent from the graph.
    NotFound,
    /// An extractor could not produce any output for a file. Reported as a
    /// batch diagnostic, never surfaced to query callers.
    ParseFailed,
    /// Filesystem or store access failed.
    IoError,
    /// Invariant violation. Fatal for the current operation, not the process.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ParseFailed => "PARSE_FAILED",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{}", s)
    }
}

/// A query-layer failure carrying its stable code.
///
/// The query engine returns this instead of `anyhow::Error` so the tool
/// layer can build a well-formed envelope without string matching.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryError::InvalidInput(_) => ErrorCode::InvalidInput,
            QueryError::NotFound(_) => ErrorCode::NotFound,
            QueryError::Storage(_) => ErrorCode::Internal,
            QueryError::Io(_) => ErrorCode::IoError,
            QueryError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Wire-level error envelope: `{"code": "...", "message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&QueryError> for ErrorEnvelope {
    fn from(err: &QueryError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}
