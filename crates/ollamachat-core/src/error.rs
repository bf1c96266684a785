use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to an LLM backend.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("LLM backend unreachable: {0}")]
    Unreachable(String),

    #[error("LLM backend rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed response stream: {0}")]
    Protocol(String),

    #[error("Request timed out")]
    Timeout,

    #[error("LLM backend error: {0}")]
    Remote(String),

    #[error("Provider not supported: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Unreachable(e.to_string())
        }
    }
}

/// Failures of the session store. I/O variants carry the attempted operation and path.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid session id: {0}")]
    InvalidId(String),

    #[error("Unsupported storage kind: {0}")]
    Unsupported(String),
}

impl StorageError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Malformed user-supplied settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a number")]
    InvalidNumber { field: String },

    #[error("{field} must be {expected}")]
    OutOfRange { field: String, expected: String },

    #[error("{0} cannot be empty")]
    Empty(String),

    #[error("Invalid session id: {0}")]
    InvalidId(String),
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound(_)))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
