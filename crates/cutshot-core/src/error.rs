//! Error types for cutshot.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid observable: {0}")]
    InvalidObservable(String),

    #[error("Invalid bitstring: {0}")]
    InvalidBitstring(String),

    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    #[error("Backend {backend} not supported for provider {provider}")]
    UnsupportedBackend { provider: String, backend: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Execution retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Cutting error: {0}")]
    Cut(String),

    #[error("Mailbox error: {0}")]
    Mailbox(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
