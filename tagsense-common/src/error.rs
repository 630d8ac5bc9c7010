//! Common error types for TagSense

use thiserror::Error;

/// Common result type for TagSense operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across TagSense services
///
/// Store driver errors never cross a component boundary raw; they are
/// folded into this taxonomy at the query layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Shared store unreachable or rejecting operations (transient,
    /// retry with backoff at the caller)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Requested person/tag/location/command not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter (rejected before any write)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::NotFound("no matching row".to_string()),
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}
