//! Common error types for Praise

use thiserror::Error;

/// Common result type for Praise operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Praise crates
///
/// The user-facing variants (`NotFound`, `Validation`, `Forbidden`,
/// `StateConflict`) carry the message shown to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Caller is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Operation conflicts with the current state (period status, duplicate chains, roles)
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::StateConflict(msg.into())
    }
}
