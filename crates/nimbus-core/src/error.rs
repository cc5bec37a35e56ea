//! Error types for nimbus-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using nimbus-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in nimbus-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store error
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),
}
