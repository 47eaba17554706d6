//! Error types for silt-core

use thiserror::Error;

/// Result type alias using silt-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in silt-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record or conflict not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness violation on insert
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Conflict lifecycle transition attempted from a non-PENDING state
    #[error("Illegal state transition: {0}")]
    IllegalTransition(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
