//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Stores never retry internally; the caller decides whether to try again.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Payload or peer-set serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking storage task failed to complete.
    #[error("storage task failed: {0}")]
    Join(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
