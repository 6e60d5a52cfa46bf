//! Error types for the chain manager.

use meshlog_core::{ChainId, CoreError};
use meshlog_store::StoreError;
use meshlog_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A mutating call arrived before `initialize()`.
    #[error("chain not initialized: {0}")]
    NotInitialized(ChainId),

    /// The chain state record is gone from an initialized chain.
    #[error("chain state missing: {0}")]
    ChainStateMissing(ChainId),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Hashing or encoding error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
