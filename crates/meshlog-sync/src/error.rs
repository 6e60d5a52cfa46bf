//! Error types for the sync module.

use thiserror::Error;

use meshlog_core::{ChainId, CoreError, Digest, PeerId};

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync session is already running; the new one is rejected, not queued.
    #[error("already syncing with {peer}")]
    AlreadySyncing { peer: PeerId },

    /// The batch digest does not cover the delivered blocks. The whole batch
    /// is discarded.
    #[error("batch digest mismatch: expected {expected:?}, computed {computed:?}")]
    BatchDigestMismatch {
        expected: Option<Digest>,
        computed: Option<Digest>,
    },

    /// Message addressed to a different chain.
    #[error("chain mismatch: expected {expected}, got {got}")]
    ChainMismatch { expected: ChainId, got: ChainId },

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The local chain failed to read or import blocks.
    #[error("local replica error: {0}")]
    Replica(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Hashing or encoding failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SyncError {
    /// Wrap an error from the local chain.
    pub fn replica(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Replica(Box::new(err))
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
