//! Error types for Meshlog Core.

use thiserror::Error;

use crate::types::Digest;

/// Core errors that can occur while encoding or hashing blocks.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Validation errors for a single block.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("block hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: Digest, computed: Digest },

    #[error("signature verification failed")]
    SignatureFailed,

    #[error("genesis block must not carry a previous hash")]
    GenesisWithPrevious,

    #[error("block at seq {0} is missing its previous hash")]
    MissingPrevious(u64),

    #[error("block at seq {seq} does not link to its predecessor")]
    BrokenLink { seq: u64 },

    #[error(transparent)]
    Core(#[from] CoreError),
}
