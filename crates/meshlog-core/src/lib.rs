//! # Meshlog Core
//!
//! Pure primitives for Meshlog: blocks, chunks, chain state, and the
//! integrity functions every peer must agree on.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over hashed and signed data structures.
//!
//! ## Key Types
//!
//! - [`Block`] - An immutable, hash-linked, signed record
//! - [`Digest`] - SHA-256 content address
//! - [`Chunk`] - A fixed window of blocks with a Merkle root
//! - [`ChainState`] - Per-chain summary, including detected gaps
//!
//! ## Canonicalization
//!
//! Block hashes and signatures are computed over deterministic CBOR. See the
//! [`canonical`] module.

pub mod block;
pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod gaps;
pub mod integrity;
pub mod merkle;
pub mod types;
pub mod validation;

pub use block::{
    block_hash, chunk_id_for, sign_block, verify_block_signature, Block, BlockBuilder, Payload,
    DEFAULT_CHUNK_SIZE,
};
pub use canonical::{block_content_bytes, encode_canonical, signing_bytes};
pub use chain::{ChainState, Chunk, ImportError, ImportErrorKind, ImportReport};
pub use crypto::{hash, sign, verify, Signature, SigningKey};
pub use error::{CoreError, ValidationError};
pub use gaps::{detect_gaps, GapRange, GapReason};
pub use integrity::{integrity_score, IntegrityInfo, IntegrityScore, IntegrityStatus};
pub use merkle::{merkle_root, merkle_root_hex};
pub use types::{ChainId, Digest, PeerId};
pub use validation::{validate_block, validate_previous_link, verify_block_hash, verify_links};

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
