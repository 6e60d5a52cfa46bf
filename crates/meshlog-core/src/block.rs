//! Block: the atomic unit of a chain.
//!
//! A block is an immutable, content-addressed, signed record linked to its
//! predecessor by hash. Only its set of confirming peers may grow after
//! creation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::canonical::{block_content_bytes, signing_bytes};
use crate::crypto::{self, Signature, SigningKey};
use crate::error::CoreError;
use crate::types::{Digest, PeerId};

/// Default number of blocks per chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 100;

/// Bounds for anything carried as a block payload.
///
/// Payloads are opaque to Meshlog; they only need to survive a round trip
/// through serde so every peer derives the same canonical bytes.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A single record in a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Payload")]
pub struct Block<T> {
    /// SHA-256 over the canonical (payload, previous_hash, sequence_number).
    pub block_hash: Digest,
    /// Hash of the previous block (None only at sequence 0).
    pub previous_hash: Option<Digest>,
    /// Position in the chain, starting at 0.
    pub sequence_number: u64,
    /// `sequence_number / chunk_size`.
    pub chunk_id: u64,
    /// Application data.
    pub payload: T,
    /// HMAC-SHA256 over the canonical (block_hash, payload, sequence_number).
    pub signature: Signature,
    /// Creation time (Unix milliseconds). Not covered by the hash.
    pub created_at: i64,
    /// Peers that have acknowledged this block.
    #[serde(default)]
    pub confirmed_by: BTreeSet<PeerId>,
}

impl<T: Payload> Block<T> {
    /// Recompute the content hash from the stored fields.
    pub fn compute_hash(&self) -> Result<Digest, CoreError> {
        block_hash(&self.payload, self.previous_hash.as_ref(), self.sequence_number)
    }

    /// Check the claimed hash against the recomputed one.
    pub fn verify_hash(&self) -> Result<bool, CoreError> {
        Ok(self.compute_hash()? == self.block_hash)
    }

    /// Check the signature with the chain's shared key.
    pub fn verify_signature(&self, key: &SigningKey) -> Result<bool, CoreError> {
        verify_block_signature(
            &self.block_hash,
            &self.payload,
            self.sequence_number,
            &self.signature,
            key,
        )
    }

    /// Check if this is the first block of the chain.
    pub fn is_genesis(&self) -> bool {
        self.sequence_number == 0
    }

    /// Record a confirming peer. Returns false if it was already present.
    pub fn confirm(&mut self, peer: PeerId) -> bool {
        self.confirmed_by.insert(peer)
    }
}

/// Chunk a sequence number falls into.
///
/// A chunk size of zero is treated as one so the division is always defined.
pub fn chunk_id_for(sequence_number: u64, chunk_size: u64) -> u64 {
    sequence_number / chunk_size.max(1)
}

/// Compute a block hash from its content fields.
pub fn block_hash<T: Serialize + ?Sized>(
    payload: &T,
    previous_hash: Option<&Digest>,
    sequence_number: u64,
) -> Result<Digest, CoreError> {
    let bytes = block_content_bytes(payload, previous_hash, sequence_number)?;
    Ok(crypto::hash(&bytes))
}

/// Sign a block's hash, payload, and sequence number.
pub fn sign_block<T: Serialize + ?Sized>(
    block_hash: &Digest,
    payload: &T,
    sequence_number: u64,
    key: &SigningKey,
) -> Result<Signature, CoreError> {
    let message = signing_bytes(block_hash, payload, sequence_number)?;
    Ok(crypto::sign(&message, key))
}

/// Verify a block signature.
pub fn verify_block_signature<T: Serialize + ?Sized>(
    block_hash: &Digest,
    payload: &T,
    sequence_number: u64,
    signature: &Signature,
    key: &SigningKey,
) -> Result<bool, CoreError> {
    let message = signing_bytes(block_hash, payload, sequence_number)?;
    Ok(crypto::verify(&message, signature, key))
}

/// Builder for creating blocks.
pub struct BlockBuilder<T> {
    sequence_number: u64,
    payload: T,
    previous_hash: Option<Digest>,
    created_at: i64,
    chunk_size: u64,
}

impl<T: Payload> BlockBuilder<T> {
    /// Start building the block at `sequence_number`.
    pub fn new(sequence_number: u64, payload: T) -> Self {
        Self {
            sequence_number,
            payload,
            previous_hash: None,
            created_at: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the previous block hash.
    pub fn previous(mut self, previous_hash: Digest) -> Self {
        self.previous_hash = Some(previous_hash);
        self
    }

    /// Set the creation timestamp.
    pub fn created_at(mut self, ts: i64) -> Self {
        self.created_at = ts;
        self
    }

    /// Set the chunk size used to derive `chunk_id`.
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Hash and sign the block.
    pub fn sign(self, key: &SigningKey) -> Result<Block<T>, CoreError> {
        let hash = block_hash(&self.payload, self.previous_hash.as_ref(), self.sequence_number)?;
        let signature = sign_block(&hash, &self.payload, self.sequence_number, key)?;

        Ok(Block {
            block_hash: hash,
            previous_hash: self.previous_hash,
            sequence_number: self.sequence_number,
            chunk_id: chunk_id_for(self.sequence_number, self.chunk_size),
            payload: self.payload,
            signature,
            created_at: self.created_at,
            confirmed_by: BTreeSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SigningKey {
        SigningKey::from_bytes([0x42; 32])
    }

    #[test]
    fn test_block_builder() {
        let block = BlockBuilder::new(0, "hello".to_string())
            .created_at(1736870400000)
            .sign(&key())
            .unwrap();

        assert!(block.is_genesis());
        assert_eq!(block.previous_hash, None);
        assert_eq!(block.chunk_id, 0);
        assert_eq!(block.created_at, 1736870400000);
        assert!(block.verify_hash().unwrap());
        assert!(block.verify_signature(&key()).unwrap());
    }

    #[test]
    fn test_chunk_id_derivation() {
        assert_eq!(chunk_id_for(0, 100), 0);
        assert_eq!(chunk_id_for(99, 100), 0);
        assert_eq!(chunk_id_for(100, 100), 1);
        assert_eq!(chunk_id_for(250, 100), 2);
        assert_eq!(chunk_id_for(7, 0), 7);

        let block = BlockBuilder::new(12, 1u32)
            .previous(Digest::from_bytes([1; 32]))
            .chunk_size(5)
            .sign(&key())
            .unwrap();
        assert_eq!(block.chunk_id, 2);
    }

    #[test]
    fn test_hash_ignores_created_at_and_confirmations() {
        let a = BlockBuilder::new(0, "x".to_string())
            .created_at(1)
            .sign(&key())
            .unwrap();
        let mut b = BlockBuilder::new(0, "x".to_string())
            .created_at(2)
            .sign(&key())
            .unwrap();
        b.confirm(PeerId::new("bob"));

        assert_eq!(a.block_hash, b.block_hash);
        assert!(b.verify_hash().unwrap());
    }

    #[test]
    fn test_tampered_payload_fails_hash() {
        let mut block = BlockBuilder::new(3, "original".to_string())
            .previous(Digest::from_bytes([9; 32]))
            .sign(&key())
            .unwrap();
        block.payload = "tampered".to_string();

        assert!(!block.verify_hash().unwrap());
        assert!(!block.verify_signature(&key()).unwrap());
    }

    #[test]
    fn test_wrong_key_fails_signature() {
        let block = BlockBuilder::new(0, 5u8).sign(&key()).unwrap();
        let other = SigningKey::from_passphrase("other");
        assert!(!block.verify_signature(&other).unwrap());
    }

    #[test]
    fn test_confirm_is_deduplicated() {
        let mut block = BlockBuilder::new(0, ()).sign(&key()).unwrap();
        assert!(block.confirm(PeerId::new("a")));
        assert!(!block.confirm(PeerId::new("a")));
        assert!(block.confirm(PeerId::new("b")));
        assert_eq!(block.confirmed_by.len(), 2);
    }

    #[test]
    fn test_previous_hash_changes_hash() {
        let a = block_hash(&"p", None, 1).unwrap();
        let b = block_hash(&"p", Some(&Digest::from_bytes([0; 32])), 1).unwrap();
        assert_ne!(a, b);
    }
}
