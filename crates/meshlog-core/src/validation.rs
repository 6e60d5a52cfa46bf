//! Block validation: hash recomputation, signature verification, and
//! structural checks.

use crate::block::{Block, Payload};
use crate::crypto::SigningKey;
use crate::error::ValidationError;

/// Validate a single block before it is accepted into a chain.
///
/// This performs:
/// - The genesis link rule
/// - Content hash recomputation
/// - Signature verification, when a key is given
///
/// The chunk id is not checked; the receiving chain assigns its own.
pub fn validate_block<T: Payload>(
    block: &Block<T>,
    key: Option<&SigningKey>,
) -> Result<(), ValidationError> {
    validate_previous_link(block)?;
    verify_block_hash(block)?;

    if let Some(key) = key {
        if !block.verify_signature(key)? {
            return Err(ValidationError::SignatureFailed);
        }
    }

    Ok(())
}

/// Genesis has no previous hash; every other block has one.
pub fn validate_previous_link<T: Payload>(block: &Block<T>) -> Result<(), ValidationError> {
    if block.is_genesis() && block.previous_hash.is_some() {
        return Err(ValidationError::GenesisWithPrevious);
    }
    if !block.is_genesis() && block.previous_hash.is_none() {
        return Err(ValidationError::MissingPrevious(block.sequence_number));
    }
    Ok(())
}

/// Recompute the content hash and compare it to the claimed one.
pub fn verify_block_hash<T: Payload>(block: &Block<T>) -> Result<(), ValidationError> {
    let computed = block.compute_hash()?;
    if computed != block.block_hash {
        return Err(ValidationError::HashMismatch {
            claimed: block.block_hash,
            computed,
        });
    }
    Ok(())
}

/// Check that consecutive blocks in an ascending run link by hash.
///
/// Pairs separated by a sequence gap are not compared.
pub fn verify_links<T: Payload>(blocks: &[Block<T>]) -> Result<(), ValidationError> {
    for pair in blocks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.sequence_number != prev.sequence_number + 1 {
            continue;
        }
        if next.previous_hash != Some(prev.block_hash) {
            return Err(ValidationError::BrokenLink {
                seq: next.sequence_number,
            });
        }
    }
    Ok(())
}
