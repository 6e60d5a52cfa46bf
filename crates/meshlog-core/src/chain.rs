//! Chain-level records: chunks, chain state, and import reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{CoreError, ValidationError};
use crate::gaps::{total_gap_blocks, GapRange};
use crate::types::{ChainId, Digest, PeerId};

/// A fixed-size window of sequence numbers with a Merkle root over the
/// blocks actually held in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: u64,
    pub chain_id: ChainId,
    /// `chunk_id * chunk_size`.
    pub start_block: u64,
    /// Highest sequence number present, which may be below the chunk boundary.
    pub end_block: u64,
    pub block_count: u64,
    /// Root over the held block hashes in ascending sequence order.
    pub merkle_root: Digest,
    pub last_updated: i64,
    /// Peers known to hold a full copy of this chunk.
    #[serde(default)]
    pub replicated_on: BTreeSet<PeerId>,
}

impl Chunk {
    /// Check if every slot of the chunk is filled.
    pub fn is_complete(&self, chunk_size: u64) -> bool {
        self.block_count == chunk_size
    }

    /// Theoretical last sequence number of the chunk.
    pub fn boundary(&self, chunk_size: u64) -> u64 {
        self.start_block + chunk_size.saturating_sub(1)
    }
}

/// Per-chain summary record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: ChainId,
    /// Highest sequence number held (None for an empty chain).
    pub latest_block: Option<u64>,
    pub latest_hash: Option<Digest>,
    /// Hash of block 0, set once.
    pub genesis_hash: Option<Digest>,
    pub total_chunks: u64,
    /// Ordered by `start`.
    pub gaps: Vec<GapRange>,
    pub peer_count: u32,
    pub last_sync: Option<i64>,
}

impl ChainState {
    /// Fresh state for an empty chain with only the local peer.
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            latest_block: None,
            latest_hash: None,
            genesis_hash: None,
            total_chunks: 0,
            gaps: Vec::new(),
            peer_count: 1,
            last_sync: None,
        }
    }

    /// `latest_block + 1`, or 0 for an empty chain.
    pub fn total_blocks(&self) -> u64 {
        self.latest_block.map_or(0, |seq| seq + 1)
    }

    /// Blocks missing across all recorded gaps.
    pub fn gap_blocks(&self) -> u64 {
        total_gap_blocks(&self.gaps)
    }

    pub fn is_empty(&self) -> bool {
        self.latest_block.is_none()
    }

    /// Sequence number the next local append will use.
    pub fn next_sequence(&self) -> u64 {
        self.total_blocks()
    }
}

/// Why one block of an import batch was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportErrorKind {
    /// The claimed hash does not match the recomputed content hash.
    HashMismatch { computed: Digest },
    /// The signature does not verify with the chain key.
    InvalidSignature,
    /// A different block already holds this sequence number.
    SequenceConflict { existing: Digest },
    /// Genesis carries a previous hash, or a later block lacks one.
    MalformedLink,
}

impl TryFrom<ValidationError> for ImportErrorKind {
    type Error = CoreError;

    /// Encoding failures are not a property of the block and stay errors.
    fn try_from(err: ValidationError) -> Result<Self, CoreError> {
        match err {
            ValidationError::HashMismatch { computed, .. } => Ok(Self::HashMismatch { computed }),
            ValidationError::SignatureFailed => Ok(Self::InvalidSignature),
            ValidationError::GenesisWithPrevious
            | ValidationError::MissingPrevious(_)
            | ValidationError::BrokenLink { .. } => Ok(Self::MalformedLink),
            ValidationError::Core(e) => Err(e),
        }
    }
}

/// A rejected block in an import batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    pub block_hash: Digest,
    pub sequence_number: u64,
    pub kind: ImportErrorKind,
}

/// Outcome of importing a batch of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Blocks newly persisted.
    pub imported_count: usize,
    /// Blocks already present (skipped silently).
    pub skipped_count: usize,
    pub errors: Vec<ImportError>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ImportReport) {
        self.imported_count += other.imported_count;
        self.skipped_count += other.skipped_count;
        self.errors.extend(other.errors);
    }
}
