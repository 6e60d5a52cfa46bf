//! Store traits: the abstract interface for chain persistence.
//!
//! These traits let the chain manager stay storage-agnostic. The concrete
//! store is injected at construction; there is no global registry.

use async_trait::async_trait;
use meshlog_core::{Block, ChainId, ChainState, Chunk, Digest, Payload};

use crate::error::Result;

/// Payload-independent storage operations.
///
/// Every read must succeed before any data exists, returning empty or
/// absent values rather than errors.
#[async_trait]
pub trait Store: Send + Sync {
    /// Prepare the backing storage. Idempotent.
    async fn open(&self) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Chunk Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create or replace a chunk record.
    async fn put_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Get a chunk by id.
    async fn get_chunk(&self, chain_id: &ChainId, chunk_id: u64) -> Result<Option<Chunk>>;

    /// All chunks of a chain, ordered by chunk id.
    async fn list_chunks(&self, chain_id: &ChainId) -> Result<Vec<Chunk>>;

    /// Number of chunk records for a chain.
    async fn count_chunks(&self, chain_id: &ChainId) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Chain State Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_chain_state(&self, chain_id: &ChainId) -> Result<Option<ChainState>>;

    /// Create or replace the state record, including its gap list.
    async fn put_chain_state(&self, state: &ChainState) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete every block, chunk, and state record of a chain.
    async fn delete_chain(&self, chain_id: &ChainId) -> Result<()>;

    /// Delete everything in the store.
    async fn clear(&self) -> Result<()>;
}

/// Block storage for a particular payload type.
#[async_trait]
pub trait BlockStore<T: Payload>: Store {
    /// Create or replace a block, keyed by its hash.
    async fn put_block(&self, chain_id: &ChainId, block: &Block<T>) -> Result<()>;

    /// Point lookup by block hash.
    async fn get_block(&self, chain_id: &ChainId, hash: &Digest) -> Result<Option<Block<T>>>;

    async fn has_block(&self, chain_id: &ChainId, hash: &Digest) -> Result<bool>;

    /// Blocks with `seq > after` (all blocks if `after` is None), ascending,
    /// truncated to `limit` if given.
    async fn get_blocks(
        &self,
        chain_id: &ChainId,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Block<T>>>;

    /// Blocks with `start <= seq <= end`, ascending.
    async fn get_blocks_range(&self, chain_id: &ChainId, start: u64, end: u64)
        -> Result<Vec<Block<T>>>;

    /// The block with the highest sequence number.
    async fn get_latest_block(&self, chain_id: &ChainId) -> Result<Option<Block<T>>>;

    async fn get_block_by_sequence(&self, chain_id: &ChainId, seq: u64)
        -> Result<Option<Block<T>>>;

    /// Every held sequence number, ascending.
    async fn sequence_numbers(&self, chain_id: &ChainId) -> Result<Vec<u64>>;
}
