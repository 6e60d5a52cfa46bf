//! In-memory implementation of the store traits.
//!
//! This is the reference adapter used in tests. It has the same semantics as
//! SQLite but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use meshlog_core::{Block, ChainId, ChainState, Chunk, Digest, Payload};

use crate::error::{Result, StoreError};
use crate::traits::{BlockStore, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore<T> {
    inner: RwLock<HashMap<ChainId, ChainTables<T>>>,
}

/// Everything held for one chain.
struct ChainTables<T> {
    /// Blocks indexed by hash.
    blocks: HashMap<Digest, Block<T>>,

    /// Sequence index: (seq, hash), ascending.
    by_sequence: BTreeSet<(u64, Digest)>,

    chunks: BTreeMap<u64, Chunk>,

    state: Option<ChainState>,
}

impl<T> Default for ChainTables<T> {
    fn default() -> Self {
        Self {
            blocks: HashMap::new(),
            by_sequence: BTreeSet::new(),
            chunks: BTreeMap::new(),
            state: None,
        }
    }
}

impl<T> ChainTables<T> {
    fn blocks_in(&self, start: u64, end: u64) -> impl Iterator<Item = &Block<T>> + '_ {
        let lo = (start, Digest::from_bytes([0x00; 32]));
        let hi = (end, Digest::from_bytes([0xff; 32]));
        self.by_sequence
            .range(lo..=hi)
            .filter_map(|(_, hash)| self.blocks.get(hash))
    }
}

impl<T> MemoryStore<T> {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ChainId, ChainTables<T>>>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ChainId, ChainTables<T>>>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Payload> Store for MemoryStore<T> {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn put_chunk(&self, chunk: &Chunk) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .entry(chunk.chain_id.clone())
            .or_default()
            .chunks
            .insert(chunk.chunk_id, chunk.clone());
        Ok(())
    }

    async fn get_chunk(&self, chain_id: &ChainId, chunk_id: u64) -> Result<Option<Chunk>> {
        let inner = self.read()?;
        Ok(inner
            .get(chain_id)
            .and_then(|t| t.chunks.get(&chunk_id))
            .cloned())
    }

    async fn list_chunks(&self, chain_id: &ChainId) -> Result<Vec<Chunk>> {
        let inner = self.read()?;
        Ok(inner
            .get(chain_id)
            .map(|t| t.chunks.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count_chunks(&self, chain_id: &ChainId) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.get(chain_id).map_or(0, |t| t.chunks.len() as u64))
    }

    async fn get_chain_state(&self, chain_id: &ChainId) -> Result<Option<ChainState>> {
        let inner = self.read()?;
        Ok(inner.get(chain_id).and_then(|t| t.state.clone()))
    }

    async fn put_chain_state(&self, state: &ChainState) -> Result<()> {
        let mut inner = self.write()?;
        inner.entry(state.chain_id.clone()).or_default().state = Some(state.clone());
        Ok(())
    }

    async fn delete_chain(&self, chain_id: &ChainId) -> Result<()> {
        let mut inner = self.write()?;
        inner.remove(chain_id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.clear();
        Ok(())
    }
}

#[async_trait]
impl<T: Payload> BlockStore<T> for MemoryStore<T> {
    async fn put_block(&self, chain_id: &ChainId, block: &Block<T>) -> Result<()> {
        let mut inner = self.write()?;
        let tables = inner.entry(chain_id.clone()).or_default();

        if let Some(old) = tables.blocks.insert(block.block_hash, block.clone()) {
            tables
                .by_sequence
                .remove(&(old.sequence_number, old.block_hash));
        }
        tables
            .by_sequence
            .insert((block.sequence_number, block.block_hash));

        Ok(())
    }

    async fn get_block(&self, chain_id: &ChainId, hash: &Digest) -> Result<Option<Block<T>>> {
        let inner = self.read()?;
        Ok(inner
            .get(chain_id)
            .and_then(|t| t.blocks.get(hash))
            .cloned())
    }

    async fn has_block(&self, chain_id: &ChainId, hash: &Digest) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner
            .get(chain_id)
            .is_some_and(|t| t.blocks.contains_key(hash)))
    }

    async fn get_blocks(
        &self,
        chain_id: &ChainId,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Block<T>>> {
        let start = match after {
            None => 0,
            Some(seq) => match seq.checked_add(1) {
                Some(next) => next,
                None => return Ok(Vec::new()),
            },
        };

        let inner = self.read()?;
        let Some(tables) = inner.get(chain_id) else {
            return Ok(Vec::new());
        };

        Ok(tables
            .blocks_in(start, u64::MAX)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get_blocks_range(
        &self,
        chain_id: &ChainId,
        start: u64,
        end: u64,
    ) -> Result<Vec<Block<T>>> {
        if start > end {
            return Ok(Vec::new());
        }

        let inner = self.read()?;
        Ok(inner
            .get(chain_id)
            .map(|t| t.blocks_in(start, end).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_latest_block(&self, chain_id: &ChainId) -> Result<Option<Block<T>>> {
        let inner = self.read()?;
        Ok(inner.get(chain_id).and_then(|t| {
            t.by_sequence
                .iter()
                .next_back()
                .and_then(|(_, hash)| t.blocks.get(hash))
                .cloned()
        }))
    }

    async fn get_block_by_sequence(
        &self,
        chain_id: &ChainId,
        seq: u64,
    ) -> Result<Option<Block<T>>> {
        let inner = self.read()?;
        Ok(inner
            .get(chain_id)
            .and_then(|t| t.blocks_in(seq, seq).next().cloned()))
    }

    async fn sequence_numbers(&self, chain_id: &ChainId) -> Result<Vec<u64>> {
        let inner = self.read()?;
        Ok(inner
            .get(chain_id)
            .map(|t| {
                let mut seqs: Vec<u64> = t.by_sequence.iter().map(|(seq, _)| *seq).collect();
                seqs.dedup();
                seqs
            })
            .unwrap_or_default())
    }
}
