//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use meshlog::{ChainConfig, ChainManager};
use meshlog_core::{Block, BlockBuilder, ChainId, PeerId, SigningKey};
use meshlog_store::MemoryStore;

/// A chain manager over a fresh in-memory store.
pub type MemoryManager = ChainManager<String, MemoryStore<String>>;

/// A chain identity shared by every peer of a test scenario.
pub struct TestFixture {
    pub key: SigningKey,
    pub chain_id: ChainId,
    pub config: ChainConfig,
}

impl TestFixture {
    /// Create a new test fixture with a random key.
    pub fn new() -> Self {
        Self {
            key: SigningKey::generate(),
            chain_id: ChainId::from("test-chain"),
            config: ChainConfig::default(),
        }
    }

    /// Create with a deterministic key.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
            ..Self::new()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Payload used for block `seq` by the chain builders.
    pub fn payload(seq: u64) -> String {
        format!("message {}", seq)
    }

    /// Build one signed block. `created_at` is the sequence number.
    pub fn block(
        &self,
        seq: u64,
        payload: String,
        previous: Option<&Block<String>>,
    ) -> Block<String> {
        let mut builder = BlockBuilder::new(seq, payload)
            .created_at(seq as i64)
            .chunk_size(self.config.chunk_size);
        if let Some(prev) = previous {
            builder = builder.previous(prev.block_hash);
        }
        builder
            .sign(&self.key)
            .expect("string payloads always encode")
    }

    /// Blocks `0..n`, each linked to the one before.
    pub fn chain_of(&self, n: u64) -> Vec<Block<String>> {
        let mut blocks: Vec<Block<String>> = Vec::with_capacity(n as usize);
        for seq in 0..n {
            let block = self.block(seq, Self::payload(seq), blocks.last());
            blocks.push(block);
        }
        blocks
    }

    /// The blocks at `seqs` taken from one linked chain.
    pub fn sparse(&self, seqs: &[u64]) -> Vec<Block<String>> {
        let Some(&max) = seqs.iter().max() else {
            return Vec::new();
        };
        let chain = self.chain_of(max + 1);
        seqs.iter().map(|&seq| chain[seq as usize].clone()).collect()
    }

    /// A manager for `peer` over its own empty store. Not yet initialized.
    pub fn manager(&self, peer: &str) -> MemoryManager {
        ChainManager::new(
            self.chain_id.clone(),
            self.key.clone(),
            PeerId::new(peer),
            self.config.clone(),
            Arc::new(MemoryStore::new()),
        )
    }

    /// An initialized manager holding `blocks`.
    pub async fn seeded_manager(
        &self,
        peer: &str,
        blocks: Vec<Block<String>>,
    ) -> meshlog::Result<Arc<MemoryManager>> {
        let manager = Arc::new(self.manager(peer));
        manager.initialize().await?;
        if !blocks.is_empty() {
            manager.import(blocks).await?;
        }
        Ok(manager)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
