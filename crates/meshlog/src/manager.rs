//! The chain manager: owns one chain's append-only log.
//!
//! All mutations go through a per-instance write lock, so `append`, `import`,
//! and the bookkeeping calls never interleave their read-modify-write of the
//! chain state. Reads go straight to the store.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use meshlog_core::{
    chunk_id_for, detect_gaps, integrity_score, merkle_root, now_millis, validate_block, Block,
    BlockBuilder, ChainId, ChainState, Chunk, Digest, ImportError, ImportErrorKind, ImportReport,
    IntegrityInfo, Payload, PeerId, SigningKey,
};
use meshlog_store::BlockStore;
use meshlog_sync::{LocalChain, SharedCoordinator, SyncConfig, SyncSession, Transport};

use crate::config::ChainConfig;
use crate::error::{ChainError, Result};

/// Manager for one chain over an injected store.
pub struct ChainManager<T, S> {
    chain_id: ChainId,
    key: SigningKey,
    local_peer: PeerId,
    config: ChainConfig,
    store: Arc<S>,
    initialized: AtomicBool,
    write_lock: Mutex<()>,
    sync_coordinator: SharedCoordinator,
    _payload: PhantomData<fn() -> T>,
}

impl<T, S> ChainManager<T, S>
where
    T: Payload,
    S: BlockStore<T>,
{
    /// Create a manager. Call [`initialize`](Self::initialize) before writing.
    pub fn new(
        chain_id: ChainId,
        key: SigningKey,
        local_peer: PeerId,
        config: ChainConfig,
        store: Arc<S>,
    ) -> Self {
        Self {
            chain_id,
            key,
            local_peer,
            config,
            store,
            initialized: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            sync_coordinator: SharedCoordinator::default(),
            _payload: PhantomData,
        }
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// A sync session driving this chain over `transport`.
    ///
    /// Every session of one manager shares its coordinator, so at most one
    /// of them syncs at a time.
    pub fn sync_session<X: Transport<T>>(
        self: &Arc<Self>,
        transport: X,
        config: SyncConfig,
    ) -> SyncSession<T, Self, X> {
        SyncSession::with_coordinator(
            Arc::clone(self),
            transport,
            config,
            Arc::clone(&self.sync_coordinator),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the store and create the chain state if absent. Idempotent.
    pub async fn initialize(&self) -> Result<ChainState> {
        let _guard = self.write_lock.lock().await;

        self.store.open().await?;
        let state = match self.store.get_chain_state(&self.chain_id).await? {
            Some(state) => state,
            None => {
                let state = ChainState::new(self.chain_id.clone());
                self.store.put_chain_state(&state).await?;
                tracing::debug!(chain_id = %self.chain_id, "created chain state");
                state
            }
        };

        self.initialized.store(true, Ordering::Release);
        Ok(state)
    }

    /// Delete every persisted record of this chain and mark it uninitialized.
    pub async fn destroy(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.store.delete_chain(&self.chain_id).await?;
        self.initialized.store(false, Ordering::Release);
        tracing::debug!(chain_id = %self.chain_id, "destroyed chain");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a payload as the next block of the chain.
    pub async fn append(&self, payload: T) -> Result<Block<T>> {
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized()?;

        let mut state = self.load_state().await?;
        let seq = state.next_sequence();

        let mut builder = BlockBuilder::new(seq, payload)
            .created_at(now_millis())
            .chunk_size(self.chunk_size());
        if let Some(previous) = state.latest_hash {
            builder = builder.previous(previous);
        }
        let block = builder.sign(&self.key)?;

        self.store.put_block(&self.chain_id, &block).await?;

        state.latest_block = Some(seq);
        state.latest_hash = Some(block.block_hash);
        if seq == 0 && state.genesis_hash.is_none() {
            state.genesis_hash = Some(block.block_hash);
        }
        self.refresh_chunk(&mut state, block.chunk_id).await?;
        self.store.put_chain_state(&state).await?;

        tracing::debug!(
            chain_id = %self.chain_id,
            seq,
            hash = %block.block_hash.short(),
            "appended block"
        );
        Ok(block)
    }

    /// Merge foreign blocks into the chain.
    ///
    /// Blocks are taken in input order. Already-held hashes are skipped;
    /// blocks that fail verification are reported per block and the rest of
    /// the batch proceeds. Sequence numbers need not be contiguous; holes are
    /// recorded as gaps. Importing the same batch twice changes nothing.
    pub async fn import(&self, blocks: Vec<Block<T>>) -> Result<ImportReport> {
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized()?;

        let mut state = self.load_state().await?;
        let mut report = ImportReport::default();
        let mut touched_chunks = BTreeSet::new();

        for mut block in blocks {
            if self.store.has_block(&self.chain_id, &block.block_hash).await? {
                report.skipped_count += 1;
                continue;
            }

            if let Some(kind) = self.check_import(&block).await? {
                tracing::warn!(
                    chain_id = %self.chain_id,
                    seq = block.sequence_number,
                    hash = %block.block_hash.short(),
                    reason = ?kind,
                    "rejected block"
                );
                report.errors.push(ImportError {
                    block_hash: block.block_hash,
                    sequence_number: block.sequence_number,
                    kind,
                });
                continue;
            }

            block.chunk_id = chunk_id_for(block.sequence_number, self.chunk_size());
            self.store.put_block(&self.chain_id, &block).await?;
            touched_chunks.insert(block.chunk_id);
            report.imported_count += 1;
        }

        if report.imported_count > 0 {
            if let Some(latest) = self.store.get_latest_block(&self.chain_id).await? {
                state.latest_block = Some(latest.sequence_number);
                state.latest_hash = Some(latest.block_hash);
            }
            if state.genesis_hash.is_none() {
                if let Some(genesis) = self.store.get_block_by_sequence(&self.chain_id, 0).await? {
                    state.genesis_hash = Some(genesis.block_hash);
                }
            }
            for chunk_id in touched_chunks {
                self.refresh_chunk(&mut state, chunk_id).await?;
            }
        }

        let held = self.store.sequence_numbers(&self.chain_id).await?;
        self.recompute_gaps(&mut state, &held);
        self.store.put_chain_state(&state).await?;

        tracing::debug!(
            chain_id = %self.chain_id,
            imported = report.imported_count,
            skipped = report.skipped_count,
            rejected = report.errors.len(),
            gaps = state.gaps.len(),
            "imported blocks"
        );
        Ok(report)
    }

    /// Why a not-yet-held block cannot be imported, if it cannot.
    async fn check_import(&self, block: &Block<T>) -> Result<Option<ImportErrorKind>> {
        let key = self.config.verify_signatures.then_some(&self.key);
        if let Err(err) = validate_block(block, key) {
            return Ok(Some(ImportErrorKind::try_from(err)?));
        }

        if let Some(existing) = self
            .store
            .get_block_by_sequence(&self.chain_id, block.sequence_number)
            .await?
        {
            return Ok(Some(ImportErrorKind::SequenceConflict {
                existing: existing.block_hash,
            }));
        }

        Ok(None)
    }

    /// Record that `peer_id` has acknowledged a block.
    ///
    /// Returns false for an unknown block or a peer already recorded.
    pub async fn confirm(&self, block_hash: &Digest, peer_id: PeerId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized()?;

        let Some(mut block) = self.store.get_block(&self.chain_id, block_hash).await? else {
            return Ok(false);
        };
        if !block.confirm(peer_id) {
            return Ok(false);
        }
        self.store.put_block(&self.chain_id, &block).await?;
        Ok(true)
    }

    /// Record that `peer_id` holds a full copy of a chunk.
    ///
    /// Returns false for an unknown chunk or a peer already recorded.
    pub async fn mark_chunk_replicated(&self, chunk_id: u64, peer_id: PeerId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized()?;

        let Some(mut chunk) = self.store.get_chunk(&self.chain_id, chunk_id).await? else {
            return Ok(false);
        };
        if !chunk.replicated_on.insert(peer_id) {
            return Ok(false);
        }
        self.store.put_chunk(&chunk).await?;
        Ok(true)
    }

    /// Store the number of peers currently holding this chain.
    pub async fn set_peer_count(&self, peer_count: u32) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized()?;

        let mut state = self.load_state().await?;
        state.peer_count = peer_count;
        self.store.put_chain_state(&state).await?;
        Ok(())
    }

    /// Store the time of the last completed sync (Unix ms).
    pub async fn record_sync(&self, at: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized()?;

        let mut state = self.load_state().await?;
        state.last_sync = Some(at);
        self.store.put_chain_state(&state).await?;
        Ok(())
    }

    /// Rebuild one chunk's record from the blocks held in its range.
    ///
    /// Returns `None` when no block of the chunk is held.
    pub async fn update_chunk(&self, chunk_id: u64) -> Result<Option<Chunk>> {
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized()?;

        let mut state = self.load_state().await?;
        let chunk = self.refresh_chunk(&mut state, chunk_id).await?;
        if chunk.is_some() {
            self.store.put_chain_state(&state).await?;
        }
        Ok(chunk)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Blocks after `after` (from genesis if None), ascending.
    pub async fn get_blocks_after(
        &self,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Block<T>>> {
        Ok(self.store.get_blocks(&self.chain_id, after, limit).await?)
    }

    pub async fn get_all_blocks(&self) -> Result<Vec<Block<T>>> {
        self.get_blocks_after(None, None).await
    }

    pub async fn get_latest_block(&self) -> Result<Option<Block<T>>> {
        Ok(self.store.get_latest_block(&self.chain_id).await?)
    }

    pub async fn get_block(&self, block_hash: &Digest) -> Result<Option<Block<T>>> {
        Ok(self.store.get_block(&self.chain_id, block_hash).await?)
    }

    pub async fn chain_state(&self) -> Result<ChainState> {
        self.load_state().await
    }

    /// Chunk records, ordered by chunk id.
    pub async fn chunks(&self) -> Result<Vec<Chunk>> {
        Ok(self.store.list_chunks(&self.chain_id).await?)
    }

    /// Chain state, chunks, and score against `total_peers`.
    pub async fn integrity_info(&self, total_peers: u32) -> Result<IntegrityInfo> {
        let state = self.load_state().await?;
        let chunks = self.chunks().await?;
        let score = integrity_score(&state, total_peers);
        Ok(IntegrityInfo {
            state,
            chunks,
            score,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn chunk_size(&self) -> u64 {
        self.config.chunk_size.max(1)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ChainError::NotInitialized(self.chain_id.clone()))
        }
    }

    async fn load_state(&self) -> Result<ChainState> {
        self.store
            .get_chain_state(&self.chain_id)
            .await?
            .ok_or_else(|| ChainError::ChainStateMissing(self.chain_id.clone()))
    }

    /// Recompute and persist one chunk, then refresh `total_chunks` in `state`.
    ///
    /// The Merkle root covers only blocks currently held in the range.
    async fn refresh_chunk(&self, state: &mut ChainState, chunk_id: u64) -> Result<Option<Chunk>> {
        let size = self.chunk_size();
        let start = chunk_id.saturating_mul(size);
        let end = start.saturating_add(size - 1);

        let blocks = self
            .store
            .get_blocks_range(&self.chain_id, start, end)
            .await?;
        let hashes: Vec<Digest> = blocks.iter().map(|b| b.block_hash).collect();
        let (Some(last), Some(root)) = (blocks.last(), merkle_root(&hashes)) else {
            return Ok(None);
        };

        let replicated_on = self
            .store
            .get_chunk(&self.chain_id, chunk_id)
            .await?
            .map(|c| c.replicated_on)
            .unwrap_or_default();

        let chunk = Chunk {
            chunk_id,
            chain_id: self.chain_id.clone(),
            start_block: start,
            end_block: last.sequence_number,
            block_count: blocks.len() as u64,
            merkle_root: root,
            last_updated: now_millis(),
            replicated_on,
        };
        self.store.put_chunk(&chunk).await?;
        state.total_chunks = self.store.count_chunks(&self.chain_id).await?;

        Ok(Some(chunk))
    }

    /// Replace `state.gaps` with the holes below `latest_block`.
    ///
    /// A gap that was already recorded keeps its original detection time.
    fn recompute_gaps(&self, state: &mut ChainState, held: &[u64]) {
        let mut gaps = match state.latest_block {
            Some(end) => detect_gaps(held, end, self.chunk_size(), now_millis()),
            None => Vec::new(),
        };
        for gap in &mut gaps {
            if let Some(known) = state
                .gaps
                .iter()
                .find(|g| g.start == gap.start && g.end == gap.end)
            {
                gap.detected_at = known.detected_at;
            }
        }
        state.gaps = gaps;
    }
}

#[async_trait]
impl<T, S> LocalChain<T> for ChainManager<T, S>
where
    T: Payload,
    S: BlockStore<T>,
{
    type Error = ChainError;

    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    fn local_peer_id(&self) -> &PeerId {
        &self.local_peer
    }

    async fn latest_sequence(&self) -> Result<Option<u64>> {
        Ok(self.load_state().await?.latest_block)
    }

    async fn blocks_after(&self, after: Option<u64>, limit: usize) -> Result<Vec<Block<T>>> {
        self.get_blocks_after(after, Some(limit)).await
    }

    async fn import_blocks(&self, blocks: Vec<Block<T>>) -> Result<ImportReport> {
        self.import(blocks).await
    }

    async fn record_sync(&self, at: i64) -> Result<()> {
        ChainManager::record_sync(self, at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlog_core::{GapReason, IntegrityStatus};
    use meshlog_store::{MemoryStore, SqliteStore};

    type Manager = ChainManager<String, MemoryStore<String>>;

    fn key() -> SigningKey {
        SigningKey::from_passphrase("room secret")
    }

    fn manager_with(config: ChainConfig) -> Manager {
        ChainManager::new(
            ChainId::from("room"),
            key(),
            PeerId::new("local"),
            config,
            Arc::new(MemoryStore::new()),
        )
    }

    fn manager() -> Manager {
        manager_with(ChainConfig::default())
    }

    /// Blocks 0..n of a chain signed with `key()`, independent of any store.
    fn foreign_blocks(n: u64, chunk_size: u64) -> Vec<Block<String>> {
        let mut out: Vec<Block<String>> = Vec::new();
        for seq in 0..n {
            let mut b = BlockBuilder::new(seq, format!("remote {}", seq))
                .created_at(5_000 + seq as i64)
                .chunk_size(chunk_size);
            if let Some(prev) = out.last() {
                b = b.previous(prev.block_hash);
            }
            out.push(b.sign(&key()).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_requires_initialize() {
        let m = manager();
        assert!(matches!(
            m.append("hi".into()).await,
            Err(ChainError::NotInitialized(_))
        ));
        assert!(matches!(m.import(vec![]).await, Err(ChainError::NotInitialized(_))));
        assert!(m.get_all_blocks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_idempotent() {
        let m = manager();
        let first = m.initialize().await.unwrap();
        assert_eq!(first.latest_block, None);
        assert_eq!(first.peer_count, 1);

        m.append("a".into()).await.unwrap();
        let again = m.initialize().await.unwrap();
        assert_eq!(again.latest_block, Some(0));
    }

    #[tokio::test]
    async fn test_append_links_blocks() {
        let m = manager();
        m.initialize().await.unwrap();

        let b0 = m.append("first".into()).await.unwrap();
        let b1 = m.append("second".into()).await.unwrap();

        assert!(b0.is_genesis());
        assert_eq!(b0.previous_hash, None);
        assert_eq!(b1.sequence_number, 1);
        assert_eq!(b1.previous_hash, Some(b0.block_hash));
        assert!(b1.verify_hash().unwrap());
        assert!(b1.verify_signature(&key()).unwrap());

        let state = m.chain_state().await.unwrap();
        assert_eq!(state.latest_block, Some(1));
        assert_eq!(state.latest_hash, Some(b1.block_hash));
        assert_eq!(state.genesis_hash, Some(b0.block_hash));
        assert_eq!(state.total_chunks, 1);
    }

    #[tokio::test]
    async fn test_append_crosses_chunk_boundary() {
        let m = manager_with(ChainConfig {
            chunk_size: 2,
            ..ChainConfig::default()
        });
        m.initialize().await.unwrap();
        for i in 0..5 {
            m.append(format!("m{}", i)).await.unwrap();
        }

        let chunks = m.chunks().await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].start_block, 4);
        assert_eq!(chunks[2].end_block, 4);
        assert_eq!(chunks[2].block_count, 1);
        assert!(chunks[0].is_complete(2));
        assert_eq!(m.chain_state().await.unwrap().total_chunks, 3);
    }

    #[tokio::test]
    async fn test_state_missing() {
        let m = manager();
        m.initialize().await.unwrap();
        meshlog_store::Store::delete_chain(m.store().as_ref(), &ChainId::from("room"))
            .await
            .unwrap();

        assert!(matches!(
            m.append("x".into()).await,
            Err(ChainError::ChainStateMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_import_hash_mismatch_continues() {
        let m = manager();
        m.initialize().await.unwrap();

        let mut blocks = foreign_blocks(3, 100);
        blocks[1].payload = "tampered".into();

        let report = m.import(blocks.clone()).await.unwrap();
        assert_eq!(report.imported_count, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].sequence_number, 1);
        assert!(matches!(
            report.errors[0].kind,
            ImportErrorKind::HashMismatch { .. }
        ));

        let state = m.chain_state().await.unwrap();
        assert_eq!(state.latest_block, Some(2));
        assert_eq!(state.gaps.len(), 1);
        assert_eq!((state.gaps[0].start, state.gaps[0].end), (1, 1));
    }

    #[tokio::test]
    async fn test_import_idempotent() {
        let m = manager();
        m.initialize().await.unwrap();
        let blocks = foreign_blocks(4, 100);

        let first = m.import(blocks.clone()).await.unwrap();
        let state_after_first = m.chain_state().await.unwrap();
        let second = m.import(blocks).await.unwrap();

        assert_eq!(first.imported_count, 4);
        assert_eq!(second.imported_count, 0);
        assert_eq!(second.skipped_count, 4);
        assert!(second.errors.is_empty());
        assert_eq!(m.chain_state().await.unwrap(), state_after_first);
    }

    #[tokio::test]
    async fn test_import_reassigns_chunk_id() {
        let m = manager_with(ChainConfig {
            chunk_size: 10,
            ..ChainConfig::default()
        });
        m.initialize().await.unwrap();

        let report = m.import(foreign_blocks(12, 100)).await.unwrap();
        assert_eq!(report.imported_count, 12);

        let latest = m.get_latest_block().await.unwrap().unwrap();
        assert_eq!(latest.chunk_id, 1);
        assert_eq!(m.chunks().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_sequence_conflict() {
        let m = manager();
        m.initialize().await.unwrap();
        m.append("local genesis".into()).await.unwrap();

        let report = m.import(foreign_blocks(1, 100)).await.unwrap();
        assert_eq!(report.imported_count, 0);
        assert!(matches!(
            report.errors[0].kind,
            ImportErrorKind::SequenceConflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_links() {
        let m = manager();
        m.initialize().await.unwrap();

        let genesis_with_previous = BlockBuilder::new(0, "genesis".to_string())
            .previous(Digest::from_bytes([7; 32]))
            .sign(&key())
            .unwrap();
        let unlinked = BlockBuilder::new(3, "orphan".to_string())
            .sign(&key())
            .unwrap();

        let report = m
            .import(vec![genesis_with_previous, unlinked])
            .await
            .unwrap();
        assert_eq!(report.imported_count, 0);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].sequence_number, 0);
        assert_eq!(report.errors[0].kind, ImportErrorKind::MalformedLink);
        assert_eq!(report.errors[1].sequence_number, 3);
        assert_eq!(report.errors[1].kind, ImportErrorKind::MalformedLink);

        let state = m.chain_state().await.unwrap();
        assert_eq!(state.latest_block, None);
        assert_eq!(state.genesis_hash, None);
    }

    #[tokio::test]
    async fn test_import_verifies_signatures_when_enabled() {
        let m = manager_with(ChainConfig {
            verify_signatures: true,
            ..ChainConfig::default()
        });
        m.initialize().await.unwrap();

        let stranger = SigningKey::from_passphrase("someone else");
        let forged = BlockBuilder::new(0, "forged".to_string())
            .sign(&stranger)
            .unwrap();
        let report = m.import(vec![forged]).await.unwrap();
        assert_eq!(report.errors[0].kind, ImportErrorKind::InvalidSignature);

        let report = m.import(foreign_blocks(1, 100)).await.unwrap();
        assert_eq!(report.imported_count, 1);
    }

    #[tokio::test]
    async fn test_late_join_gap() {
        let m = manager();
        m.initialize().await.unwrap();

        let blocks = foreign_blocks(8, 100);
        m.import(blocks[5..].to_vec()).await.unwrap();

        let state = m.chain_state().await.unwrap();
        assert_eq!(state.latest_block, Some(7));
        assert_eq!(state.genesis_hash, None);
        assert_eq!(state.gaps.len(), 1);
        assert_eq!((state.gaps[0].start, state.gaps[0].end), (0, 4));
        assert!(state.gaps[0].has_reason(GapReason::LateJoin));

        m.import(blocks[..5].to_vec()).await.unwrap();
        let state = m.chain_state().await.unwrap();
        assert!(state.gaps.is_empty());
        assert_eq!(state.genesis_hash, Some(blocks[0].block_hash));
    }

    #[tokio::test]
    async fn test_confirm() {
        let m = manager();
        m.initialize().await.unwrap();
        let block = m.append("hello".into()).await.unwrap();

        assert!(m.confirm(&block.block_hash, PeerId::new("bob")).await.unwrap());
        assert!(!m.confirm(&block.block_hash, PeerId::new("bob")).await.unwrap());
        assert!(!m
            .confirm(&Digest::from_bytes([7; 32]), PeerId::new("bob"))
            .await
            .unwrap());

        let stored = m.get_block(&block.block_hash).await.unwrap().unwrap();
        assert_eq!(stored.confirmed_by.len(), 1);
        assert!(stored.confirmed_by.contains(&PeerId::new("bob")));
    }

    #[tokio::test]
    async fn test_mark_chunk_replicated() {
        let m = manager();
        m.initialize().await.unwrap();
        m.append("a".into()).await.unwrap();

        assert!(m.mark_chunk_replicated(0, PeerId::new("bob")).await.unwrap());
        assert!(!m.mark_chunk_replicated(0, PeerId::new("bob")).await.unwrap());
        assert!(!m.mark_chunk_replicated(9, PeerId::new("bob")).await.unwrap());

        // Survives a chunk recompute.
        m.append("b".into()).await.unwrap();
        let chunk = &m.chunks().await.unwrap()[0];
        assert_eq!(chunk.block_count, 2);
        assert!(chunk.replicated_on.contains(&PeerId::new("bob")));
    }

    #[tokio::test]
    async fn test_update_chunk_empty_is_noop() {
        let m = manager();
        m.initialize().await.unwrap();
        assert!(m.update_chunk(3).await.unwrap().is_none());
        assert!(m.chunks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_integrity_info() {
        let m = manager();
        m.initialize().await.unwrap();
        for i in 0..3 {
            m.append(format!("m{}", i)).await.unwrap();
        }
        m.set_peer_count(2).await.unwrap();

        let info = m.integrity_info(2).await.unwrap();
        assert_eq!(info.score.score, 100);
        assert_eq!(info.score.status, IntegrityStatus::Verified);
        assert_eq!(info.chunks.len(), 1);
        assert_eq!(info.state.peer_count, 2);

        let info = m.integrity_info(4).await.unwrap();
        assert_eq!(info.score.score, 80);
        assert_eq!(info.score.status, IntegrityStatus::Partial);
    }

    #[tokio::test]
    async fn test_record_sync() {
        let m = manager();
        m.initialize().await.unwrap();
        m.record_sync(1234).await.unwrap();
        assert_eq!(m.chain_state().await.unwrap().last_sync, Some(1234));
    }

    #[tokio::test]
    async fn test_destroy() {
        let m = manager();
        m.initialize().await.unwrap();
        m.append("a".into()).await.unwrap();

        m.destroy().await.unwrap();
        assert!(!m.is_initialized());
        assert!(m.get_all_blocks().await.unwrap().is_empty());
        assert!(matches!(
            m.chain_state().await,
            Err(ChainError::ChainStateMissing(_))
        ));
        assert!(matches!(
            m.append("b".into()).await,
            Err(ChainError::NotInitialized(_))
        ));

        let state = m.initialize().await.unwrap();
        assert_eq!(state.latest_block, None);
    }

    #[tokio::test]
    async fn test_over_sqlite() {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let m: ChainManager<String, SqliteStore> = ChainManager::new(
            ChainId::from("room"),
            key(),
            PeerId::new("local"),
            ChainConfig::default(),
            store,
        );
        m.initialize().await.unwrap();
        let b0 = m.append("one".into()).await.unwrap();
        let b1 = m.append("two".into()).await.unwrap();

        let all = m.get_all_blocks().await.unwrap();
        assert_eq!(all, vec![b0, b1.clone()]);
        assert_eq!(m.get_latest_block().await.unwrap(), Some(b1));
    }

    #[tokio::test]
    async fn test_concurrent_appends_serialized() {
        let m = Arc::new(manager());
        m.initialize().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let m = Arc::clone(&m);
                tokio::spawn(async move { m.append(format!("m{}", i)).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let blocks = m.get_all_blocks().await.unwrap();
        let seqs: Vec<u64> = blocks.iter().map(|b| b.sequence_number).collect();
        assert_eq!(seqs, (0..8).collect::<Vec<_>>());
        meshlog_core::verify_links(&blocks).unwrap();
    }
}
