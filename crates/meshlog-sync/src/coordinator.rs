//! Sync coordinator: the per-chain session state machine and message
//! builders.
//!
//! ```text
//! Idle --begin(peer)--> Syncing(peer) --complete()/fail()--> Idle
//! ```
//!
//! At most one session runs at a time. A second `begin` is rejected rather
//! than queued.

use meshlog_core::{merkle_root, Block, ChainId, Digest, Payload, PeerId};

use crate::error::{Result, SyncError};
use crate::messages::{SyncRequest, SyncResponse};

/// Where the coordinator is in its session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing { peer_id: PeerId, started_at: i64 },
}

/// Record of the most recent failed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub peer_id: PeerId,
    pub reason: String,
    pub at: i64,
}

#[derive(Debug)]
pub struct SyncCoordinator {
    state: SyncState,
    last_failure: Option<SyncFailure>,
    last_sync: Option<i64>,
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            last_failure: None,
            last_sync: None,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// True only when no session is running.
    pub fn can_sync(&self) -> bool {
        matches!(self.state, SyncState::Idle)
    }

    /// Enter the syncing state for `peer_id`.
    pub fn begin(&mut self, peer_id: PeerId, now: i64) -> Result<()> {
        if let SyncState::Syncing { peer_id: current, .. } = &self.state {
            return Err(SyncError::AlreadySyncing {
                peer: current.clone(),
            });
        }
        tracing::debug!(peer = %peer_id, "sync started");
        self.state = SyncState::Syncing {
            peer_id,
            started_at: now,
        };
        Ok(())
    }

    /// Finish the running session successfully.
    pub fn complete(&mut self, now: i64) {
        if !self.can_sync() {
            self.last_sync = Some(now);
        }
        self.state = SyncState::Idle;
    }

    /// Abort the running session, remembering why.
    pub fn fail(&mut self, reason: impl Into<String>, now: i64) {
        if let SyncState::Syncing { peer_id, .. } =
            std::mem::replace(&mut self.state, SyncState::Idle)
        {
            self.last_failure = Some(SyncFailure {
                peer_id,
                reason: reason.into(),
                at: now,
            });
        }
    }

    pub fn last_failure(&self) -> Option<&SyncFailure> {
        self.last_failure.as_ref()
    }

    /// When the last session completed successfully.
    pub fn last_sync(&self) -> Option<i64> {
        self.last_sync
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Message builders
    // ─────────────────────────────────────────────────────────────────────────

    pub fn build_request(
        chain_id: ChainId,
        from_peer_id: PeerId,
        last_known_sequence: Option<u64>,
        last_sync_time: Option<i64>,
    ) -> SyncRequest {
        SyncRequest {
            chain_id,
            from_peer_id,
            last_known_sequence,
            last_sync_time,
        }
    }

    /// Wrap a batch of blocks with its Merkle digest.
    ///
    /// `has_more` is set when the batch is exactly `batch_size` long.
    pub fn build_response<T: Payload>(
        chain_id: ChainId,
        from_peer_id: PeerId,
        blocks: Vec<Block<T>>,
        batch_size: usize,
    ) -> SyncResponse<T> {
        let hashes: Vec<Digest> = blocks.iter().map(|b| b.block_hash).collect();
        let has_more = batch_size > 0 && blocks.len() == batch_size;
        SyncResponse {
            chain_id,
            from_peer_id,
            batch_hash: merkle_root(&hashes),
            has_more,
            blocks,
        }
    }

    /// Check a response's digest against its blocks.
    ///
    /// Each block's hash is recomputed from its content, so a payload altered
    /// in transit fails even when its claimed `block_hash` was left intact.
    pub fn verify_response<T: Payload>(response: &SyncResponse<T>) -> Result<()> {
        let recomputed = response
            .blocks
            .iter()
            .map(Block::compute_hash)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let computed = merkle_root(&recomputed);

        if computed != response.batch_hash {
            return Err(SyncError::BatchDigestMismatch {
                expected: response.batch_hash,
                computed,
            });
        }
        Ok(())
    }
}
