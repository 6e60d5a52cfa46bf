//! Sync protocol driver.
//!
//! A [`SyncSession`] pulls blocks from one peer in batches until the peer
//! reports nothing more, and answers the same requests from other peers.
//! Sessions built over one [`SharedCoordinator`] run at most one sync
//! between them.
//!
//! ```text
//! Requester                               Responder
//!   |-- Request(last_known = L) ------------>|
//!   |<-- Response(blocks > L, digest, more) -|
//!   |   verify digest, import                |
//!   |-- Request(last_known = L') ----------->|   (while has_more)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use meshlog_core::{now_millis, Block, ChainId, ImportError, ImportReport, Payload, PeerId};

use crate::coordinator::{SyncCoordinator, SyncFailure, SyncState};
use crate::error::{Result, SyncError};
use crate::messages::{limits, SyncMessage, SyncRequest, SyncResponse, DEFAULT_BATCH_SIZE};
use crate::transport::Transport;

/// The chain-side operations the protocol needs from a local replica.
#[async_trait]
pub trait LocalChain<T: Payload>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn chain_id(&self) -> &ChainId;

    fn local_peer_id(&self) -> &PeerId;

    /// Highest sequence number held locally.
    async fn latest_sequence(&self) -> std::result::Result<Option<u64>, Self::Error>;

    /// Up to `limit` blocks with sequence number above `after`, ascending.
    async fn blocks_after(
        &self,
        after: Option<u64>,
        limit: usize,
    ) -> std::result::Result<Vec<Block<T>>, Self::Error>;

    async fn import_blocks(
        &self,
        blocks: Vec<Block<T>>,
    ) -> std::result::Result<ImportReport, Self::Error>;

    /// Note a completed sync (Unix ms).
    async fn record_sync(&self, at: i64) -> std::result::Result<(), Self::Error>;
}

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Blocks per response when serving requests.
    pub batch_size: usize,
    /// Timeout for waiting for a peer's response.
    pub message_timeout: Duration,
    /// Upper bound on request/response rounds in one session.
    pub max_rounds: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            message_timeout: Duration::from_secs(30),
            max_rounds: 1000,
        }
    }
}

/// Result of a sync session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub rounds: usize,
    /// Blocks delivered in verified batches.
    pub blocks_received: usize,
    /// Blocks that were new to the local chain.
    pub blocks_imported: usize,
    /// Per-block rejections reported by the local chain.
    pub errors: Vec<ImportError>,
}

/// One coordinator shared by every session of a local chain.
pub type SharedCoordinator = Arc<Mutex<SyncCoordinator>>;

/// Drives sync for one local chain over one transport.
pub struct SyncSession<T, C, X> {
    chain: Arc<C>,
    transport: X,
    config: SyncConfig,
    coordinator: SharedCoordinator,
    /// Peer whose response `sync_with` is waiting for.
    awaiting: Mutex<Option<PeerId>>,
    /// Responses received by `serve_next` on behalf of `sync_with`.
    routed_tx: mpsc::UnboundedSender<SyncResponse<T>>,
    routed_rx: Mutex<mpsc::UnboundedReceiver<SyncResponse<T>>>,
}

impl<T, C, X> SyncSession<T, C, X>
where
    T: Payload,
    C: LocalChain<T>,
    X: Transport<T>,
{
    /// A session with a coordinator of its own.
    pub fn new(chain: Arc<C>, transport: X, config: SyncConfig) -> Self {
        Self::with_coordinator(chain, transport, config, SharedCoordinator::default())
    }

    /// A session that shares `coordinator` with other sessions of the chain.
    pub fn with_coordinator(
        chain: Arc<C>,
        transport: X,
        config: SyncConfig,
        coordinator: SharedCoordinator,
    ) -> Self {
        let (routed_tx, routed_rx) = mpsc::unbounded_channel();
        Self {
            chain,
            transport,
            config,
            coordinator,
            awaiting: Mutex::new(None),
            routed_tx,
            routed_rx: Mutex::new(routed_rx),
        }
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        &self.coordinator
    }

    pub async fn state(&self) -> SyncState {
        self.coordinator.lock().await.state().clone()
    }

    pub async fn last_failure(&self) -> Option<SyncFailure> {
        self.coordinator.lock().await.last_failure().cloned()
    }

    /// Pull everything `peer` has beyond our latest block.
    ///
    /// Rejected with [`SyncError::AlreadySyncing`] while any session sharing
    /// this coordinator runs. Whatever the outcome, the coordinator is idle
    /// again on return.
    pub async fn sync_with(&self, peer: &PeerId) -> Result<SyncReport> {
        let last_sync = {
            let mut coord = self.coordinator.lock().await;
            coord.begin(peer.clone(), now_millis())?;
            coord.last_sync()
        };

        {
            let mut routed = self.routed_rx.lock().await;
            while routed.try_recv().is_ok() {}
        }
        *self.awaiting.lock().await = Some(peer.clone());

        let outcome = self.run_rounds(peer, last_sync).await;

        *self.awaiting.lock().await = None;
        let mut coord = self.coordinator.lock().await;
        match &outcome {
            Ok(report) => {
                coord.complete(now_millis());
                tracing::info!(
                    chain_id = %self.chain.chain_id(),
                    peer = %peer,
                    rounds = report.rounds,
                    imported = report.blocks_imported,
                    "sync complete"
                );
            }
            Err(e) => {
                coord.fail(e.to_string(), now_millis());
                tracing::warn!(
                    chain_id = %self.chain.chain_id(),
                    peer = %peer,
                    error = %e,
                    "sync failed"
                );
            }
        }
        outcome
    }

    async fn run_rounds(&self, peer: &PeerId, last_sync: Option<i64>) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut previous_latest = None;

        loop {
            if report.rounds >= self.config.max_rounds {
                tracing::warn!(peer = %peer, rounds = report.rounds, "sync round limit reached");
                break;
            }

            let latest = self
                .chain
                .latest_sequence()
                .await
                .map_err(SyncError::replica)?;
            if previous_latest == Some(latest) {
                tracing::debug!(peer = %peer, latest = ?latest, "sync made no progress");
                break;
            }
            previous_latest = Some(latest);

            let request = SyncCoordinator::build_request(
                self.chain.chain_id().clone(),
                self.chain.local_peer_id().clone(),
                latest,
                last_sync,
            );
            self.transport
                .send(peer, SyncMessage::Request(request))
                .await?;
            report.rounds += 1;

            let response = self.await_response(peer).await?;
            SyncCoordinator::verify_response(&response)?;

            let has_more = response.has_more;
            report.blocks_received += response.blocks.len();
            if !response.blocks.is_empty() {
                let imported = self
                    .chain
                    .import_blocks(response.blocks)
                    .await
                    .map_err(SyncError::replica)?;
                report.blocks_imported += imported.imported_count;
                report.errors.extend(imported.errors);
            }

            if !has_more {
                break;
            }
        }

        self.chain
            .record_sync(now_millis())
            .await
            .map_err(SyncError::replica)?;
        Ok(report)
    }

    /// Wait for `peer`'s response, serving any requests that arrive meanwhile.
    ///
    /// A concurrent `serve_next` may receive the response instead; it hands
    /// it over through the routed channel.
    async fn await_response(&self, peer: &PeerId) -> Result<SyncResponse<T>> {
        let deadline = Instant::now() + self.config.message_timeout;
        let mut routed = self.routed_rx.lock().await;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SyncError::Timeout(format!("waiting for response from {}", peer)));
            }

            tokio::select! {
                Some(response) = routed.recv() => {
                    response.validate_limits().map_err(|e| {
                        SyncError::InvalidMessage(format!("response from {}: {}", peer, e))
                    })?;
                    return Ok(response);
                }
                received = self.transport.recv_timeout(remaining) => {
                    let Some((from, message)) = received? else {
                        return Err(SyncError::Timeout(format!(
                            "waiting for response from {}",
                            peer
                        )));
                    };
                    self.dispatch(from, message).await?;
                }
            }
        }
    }

    /// Serve a request, or route a response to the waiting `sync_with`.
    ///
    /// Returns whether the message was used.
    async fn dispatch(&self, from: PeerId, message: SyncMessage<T>) -> Result<bool> {
        if message.chain_id() != self.chain.chain_id() {
            tracing::debug!(
                from = %from,
                chain_id = %message.chain_id(),
                "ignoring message for other chain"
            );
            return Ok(false);
        }

        match message {
            SyncMessage::Request(request) => {
                self.handle_request(&from, &request).await?;
                Ok(true)
            }
            SyncMessage::Response(response) => {
                if self.awaiting.lock().await.as_ref() != Some(&from) {
                    tracing::debug!(from = %from, "ignoring unsolicited response");
                    return Ok(false);
                }
                // The receiver lives as long as `self`.
                let _ = self.routed_tx.send(response);
                Ok(true)
            }
        }
    }

    /// Answer one request with the next batch after its `last_known_sequence`.
    pub async fn handle_request(&self, from: &PeerId, request: &SyncRequest) -> Result<()> {
        if &request.chain_id != self.chain.chain_id() {
            return Err(SyncError::ChainMismatch {
                expected: self.chain.chain_id().clone(),
                got: request.chain_id.clone(),
            });
        }

        let batch_size = self.config.batch_size.clamp(1, limits::MAX_BLOCKS_PER_RESPONSE);
        let blocks = self
            .chain
            .blocks_after(request.last_known_sequence, batch_size)
            .await
            .map_err(SyncError::replica)?;

        tracing::debug!(
            chain_id = %request.chain_id,
            peer = %from,
            after = ?request.last_known_sequence,
            count = blocks.len(),
            "serving sync request"
        );

        let response = SyncCoordinator::build_response(
            self.chain.chain_id().clone(),
            self.chain.local_peer_id().clone(),
            blocks,
            batch_size,
        );
        self.transport
            .send(from, SyncMessage::Response(response))
            .await
    }

    /// Receive one message and act on it.
    ///
    /// Requests for this chain are answered. A response from the peer a
    /// running [`sync_with`](Self::sync_with) waits on is handed to it.
    /// Returns whether the message was used.
    pub async fn serve_next(&self, timeout: Duration) -> Result<bool> {
        match self.transport.recv_timeout(timeout).await? {
            None => Ok(false),
            Some((from, message)) => self.dispatch(from, message).await,
        }
    }
}
