//! Transport abstraction for the sync protocol.
//!
//! The transport delivers whole [`SyncMessage`]s between peers. Framing and
//! encoding are the implementation's business; the protocol only sees typed
//! messages tagged with their sender.

use std::time::Duration;

use async_trait::async_trait;

use meshlog_core::{Payload, PeerId};

use crate::error::Result;
use crate::messages::SyncMessage;

/// Point-to-point message delivery between peers.
#[async_trait]
pub trait Transport<T: Payload>: Send + Sync {
    /// Send a message to a specific peer.
    async fn send(&self, peer: &PeerId, message: SyncMessage<T>) -> Result<()>;

    /// Receive the next message from any peer.
    async fn recv(&self) -> Result<(PeerId, SyncMessage<T>)>;

    /// Receive with timeout. `None` if nothing arrived in time.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<(PeerId, SyncMessage<T>)>>;

    fn local_peer_id(&self) -> &PeerId;

    /// Peers currently reachable, excluding ourselves.
    async fn connected_peers(&self) -> Result<Vec<PeerId>>;
}

/// In-process transport over tokio channels, for tests and embedding.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::{mpsc, Mutex, RwLock};

    use crate::error::SyncError;

    const CHANNEL_CAPACITY: usize = 1000;

    #[derive(Debug)]
    struct Envelope<T> {
        from: PeerId,
        message: SyncMessage<T>,
    }

    /// Shared routing table for a set of in-memory transports.
    pub struct MemoryNetwork<T> {
        senders: RwLock<HashMap<PeerId, mpsc::Sender<Envelope<T>>>>,
    }

    impl<T: Payload> MemoryNetwork<T> {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                senders: RwLock::new(HashMap::new()),
            })
        }

        /// Attach a peer to the network.
        ///
        /// Re-attaching an existing peer id replaces its inbox.
        pub async fn create_transport(self: &Arc<Self>, peer_id: PeerId) -> MemoryTransport<T> {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            self.senders.write().await.insert(peer_id.clone(), tx);

            MemoryTransport {
                peer_id,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Detach a peer. Later sends to it fail.
        pub async fn disconnect(&self, peer_id: &PeerId) {
            self.senders.write().await.remove(peer_id);
        }
    }

    pub struct MemoryTransport<T> {
        peer_id: PeerId,
        network: Arc<MemoryNetwork<T>>,
        receiver: Mutex<mpsc::Receiver<Envelope<T>>>,
    }

    #[async_trait]
    impl<T: Payload> Transport<T> for MemoryTransport<T> {
        async fn send(&self, peer: &PeerId, message: SyncMessage<T>) -> Result<()> {
            let sender = self
                .network
                .senders
                .read()
                .await
                .get(peer)
                .cloned()
                .ok_or_else(|| SyncError::Transport(format!("peer not found: {}", peer)))?;

            sender
                .send(Envelope {
                    from: self.peer_id.clone(),
                    message,
                })
                .await
                .map_err(|_| SyncError::Transport(format!("peer disconnected: {}", peer)))
        }

        async fn recv(&self) -> Result<(PeerId, SyncMessage<T>)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(envelope) => Ok((envelope.from, envelope.message)),
                None => Err(SyncError::Transport("channel closed".into())),
            }
        }

        async fn recv_timeout(
            &self,
            timeout: Duration,
        ) -> Result<Option<(PeerId, SyncMessage<T>)>> {
            let mut rx = self.receiver.lock().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(envelope)) => Ok(Some((envelope.from, envelope.message))),
                Ok(None) => Err(SyncError::Transport("channel closed".into())),
                Err(_) => Ok(None),
            }
        }

        fn local_peer_id(&self) -> &PeerId {
            &self.peer_id
        }

        async fn connected_peers(&self) -> Result<Vec<PeerId>> {
            let senders = self.network.senders.read().await;
            let mut peers: Vec<PeerId> = senders
                .keys()
                .filter(|id| *id != &self.peer_id)
                .cloned()
                .collect();
            peers.sort();
            Ok(peers)
        }
    }
}
