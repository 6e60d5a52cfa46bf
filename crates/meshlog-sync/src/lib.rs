//! # Meshlog Sync
//!
//! Peer tracking and the batch pull protocol that lets two replicas of a
//! chain converge.
//!
//! ## Overview
//!
//! A requester announces the highest sequence number it holds. The responder
//! answers with the next batch of blocks and a Merkle digest over their
//! hashes. The requester recomputes every block hash, checks the digest, and
//! imports the batch, repeating while the responder reports more.
//!
//! ## Key Properties
//!
//! - **Verified**: A batch whose digest does not match its content is dropped
//!   whole
//! - **Resumable**: Every request starts from the requester's latest block
//! - **Exclusive**: One sync per shared coordinator; a second is rejected
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use meshlog_sync::{MemoryNetwork, SyncConfig, SyncSession};
//!
//! let network = MemoryNetwork::new();
//! let transport = network.create_transport(local_peer.clone()).await;
//! let session = SyncSession::new(Arc::new(chain), transport, SyncConfig::default());
//!
//! let report = session.sync_with(&remote_peer).await?;
//! println!("imported {} blocks in {} rounds", report.blocks_imported, report.rounds);
//! ```

pub mod coordinator;
pub mod error;
pub mod messages;
pub mod peers;
pub mod protocol;
pub mod transport;

pub use coordinator::{SyncCoordinator, SyncFailure, SyncState};
pub use error::{Result, SyncError};
pub use messages::{limits, SyncMessage, SyncRequest, SyncResponse, DEFAULT_BATCH_SIZE};
pub use peers::{BlockRange, PeerInfo, PeerTracker};
pub use protocol::{LocalChain, SharedCoordinator, SyncConfig, SyncReport, SyncSession};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
