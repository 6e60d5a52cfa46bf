//! # Meshlog
//!
//! Hash-chained block logs that peers replicate without a central server.
//!
//! ## Overview
//!
//! Meshlog provides a portable, offline-first library for:
//!
//! - **Blocks**: Immutable, hash-linked, HMAC-signed records
//! - **Chunks**: Fixed windows of blocks summarized by a Merkle root
//! - **Gaps**: Detected holes in a chain, each tagged with likely causes
//! - **Sync**: Verified batch exchange between two peers
//!
//! ## Key Concepts
//!
//! - **Chain**: One append-only sequence of blocks, keyed by a caller-chosen id.
//! - **Import**: Foreign blocks are merged idempotently; holes become gaps.
//! - **Integrity score**: A 0-100 heuristic over replication and completeness.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use meshlog::store::SqliteStore;
//! use meshlog::{ChainConfig, ChainId, ChainManager, PeerId, SigningKey};
//!
//! async fn example() -> meshlog::Result<()> {
//!     // Open storage
//!     let store = Arc::new(SqliteStore::open("meshlog.db")?);
//!
//!     // One manager per chain
//!     let chain: ChainManager<String, _> = ChainManager::new(
//!         ChainId::from("room-1"),
//!         SigningKey::from_passphrase("shared room secret"),
//!         PeerId::random(),
//!         ChainConfig::default(),
//!         store,
//!     );
//!     chain.initialize().await?;
//!
//!     let block = chain.append("hello".to_string()).await?;
//!     assert_eq!(block.sequence_number, 0);
//!
//!     let info = chain.integrity_info(1).await?;
//!     println!("{}: {}", info.score.score, info.score.description);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `meshlog::core` - Blocks, hashing, Merkle roots, gaps, scoring
//! - `meshlog::store` - Storage traits, SQLite and in-memory stores
//! - `meshlog::sync` - Peer tracking and the sync protocol

pub mod config;
pub mod error;
pub mod manager;

// Re-export component crates
pub use meshlog_core as core;
pub use meshlog_store as store;
pub use meshlog_sync as sync;

// Re-export main types for convenience
pub use config::{ChainConfig, MeshlogConfig};
pub use error::{ChainError, Result};
pub use manager::ChainManager;

// Re-export commonly used types
pub use meshlog_core::{
    Block, ChainId, ChainState, Chunk, Digest, GapRange, GapReason, ImportReport, IntegrityInfo,
    IntegrityScore, IntegrityStatus, Payload, PeerId, SigningKey,
};
pub use meshlog_sync::{PeerTracker, SyncConfig, SyncReport, SyncSession};
