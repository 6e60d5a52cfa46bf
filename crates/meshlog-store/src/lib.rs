//! # Meshlog Store
//!
//! Storage abstraction for Meshlog. Provides a trait-based interface for
//! block, chunk, and chain-state persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The chain manager is storage-agnostic: it talks to the [`Store`] and
//! [`BlockStore`] traits, and the concrete adapter is passed in at
//! construction. The persistent implementation is [`SqliteStore`], with
//! [`MemoryStore`] as the reference adapter for tests.
//!
//! ## Key Types
//!
//! - [`Store`] - Payload-independent operations (chunks, chain state, deletion)
//! - [`BlockStore`] - Typed block operations for one payload type
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshlog_store::{BlockStore, SqliteStore};
//! use meshlog_core::{Block, ChainId};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("meshlog.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let chain = ChainId::from("room-1");
//!     let blocks: Vec<Block<String>> = store.get_blocks(&chain, None, Some(50)).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Create-or-update**: `put_*` replaces an existing record with the same key
//! - **Empty before data**: every read succeeds on an empty store
//! - **No retries**: failures surface as [`StoreError`] for the caller to handle

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{BlockStore, Store};
