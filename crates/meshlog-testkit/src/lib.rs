//! # Meshlog Testkit
//!
//! Testing utilities for Meshlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed blocks with their expected canonical bytes,
//!   hashes, and signatures
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helpers for building chains and managers in tests
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the canonical encoding so independent peers derive the
//! same block hashes:
//!
//! ```rust
//! use meshlog_testkit::vectors::{all_vectors, block_from_vector};
//!
//! for vector in all_vectors() {
//!     let block = block_from_vector(&vector).unwrap();
//!     assert_eq!(block.block_hash.to_hex(), vector.block_hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use meshlog_testkit::generators::{block_from_params, BlockParams};
//!
//! proptest! {
//!     #[test]
//!     fn block_hash_is_deterministic(params: BlockParams) {
//!         let b1 = block_from_params(&params);
//!         let b2 = block_from_params(&params);
//!         prop_assert_eq!(b1.block_hash, b2.block_hash);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use meshlog_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let blocks = fixture.chain_of(5);
//! assert_eq!(blocks[4].previous_hash, Some(blocks[3].block_hash));
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{MemoryManager, TestFixture};
