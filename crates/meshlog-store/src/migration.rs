//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, meshlog_core::now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Blocks, content-addressed within a chain
        CREATE TABLE blocks (
            chain_id TEXT NOT NULL,
            block_hash BLOB NOT NULL,         -- 32 bytes, SHA-256 of canonical content
            previous_hash BLOB,               -- 32 bytes, NULL at seq 0
            seq INTEGER NOT NULL,
            chunk_id INTEGER NOT NULL,
            payload BLOB NOT NULL,            -- CBOR
            signature BLOB NOT NULL,          -- 32 bytes, HMAC-SHA256
            created_at INTEGER NOT NULL,      -- Unix ms
            confirmed_by BLOB NOT NULL,       -- CBOR array of peer ids
            PRIMARY KEY (chain_id, block_hash)
        );

        -- Per-chunk Merkle roots
        CREATE TABLE chunks (
            chain_id TEXT NOT NULL,
            chunk_id INTEGER NOT NULL,
            start_block INTEGER NOT NULL,
            end_block INTEGER NOT NULL,
            block_count INTEGER NOT NULL,
            merkle_root BLOB NOT NULL,
            last_updated INTEGER NOT NULL,
            replicated_on BLOB NOT NULL,      -- CBOR array of peer ids
            PRIMARY KEY (chain_id, chunk_id)
        );

        -- Chain state summary
        CREATE TABLE chains (
            chain_id TEXT PRIMARY KEY,
            latest_block INTEGER,             -- NULL for an empty chain
            latest_hash BLOB,
            genesis_hash BLOB,
            total_chunks INTEGER NOT NULL DEFAULT 0,
            peer_count INTEGER NOT NULL DEFAULT 1,
            last_sync INTEGER,
            updated_at INTEGER NOT NULL
        );

        -- Detected gaps, rewritten with each state update
        CREATE TABLE chain_gaps (
            chain_id TEXT NOT NULL,
            start_seq INTEGER NOT NULL,
            end_seq INTEGER NOT NULL,
            reasons BLOB NOT NULL,            -- CBOR array of reason names
            detected_at INTEGER NOT NULL,
            PRIMARY KEY (chain_id, start_seq)
        );

        CREATE INDEX idx_blocks_chain_seq ON blocks(chain_id, seq);
        CREATE INDEX idx_blocks_chain_chunk ON blocks(chain_id, chunk_id);
        "#,
    )?;

    Ok(())
}
