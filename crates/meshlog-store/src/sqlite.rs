//! SQLite implementation of the store traits.
//!
//! This is the persistent storage backend for Meshlog. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use meshlog_core::{
    now_millis, Block, ChainId, ChainState, Chunk, Digest, GapRange, GapReason, Payload, PeerId,
    Signature,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{BlockStore, Store};

const BLOCK_COLUMNS: &str =
    "block_hash, previous_hash, seq, chunk_id, payload, signature, created_at, confirmed_by";

const CHUNK_COLUMNS: &str = "chain_id, chunk_id, start_block, end_block, block_count, \
     merkle_root, last_updated, replicated_on";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime. One store serves any number of
/// chains and any payload type.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row conversion
// ─────────────────────────────────────────────────────────────────────────────

fn to_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn to_array(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes.try_into().map_err(|b: Vec<u8>| {
        StoreError::InvalidData(format!("{} has {} bytes, expected 32", column, b.len()))
    })
}

fn to_digest(bytes: Vec<u8>, column: &str) -> Result<Digest> {
    to_array(bytes, column).map(Digest::from_bytes)
}

fn to_u64(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative {}: {}", column, value)))
}

/// Raw column values of a `blocks` row.
struct BlockRow {
    block_hash: Vec<u8>,
    previous_hash: Option<Vec<u8>>,
    seq: i64,
    chunk_id: i64,
    payload: Vec<u8>,
    signature: Vec<u8>,
    created_at: i64,
    confirmed_by: Vec<u8>,
}

impl BlockRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            block_hash: row.get(0)?,
            previous_hash: row.get(1)?,
            seq: row.get(2)?,
            chunk_id: row.get(3)?,
            payload: row.get(4)?,
            signature: row.get(5)?,
            created_at: row.get(6)?,
            confirmed_by: row.get(7)?,
        })
    }

    fn into_block<T: Payload>(self) -> Result<Block<T>> {
        Ok(Block {
            block_hash: to_digest(self.block_hash, "block_hash")?,
            previous_hash: self
                .previous_hash
                .map(|b| to_digest(b, "previous_hash"))
                .transpose()?,
            sequence_number: to_u64(self.seq, "seq")?,
            chunk_id: to_u64(self.chunk_id, "chunk_id")?,
            payload: from_cbor(&self.payload)?,
            signature: Signature::from_bytes(to_array(self.signature, "signature")?),
            created_at: self.created_at,
            confirmed_by: from_cbor(&self.confirmed_by)?,
        })
    }
}

fn query_blocks<T: Payload, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Block<T>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, BlockRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(BlockRow::into_block).collect()
}

/// Raw column values of a `chunks` row.
struct ChunkRow {
    chain_id: String,
    chunk_id: i64,
    start_block: i64,
    end_block: i64,
    block_count: i64,
    merkle_root: Vec<u8>,
    last_updated: i64,
    replicated_on: Vec<u8>,
}

impl ChunkRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chain_id: row.get(0)?,
            chunk_id: row.get(1)?,
            start_block: row.get(2)?,
            end_block: row.get(3)?,
            block_count: row.get(4)?,
            merkle_root: row.get(5)?,
            last_updated: row.get(6)?,
            replicated_on: row.get(7)?,
        })
    }

    fn into_chunk(self) -> Result<Chunk> {
        let replicated_on: BTreeSet<PeerId> = from_cbor(&self.replicated_on)?;
        Ok(Chunk {
            chunk_id: to_u64(self.chunk_id, "chunk_id")?,
            chain_id: ChainId::new(self.chain_id),
            start_block: to_u64(self.start_block, "start_block")?,
            end_block: to_u64(self.end_block, "end_block")?,
            block_count: to_u64(self.block_count, "block_count")?,
            merkle_root: to_digest(self.merkle_root, "merkle_root")?,
            last_updated: self.last_updated,
            replicated_on,
        })
    }
}

fn load_chain_state(conn: &Connection, chain_id: &ChainId) -> Result<Option<ChainState>> {
    let row = conn
        .query_row(
            "SELECT latest_block, latest_hash, genesis_hash, total_chunks, peer_count, last_sync
             FROM chains WHERE chain_id = ?1",
            params![chain_id.as_str()],
            |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<Vec<u8>>>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((latest_block, latest_hash, genesis_hash, total_chunks, peer_count, last_sync)) = row
    else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT start_seq, end_seq, reasons, detected_at
         FROM chain_gaps WHERE chain_id = ?1 ORDER BY start_seq ASC",
    )?;
    let gap_rows = stmt
        .query_map(params![chain_id.as_str()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut gaps = Vec::with_capacity(gap_rows.len());
    for (start, end, reasons, detected_at) in gap_rows {
        let reasons: BTreeSet<GapReason> = from_cbor(&reasons)?;
        gaps.push(GapRange {
            start: to_u64(start, "start_seq")?,
            end: to_u64(end, "end_seq")?,
            reasons,
            detected_at,
        });
    }

    Ok(Some(ChainState {
        chain_id: chain_id.clone(),
        latest_block: latest_block.map(|v| to_u64(v, "latest_block")).transpose()?,
        latest_hash: latest_hash.map(|b| to_digest(b, "latest_hash")).transpose()?,
        genesis_hash: genesis_hash.map(|b| to_digest(b, "genesis_hash")).transpose()?,
        total_chunks: to_u64(total_chunks, "total_chunks")?,
        gaps,
        peer_count,
        last_sync,
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait implementations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Store for SqliteStore {
    async fn open(&self) -> Result<()> {
        self.call(migration::migrate).await
    }

    async fn put_chunk(&self, chunk: &Chunk) -> Result<()> {
        let chunk = chunk.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO chunks (
                    chain_id, chunk_id, start_block, end_block, block_count,
                    merkle_root, last_updated, replicated_on
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    chunk.chain_id.as_str(),
                    chunk.chunk_id as i64,
                    chunk.start_block as i64,
                    chunk.end_block as i64,
                    chunk.block_count as i64,
                    chunk.merkle_root.as_bytes().as_slice(),
                    chunk.last_updated,
                    to_cbor(&chunk.replicated_on)?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_chunk(&self, chain_id: &ChainId, chunk_id: u64) -> Result<Option<Chunk>> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM chunks WHERE chain_id = ?1 AND chunk_id = ?2",
                CHUNK_COLUMNS
            );
            conn.query_row(&sql, params![chain_id.as_str(), chunk_id as i64], ChunkRow::from_row)
                .optional()?
                .map(ChunkRow::into_chunk)
                .transpose()
        })
        .await
    }

    async fn list_chunks(&self, chain_id: &ChainId) -> Result<Vec<Chunk>> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM chunks WHERE chain_id = ?1 ORDER BY chunk_id ASC",
                CHUNK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![chain_id.as_str()], ChunkRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(ChunkRow::into_chunk).collect()
        })
        .await
    }

    async fn count_chunks(&self, chain_id: &ChainId) -> Result<u64> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE chain_id = ?1",
                params![chain_id.as_str()],
                |row| row.get(0),
            )?;
            to_u64(count, "chunk count")
        })
        .await
    }

    async fn get_chain_state(&self, chain_id: &ChainId) -> Result<Option<ChainState>> {
        let chain_id = chain_id.clone();
        self.call(move |conn| load_chain_state(conn, &chain_id)).await
    }

    async fn put_chain_state(&self, state: &ChainState) -> Result<()> {
        let state = state.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let chain = state.chain_id.as_str();

            tx.execute(
                "INSERT OR REPLACE INTO chains (
                    chain_id, latest_block, latest_hash, genesis_hash,
                    total_chunks, peer_count, last_sync, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    chain,
                    state.latest_block.map(|v| v as i64),
                    state.latest_hash.as_ref().map(|d| d.as_bytes().to_vec()),
                    state.genesis_hash.as_ref().map(|d| d.as_bytes().to_vec()),
                    state.total_chunks as i64,
                    state.peer_count,
                    state.last_sync,
                    now_millis(),
                ],
            )?;

            tx.execute("DELETE FROM chain_gaps WHERE chain_id = ?1", params![chain])?;
            for gap in &state.gaps {
                tx.execute(
                    "INSERT INTO chain_gaps (chain_id, start_seq, end_seq, reasons, detected_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        chain,
                        gap.start as i64,
                        gap.end as i64,
                        to_cbor(&gap.reasons)?,
                        gap.detected_at,
                    ],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_chain(&self, chain_id: &ChainId) -> Result<()> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            for table in ["blocks", "chunks", "chain_gaps", "chains"] {
                tx.execute(
                    &format!("DELETE FROM {} WHERE chain_id = ?1", table),
                    params![chain_id.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.call(|conn| {
            conn.execute_batch(
                "BEGIN;
                 DELETE FROM blocks;
                 DELETE FROM chunks;
                 DELETE FROM chain_gaps;
                 DELETE FROM chains;
                 COMMIT;",
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl<T: Payload> BlockStore<T> for SqliteStore {
    async fn put_block(&self, chain_id: &ChainId, block: &Block<T>) -> Result<()> {
        let chain_id = chain_id.clone();
        let payload = to_cbor(&block.payload)?;
        let confirmed_by = to_cbor(&block.confirmed_by)?;
        let block_hash = block.block_hash;
        let previous_hash = block.previous_hash;
        let seq = block.sequence_number as i64;
        let chunk_id = block.chunk_id as i64;
        let signature = block.signature;
        let created_at = block.created_at;

        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO blocks (
                    chain_id, block_hash, previous_hash, seq, chunk_id,
                    payload, signature, created_at, confirmed_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    chain_id.as_str(),
                    block_hash.as_bytes().as_slice(),
                    previous_hash.as_ref().map(|d| d.as_bytes().to_vec()),
                    seq,
                    chunk_id,
                    payload,
                    signature.as_bytes().as_slice(),
                    created_at,
                    confirmed_by,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_block(&self, chain_id: &ChainId, hash: &Digest) -> Result<Option<Block<T>>> {
        let chain_id = chain_id.clone();
        let hash = *hash;
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM blocks WHERE chain_id = ?1 AND block_hash = ?2",
                BLOCK_COLUMNS
            );
            conn.query_row(
                &sql,
                params![chain_id.as_str(), hash.as_bytes().as_slice()],
                BlockRow::from_row,
            )
            .optional()?
            .map(BlockRow::into_block)
            .transpose()
        })
        .await
    }

    async fn has_block(&self, chain_id: &ChainId, hash: &Digest) -> Result<bool> {
        let chain_id = chain_id.clone();
        let hash = *hash;
        self.call(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM blocks WHERE chain_id = ?1 AND block_hash = ?2",
                    params![chain_id.as_str(), hash.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn get_blocks(
        &self,
        chain_id: &ChainId,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Block<T>>> {
        let chain_id = chain_id.clone();
        // seq is never negative, and SQLite treats a negative LIMIT as unbounded.
        let after = match after.map(i64::try_from) {
            None => -1,
            Some(Ok(seq)) => seq,
            Some(Err(_)) => return Ok(Vec::new()),
        };
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM blocks WHERE chain_id = ?1 AND seq > ?2
                 ORDER BY seq ASC LIMIT ?3",
                BLOCK_COLUMNS
            );
            query_blocks(conn, &sql, params![chain_id.as_str(), after, limit])
        })
        .await
    }

    async fn get_blocks_range(
        &self,
        chain_id: &ChainId,
        start: u64,
        end: u64,
    ) -> Result<Vec<Block<T>>> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM blocks WHERE chain_id = ?1 AND seq >= ?2 AND seq <= ?3
                 ORDER BY seq ASC",
                BLOCK_COLUMNS
            );
            query_blocks(
                conn,
                &sql,
                params![chain_id.as_str(), start as i64, end as i64],
            )
        })
        .await
    }

    async fn get_latest_block(&self, chain_id: &ChainId) -> Result<Option<Block<T>>> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM blocks WHERE chain_id = ?1 ORDER BY seq DESC LIMIT 1",
                BLOCK_COLUMNS
            );
            let mut blocks = query_blocks(conn, &sql, params![chain_id.as_str()])?;
            Ok(blocks.pop())
        })
        .await
    }

    async fn get_block_by_sequence(
        &self,
        chain_id: &ChainId,
        seq: u64,
    ) -> Result<Option<Block<T>>> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM blocks WHERE chain_id = ?1 AND seq = ?2
                 ORDER BY block_hash ASC LIMIT 1",
                BLOCK_COLUMNS
            );
            let mut blocks = query_blocks(conn, &sql, params![chain_id.as_str(), seq as i64])?;
            Ok(blocks.pop())
        })
        .await
    }

    async fn sequence_numbers(&self, chain_id: &ChainId) -> Result<Vec<u64>> {
        let chain_id = chain_id.clone();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT seq FROM blocks WHERE chain_id = ?1 ORDER BY seq ASC",
            )?;
            let seqs = stmt
                .query_map(params![chain_id.as_str()], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            seqs.into_iter().map(|s| to_u64(s, "seq")).collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlog_core::{BlockBuilder, SigningKey};
    use tempfile::tempdir;

    fn make_chain(n: u64) -> Vec<Block<String>> {
        let key = SigningKey::from_bytes([0x42; 32]);
        let mut blocks: Vec<Block<String>> = Vec::new();
        for seq in 0..n {
            let mut builder = BlockBuilder::new(seq, format!("test payload {}", seq))
                .created_at(1234567890000)
                .chunk_size(10);
            if let Some(prev) = blocks.last() {
                builder = builder.previous(prev.block_hash);
            }
            blocks.push(builder.sign(&key).unwrap());
        }
        blocks
    }

    fn chunk(chain: &ChainId, chunk_id: u64) -> Chunk {
        Chunk {
            chunk_id,
            chain_id: chain.clone(),
            start_block: chunk_id * 10,
            end_block: chunk_id * 10 + 4,
            block_count: 5,
            merkle_root: Digest::from_bytes([chunk_id as u8; 32]),
            last_updated: 1234567890000,
            replicated_on: BTreeSet::from([PeerId::new("alice")]),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_block() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = ChainId::from("room");
        let mut block = make_chain(1).remove(0);
        block.confirm(PeerId::new("bob"));

        store.put_block(&chain, &block).await.unwrap();

        let got: Block<String> = store
            .get_block(&chain, &block.block_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, block);
        assert!(got.verify_hash().unwrap());
        assert!(BlockStore::<String>::has_block(&store, &chain, &block.block_hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_block_queries() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = ChainId::from("room");
        let blocks = make_chain(12);
        for block in blocks.iter().rev() {
            store.put_block(&chain, block).await.unwrap();
        }

        let all: Vec<Block<String>> = store.get_blocks(&chain, None, None).await.unwrap();
        assert_eq!(all.len(), 12);
        assert!(all.windows(2).all(|w| w[0].sequence_number < w[1].sequence_number));

        let page: Vec<Block<String>> = store.get_blocks(&chain, Some(4), Some(3)).await.unwrap();
        let seqs: Vec<u64> = page.iter().map(|b| b.sequence_number).collect();
        assert_eq!(seqs, vec![5, 6, 7]);

        let range: Vec<Block<String>> = store.get_blocks_range(&chain, 10, 20).await.unwrap();
        assert_eq!(range.len(), 2);

        let latest: Block<String> = store.get_latest_block(&chain).await.unwrap().unwrap();
        assert_eq!(latest.sequence_number, 11);

        let third: Block<String> = store.get_block_by_sequence(&chain, 3).await.unwrap().unwrap();
        assert_eq!(third.block_hash, blocks[3].block_hash);

        let seqs = BlockStore::<String>::sequence_numbers(&store, &chain).await.unwrap();
        assert_eq!(seqs, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_reads() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = ChainId::from("nothing");

        let blocks: Vec<Block<String>> = store.get_blocks(&chain, None, None).await.unwrap();
        assert!(blocks.is_empty());
        let latest: Option<Block<String>> = store.get_latest_block(&chain).await.unwrap();
        assert!(latest.is_none());
        assert!(store.get_chain_state(&chain).await.unwrap().is_none());
        assert!(store.get_chunk(&chain, 0).await.unwrap().is_none());
        assert_eq!(store.count_chunks(&chain).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_chunks() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = ChainId::from("room");

        store.put_chunk(&chunk(&chain, 1)).await.unwrap();
        store.put_chunk(&chunk(&chain, 0)).await.unwrap();

        let mut updated = chunk(&chain, 0);
        updated.block_count = 6;
        store.put_chunk(&updated).await.unwrap();

        let chunks = store.list_chunks(&chain).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], updated);
        assert_eq!(chunks[1].chunk_id, 1);
        assert_eq!(store.count_chunks(&chain).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_chain_state_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let chain = ChainId::from("room");

        let mut state = ChainState::new(chain.clone());
        state.latest_block = Some(9);
        state.latest_hash = Some(Digest::from_bytes([9; 32]));
        state.genesis_hash = Some(Digest::from_bytes([0; 32]));
        state.total_chunks = 1;
        state.peer_count = 3;
        state.last_sync = Some(42);
        state.gaps = vec![
            GapRange::new(0, 4, [GapReason::LateJoin], 7),
            GapRange::new(7, 8, [GapReason::PeerOffline], 7),
        ];
        store.put_chain_state(&state).await.unwrap();
        assert_eq!(store.get_chain_state(&chain).await.unwrap(), Some(state.clone()));

        // Gaps are replaced, not accumulated.
        state.gaps.clear();
        store.put_chain_state(&state).await.unwrap();
        let loaded = store.get_chain_state(&chain).await.unwrap().unwrap();
        assert!(loaded.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_delete_chain() {
        let store = SqliteStore::open_memory().unwrap();
        let a = ChainId::from("a");
        let b = ChainId::from("b");

        for block in make_chain(3) {
            store.put_block(&a, &block).await.unwrap();
            store.put_block(&b, &block).await.unwrap();
        }
        store.put_chunk(&chunk(&a, 0)).await.unwrap();
        store.put_chain_state(&ChainState::new(a.clone())).await.unwrap();

        store.delete_chain(&a).await.unwrap();

        let left: Vec<Block<String>> = store.get_blocks(&a, None, None).await.unwrap();
        assert!(left.is_empty());
        assert!(store.get_chain_state(&a).await.unwrap().is_none());
        assert_eq!(store.count_chunks(&a).await.unwrap(), 0);

        let other: Vec<Block<String>> = store.get_blocks(&b, None, None).await.unwrap();
        assert_eq!(other.len(), 3);

        store.clear().await.unwrap();
        let other: Vec<Block<String>> = store.get_blocks(&b, None, None).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meshlog.db");
        let chain = ChainId::from("room");
        let blocks = make_chain(3);

        {
            let store = SqliteStore::open(&path).unwrap();
            for block in &blocks {
                store.put_block(&chain, block).await.unwrap();
            }
            store.put_chain_state(&ChainState::new(chain.clone())).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        Store::open(&store).await.unwrap();
        let loaded: Vec<Block<String>> = store.get_blocks(&chain, None, None).await.unwrap();
        assert_eq!(loaded, blocks);
        assert!(store.get_chain_state(&chain).await.unwrap().is_some());
    }
}
