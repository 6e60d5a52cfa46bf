//! Behaviour every store adapter must share.

use meshlog_core::{Block, BlockBuilder, ChainId, ChainState, PeerId, SigningKey};
use meshlog_store::{BlockStore, MemoryStore, SqliteStore, Store};

fn blocks(seqs: &[u64]) -> Vec<Block<Vec<u8>>> {
    let key = SigningKey::from_passphrase("contract");
    seqs.iter()
        .map(|&seq| {
            let mut builder = BlockBuilder::new(seq, vec![seq as u8; 4]).chunk_size(4);
            if seq > 0 {
                builder = builder.previous(meshlog_core::hash(&seq.to_be_bytes()));
            }
            builder.sign(&key).unwrap()
        })
        .collect()
}

async fn exercise<S: BlockStore<Vec<u8>>>(store: S) {
    let chain = ChainId::from("contract");
    store.open().await.unwrap();

    // Empty reads never fail.
    assert!(store.get_blocks(&chain, None, None).await.unwrap().is_empty());
    assert!(store.get_latest_block(&chain).await.unwrap().is_none());
    assert!(store.get_chain_state(&chain).await.unwrap().is_none());

    // Sparse inserts come back ascending.
    for block in blocks(&[9, 5, 6, 0]) {
        store.put_block(&chain, &block).await.unwrap();
    }
    let seqs: Vec<u64> = store
        .get_blocks(&chain, None, None)
        .await
        .unwrap()
        .iter()
        .map(|b| b.sequence_number)
        .collect();
    assert_eq!(seqs, vec![0, 5, 6, 9]);
    assert_eq!(store.sequence_numbers(&chain).await.unwrap(), vec![0, 5, 6, 9]);

    let after: Vec<u64> = store
        .get_blocks(&chain, Some(5), Some(1))
        .await
        .unwrap()
        .iter()
        .map(|b| b.sequence_number)
        .collect();
    assert_eq!(after, vec![6]);
    assert!(store
        .get_blocks(&chain, Some(u64::MAX), None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .get_blocks(&chain, Some(6), Some(usize::MAX))
            .await
            .unwrap()
            .len(),
        1
    );

    let range = store.get_blocks_range(&chain, 4, 8).await.unwrap();
    assert_eq!(range.len(), 2);

    assert_eq!(
        store.get_latest_block(&chain).await.unwrap().unwrap().sequence_number,
        9
    );
    assert!(store.get_block_by_sequence(&chain, 7).await.unwrap().is_none());

    // Create-or-update keeps one row per hash.
    let mut first = store.get_block_by_sequence(&chain, 0).await.unwrap().unwrap();
    first.confirm(PeerId::new("carol"));
    store.put_block(&chain, &first).await.unwrap();
    assert_eq!(store.get_blocks(&chain, None, None).await.unwrap().len(), 4);
    let reloaded = store.get_block(&chain, &first.block_hash).await.unwrap().unwrap();
    assert!(reloaded.confirmed_by.contains(&PeerId::new("carol")));

    store.put_chain_state(&ChainState::new(chain.clone())).await.unwrap();
    store.delete_chain(&chain).await.unwrap();
    assert!(store.get_blocks(&chain, None, None).await.unwrap().is_empty());
    assert!(store.get_chain_state(&chain).await.unwrap().is_none());
}

#[tokio::test]
async fn memory_store_honours_contract() {
    exercise(MemoryStore::<Vec<u8>>::new()).await;
}

#[tokio::test]
async fn sqlite_store_honours_contract() {
    exercise(SqliteStore::open_memory().unwrap()).await;
}

#[tokio::test]
async fn sqlite_file_store_honours_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise(SqliteStore::open(dir.path().join("contract.db")).unwrap()).await;
}
