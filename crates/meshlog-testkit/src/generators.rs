//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;

use meshlog_core::{Block, BlockBuilder, Digest, PeerId, SigningKey};

/// Generate a random signing key.
pub fn signing_key() -> impl Strategy<Value = SigningKey> {
    any::<[u8; 32]>().prop_map(|seed| SigningKey::from_bytes(seed))
}

/// Generate a random Digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate an ordered list of digests.
pub fn digests(max_len: usize) -> impl Strategy<Value = Vec<Digest>> {
    prop::collection::vec(digest(), 0..=max_len)
}

/// Generate a peer id.
pub fn peer_id() -> impl Strategy<Value = PeerId> {
    "[a-z][a-z0-9]{0,11}".prop_map(PeerId::new)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_900_000_000_000i64
}

/// Generate a text payload of up to `max_len` characters.
pub fn payload(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..=max_len).prop_map(|chars| chars.into_iter().collect())
}

/// Generate a set of held sequence numbers below `max`.
pub fn held_sequences(max: u64, max_len: usize) -> impl Strategy<Value = BTreeSet<u64>> {
    prop::collection::btree_set(0..max, 0..=max_len)
}

/// Parameters for generating a block.
#[derive(Debug, Clone)]
pub struct BlockParams {
    pub key_seed: [u8; 32],
    pub sequence_number: u64,
    pub payload: String,
    pub created_at: i64,
    /// Ignored for sequence number 0.
    pub previous_hash: Option<[u8; 32]>,
}

impl Arbitrary for BlockParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            0u64..=10_000u64,
            payload(200),
            timestamp(),
            any::<[u8; 32]>(),
        )
            .prop_map(|(key_seed, seq, payload, created_at, prev)| BlockParams {
                key_seed,
                sequence_number: seq,
                payload,
                created_at,
                previous_hash: (seq > 0).then_some(prev),
            })
            .boxed()
    }
}

/// Generate a block from parameters.
pub fn block_from_params(params: &BlockParams) -> Block<String> {
    let key = SigningKey::from_bytes(params.key_seed);
    let mut builder = BlockBuilder::new(params.sequence_number, params.payload.clone())
        .created_at(params.created_at);

    if let Some(prev) = params.previous_hash {
        builder = builder.previous(Digest::from_bytes(prev));
    }

    builder.sign(&key).expect("string payloads always encode")
}

/// Generate a linked chain of `1..=max_len` blocks under one key.
pub fn chain(max_len: usize) -> impl Strategy<Value = (SigningKey, Vec<Block<String>>)> {
    (signing_key(), prop::collection::vec(payload(40), 1..=max_len)).prop_map(|(key, payloads)| {
        let mut blocks: Vec<Block<String>> = Vec::with_capacity(payloads.len());
        for (seq, payload) in payloads.into_iter().enumerate() {
            let mut builder = BlockBuilder::new(seq as u64, payload);
            if let Some(prev) = blocks.last() {
                builder = builder.previous(prev.block_hash);
            }
            blocks.push(builder.sign(&key).expect("string payloads always encode"));
        }
        (key, blocks)
    })
}
