//! Golden test vectors for deterministic verification.
//!
//! Each vector fixes a payload, link, and sequence number, and records the
//! canonical content bytes, block hash, and HMAC signature every peer must
//! derive from them. Payloads are JSON so structured and scalar payloads
//! share one vector type.

use serde::Serialize;
use serde_json::Value;

use meshlog_core::{block_content_bytes, Block, BlockBuilder, CoreError, Digest, SigningKey};

/// Passphrase of the key every vector is signed with.
pub const GOLDEN_KEY: &str = "meshlog golden key";

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Payload as JSON text.
    pub payload: &'static str,
    /// Previous block hash (hex), absent at genesis.
    pub previous_hash: Option<&'static str>,
    pub sequence_number: u64,
    /// Expected canonical content bytes (hex).
    pub content_bytes: &'static str,
    /// Expected block hash (hex).
    pub block_hash: &'static str,
    /// Expected signature under [`GOLDEN_KEY`] (hex).
    pub signature: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis with text payload",
            payload: r#""hello""#,
            previous_hash: None,
            sequence_number: 0,
            content_bytes: "a3677061796c6f61646568656c6c6f6d70726576696f75735f68617368f66f73657175656e63655f6e756d62657200",
            block_hash: "cffe30b580fb1a04676c3873f2c9860e32454c59df3a1a266069b9406aed2cb2",
            signature: "43a590cc21015bf64e3f9df080fb0e5a4210cf3f5e1be34979a9073746c2195c",
        },
        GoldenVector {
            name: "second block linked to genesis",
            payload: r#""world""#,
            previous_hash: Some("cffe30b580fb1a04676c3873f2c9860e32454c59df3a1a266069b9406aed2cb2"),
            sequence_number: 1,
            content_bytes: "a3677061796c6f616465776f726c646d70726576696f75735f686173687840636666653330623538306662316130343637366333383733663263393836306533323435346335396466336131613236363036396239343036616564326362326f73657175656e63655f6e756d62657201",
            block_hash: "289bbea70f967e663243d025bd17d2282a393cd3a51c2fccfc60ce3ac6ea0154",
            signature: "866a2708f6e42611d8b51bf5cc3f6bfb94f57b8abbbbf5478d9d9f14b7ea1724",
        },
        GoldenVector {
            name: "empty text payload",
            payload: r#""""#,
            previous_hash: None,
            sequence_number: 0,
            content_bytes: "a3677061796c6f6164606d70726576696f75735f68617368f66f73657175656e63655f6e756d62657200",
            block_hash: "b2ba85eebcaf7aaa88e435e5fade9d9dab329630876cc6401d60df79c2a27614",
            signature: "8ce615ee64d79cf6c9fdcb054e959a6313f4f4c662327e1cf64957e5b52ee606",
        },
        GoldenVector {
            name: "structured payload with unsorted keys",
            payload: r#"{"text": "hi", "author": "alice", "ts": 1736870400000}"#,
            previous_hash: None,
            sequence_number: 0,
            content_bytes: "a3677061796c6f6164a36274731b00000194658b1000647465787462686966617574686f7265616c6963656d70726576696f75735f68617368f66f73657175656e63655f6e756d62657200",
            block_hash: "d64b6357857b77560b1f15c0dc1104eb48b1b46f860a0fb3c980862a4f6d220d",
            signature: "58e960cfd5cca657a30db2df4edff42969d6ad083be7c68ebad28b9ef9831e29",
        },
        GoldenVector {
            name: "multi-byte sequence number",
            payload: r#""late""#,
            previous_hash: Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            sequence_number: 1000,
            content_bytes: "a3677061796c6f6164646c6174656d70726576696f75735f686173687840616161616161616161616161616161616161616161616161616161616161616161616161616161616161616161616161616161616161616161616161616161616f73657175656e63655f6e756d6265721903e8",
            block_hash: "72f4dc52475ff7c58495def399aa54741e1743c7414ae7ebd02b563d19bb26db",
            signature: "c65e20d54809be938569942d7143ceef4aeedfe5e9dd53d96ca0b4e118564d37",
        },
    ]
}

/// The key all vectors are signed with.
pub fn golden_key() -> SigningKey {
    SigningKey::from_passphrase(GOLDEN_KEY)
}

fn parse_inputs(vector: &GoldenVector) -> Result<(Value, Option<Digest>), CoreError> {
    let payload = serde_json::from_str(vector.payload)
        .map_err(|e| CoreError::Decoding(format!("{}: {}", vector.name, e)))?;
    let previous = vector.previous_hash.map(Digest::from_hex).transpose()?;
    Ok((payload, previous))
}

/// Canonical content bytes for a vector's inputs.
pub fn content_bytes_for(vector: &GoldenVector) -> Result<Vec<u8>, CoreError> {
    let (payload, previous) = parse_inputs(vector)?;
    block_content_bytes(&payload, previous.as_ref(), vector.sequence_number)
}

/// Build and sign the block a vector describes.
pub fn block_from_vector(vector: &GoldenVector) -> Result<Block<Value>, CoreError> {
    let (payload, previous) = parse_inputs(vector)?;

    let mut builder = BlockBuilder::new(vector.sequence_number, payload);
    if let Some(prev) = previous {
        builder = builder.previous(prev);
    }
    builder.sign(&golden_key())
}

/// Check every vector against this implementation.
///
/// Returns `(name, matches, computed block hash)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| match block_from_vector(v) {
            Ok(block) => {
                let hex = block.block_hash.to_hex();
                let matches = hex == v.block_hash && block.signature.to_hex() == v.signature;
                (v.name.to_string(), matches, hex)
            }
            Err(e) => (v.name.to_string(), false, e.to_string()),
        })
        .collect()
}

/// All vectors as pretty JSON, for other implementations to check against.
pub fn vectors_json() -> String {
    serde_json::to_string_pretty(&all_vectors()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_bytes_match() {
        for vector in all_vectors() {
            let bytes = content_bytes_for(&vector).unwrap();
            assert_eq!(
                hex::encode(bytes),
                vector.content_bytes,
                "vector '{}' encoded differently",
                vector.name
            );
        }
    }

    #[test]
    fn test_hashes_and_signatures_match() {
        for (name, matches, computed) in verify_all_vectors() {
            assert!(matches, "vector '{}' computed {}", name, computed);
        }
    }

    #[test]
    fn test_vectors_chain() {
        let vectors = all_vectors();
        assert_eq!(vectors[1].previous_hash, Some(vectors[0].block_hash));
    }

    #[test]
    fn test_signatures_need_the_key() {
        let vector = &all_vectors()[0];
        let block = block_from_vector(vector).unwrap();

        assert!(block.verify_signature(&golden_key()).unwrap());
        assert!(!block
            .verify_signature(&SigningKey::from_passphrase("wrong"))
            .unwrap());
    }

    #[test]
    fn test_vectors_json_roundtrip_fields() {
        let json: serde_json::Value = serde_json::from_str(&vectors_json()).unwrap();
        let first = &json[0];
        assert_eq!(first["sequence_number"], 0);
        assert_eq!(first["block_hash"], all_vectors()[0].block_hash);
        assert!(first["previous_hash"].is_null());
    }
}
