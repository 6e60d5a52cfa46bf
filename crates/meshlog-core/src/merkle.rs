//! Merkle roots over ordered block hashes.
//!
//! Each level pairs adjacent nodes and hashes the concatenation of their
//! lowercase hex forms. An unpaired last node is paired with itself.

use crate::crypto::hash;
use crate::types::Digest;

/// Compute the Merkle root of an ordered list of hashes.
///
/// Returns `None` for an empty list and the single hash for a one-element
/// list.
pub fn merkle_root(hashes: &[Digest]) -> Option<Digest> {
    if hashes.is_empty() {
        return None;
    }

    let mut level = hashes.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                combine(left, right)
            })
            .collect();
    }

    level.pop()
}

/// Hex rendering of [`merkle_root`]; the empty list renders as `""`.
pub fn merkle_root_hex(hashes: &[Digest]) -> String {
    merkle_root(hashes).map(|d| d.to_hex()).unwrap_or_default()
}

fn combine(left: &Digest, right: &Digest) -> Digest {
    let mut joined = String::with_capacity(128);
    joined.push_str(&left.to_hex());
    joined.push_str(&right.to_hex());
    hash(joined.as_bytes())
}
