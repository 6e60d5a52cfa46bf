//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Floats always encoded as 64-bit IEEE 754
//!
//! Every peer must derive the same bytes (and thus the same block hash) for
//! the same logical content, whatever order its serializer emits fields in.

use ciborium::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::Digest;

/// Field names of the hashed and signed block envelopes.
mod keys {
    pub const BLOCK_HASH: &str = "block_hash";
    pub const PAYLOAD: &str = "payload";
    pub const PREVIOUS_HASH: &str = "previous_hash";
    pub const SEQUENCE_NUMBER: &str = "sequence_number";
}

/// Convert any serializable value into a CBOR value tree.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, CoreError> {
    Value::serialized(value).map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Serialize a value to canonical CBOR bytes.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CoreError> {
    encode_canonical(&to_value(value)?)
}

/// Decode CBOR bytes into a typed value.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CoreError> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::Decoding(e.to_string()))
}

/// The bytes a block hash is computed over.
///
/// `{"payload": .., "previous_hash": hex | null, "sequence_number": n}`
pub fn block_content_bytes<T: Serialize + ?Sized>(
    payload: &T,
    previous_hash: Option<&Digest>,
    sequence_number: u64,
) -> Result<Vec<u8>, CoreError> {
    let previous = match previous_hash {
        Some(hash) => Value::Text(hash.to_hex()),
        None => Value::Null,
    };

    let entries = vec![
        (Value::Text(keys::PAYLOAD.into()), to_value(payload)?),
        (Value::Text(keys::PREVIOUS_HASH.into()), previous),
        (
            Value::Text(keys::SEQUENCE_NUMBER.into()),
            Value::Integer(sequence_number.into()),
        ),
    ];

    encode_canonical(&Value::Map(entries))
}

/// The bytes a block signature is computed over.
///
/// `{"block_hash": hex, "payload": .., "sequence_number": n}`
pub fn signing_bytes<T: Serialize + ?Sized>(
    block_hash: &Digest,
    payload: &T,
    sequence_number: u64,
) -> Result<Vec<u8>, CoreError> {
    let entries = vec![
        (
            Value::Text(keys::BLOCK_HASH.into()),
            Value::Text(block_hash.to_hex()),
        ),
        (Value::Text(keys::PAYLOAD.into()), to_value(payload)?),
        (
            Value::Text(keys::SEQUENCE_NUMBER.into()),
            Value::Integer(sequence_number.into()),
        ),
    ];

    encode_canonical(&Value::Map(entries))
}

/// Encode a CBOR Value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        other => {
            return Err(CoreError::Encoding(format!(
                "unsupported CBOR value: {:?}",
                other
            )))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<(), CoreError> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item)?;
    }
    Ok(())
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison. Duplicate keys are
/// rejected.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CoreError::Encoding("duplicate map key".into()));
    }

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
