//! Cryptographic primitives for Meshlog.
//!
//! SHA-256 content hashing and HMAC-SHA256 block signatures, wrapped in
//! strong types.

use hmac::{Hmac, Mac};
use sha2::{Digest as _, Sha256};
use std::fmt;

use crate::types::{hex_bytes_newtype, Digest};

type HmacSha256 = Hmac<Sha256>;

/// Compute the SHA-256 digest of the given data.
pub fn hash(data: &[u8]) -> Digest {
    Digest(Sha256::digest(data).into())
}

/// A 32-byte HMAC-SHA256 tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 32]);

hex_bytes_newtype!(Signature, "Sig");

/// Secret key for HMAC block signatures.
///
/// Every peer of a chain shares the same key; it authenticates membership,
/// not individual authors.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    /// Generate a new random 32-byte key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create from raw key material. HMAC accepts keys of any length.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Use the UTF-8 bytes of a shared passphrase as the key.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self::from_bytes(passphrase.as_bytes())
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.bytes).expect("HMAC can take key of any size")
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED; {}])", self.bytes.len())
    }
}

/// Sign a message with HMAC-SHA256.
pub fn sign(message: &[u8], key: &SigningKey) -> Signature {
    let mut mac = key.mac();
    mac.update(message);
    Signature(mac.finalize().into_bytes().into())
}

/// Verify an HMAC-SHA256 tag in constant time.
pub fn verify(message: &[u8], signature: &Signature, key: &SigningKey) -> bool {
    let mut mac = key.mac();
    mac.update(message);
    mac.verify_slice(signature.as_bytes()).is_ok()
}
