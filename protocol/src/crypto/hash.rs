//! # Hashing Utilities
//!
//! SHA-256 based digests. Transaction ids are `SHA-256(SHA-256(bytes))`
//! over a canonical encoding, which keeps them independent of whatever
//! serialization format a transport or checkpoint store happens to use.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}
