//! # Cryptographic Primitives
//!
//! Ed25519 for every signature in the protocol (party co-signatures and
//! notary attestations) and SHA-256 for transaction ids. Everything here is
//! a typed wrapper around audited implementations; nothing is hand-rolled.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{double_sha256, sha256};
pub use keys::{AccordKeypair, AccordPublicKey, AccordSignature, KeyError};
pub use signatures::{sign, verify};
