//! Identifier and signature value types shared by the transaction module.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{AccordKeypair, AccordPublicKey, AccordSignature};

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// Transaction identifier: double SHA-256 of the proposal's canonical
/// bytes. Signatures never contribute to it, so the id is fixed from the
/// moment the proposal is built.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId([u8; 32]);

impl TxId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({}..)", &self.to_hex()[..12])
    }
}

// ---------------------------------------------------------------------------
// TransactionSignature
// ---------------------------------------------------------------------------

/// A signature over a [`TxId`] together with the key that produced it.
///
/// Parties and notaries sign the raw 32 id bytes, so a signature is valid
/// for exactly one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: AccordPublicKey,
    pub signature: AccordSignature,
}

impl TransactionSignature {
    pub fn create(keypair: &AccordKeypair, tx_id: &TxId) -> Self {
        Self {
            by: keypair.public_key(),
            signature: crate::crypto::sign(keypair, tx_id.as_bytes()),
        }
    }

    pub fn is_valid_for(&self, tx_id: &TxId) -> bool {
        crate::crypto::verify(&self.by, tx_id.as_bytes(), &self.signature)
    }
}
