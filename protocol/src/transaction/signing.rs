//! Signature collection.
//!
//! [`PartialSignatureSet`] holds at most one signature per public key and
//! only ever grows. Entries are kept sorted by key, so two sets holding the
//! same signatures are equal however they were assembled: merging replies
//! in any arrival order gives the same result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::builder::TransactionProposal;
use super::types::TransactionSignature;
use crate::crypto::{AccordKeypair, AccordPublicKey};

/// A second, different signature was offered for a key that already has
/// one. Existing signatures are never overwritten.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("conflicting signature for key {key}")]
pub struct SignatureSetError {
    pub key: AccordPublicKey,
}

/// Signatures collected so far, keyed by signer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignatureSet {
    entries: Vec<TransactionSignature>,
}

impl PartialSignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `sig`. Returns `Ok(true)` when the key was new, `Ok(false)`
    /// when the identical signature was already present.
    pub fn insert(&mut self, sig: TransactionSignature) -> Result<bool, SignatureSetError> {
        match self.entries.binary_search_by(|e| e.by.cmp(&sig.by)) {
            Ok(pos) if self.entries[pos] == sig => Ok(false),
            Ok(_) => Err(SignatureSetError { key: sig.by }),
            Err(pos) => {
                self.entries.insert(pos, sig);
                Ok(true)
            }
        }
    }

    /// Union of two sets. Fails, leaving `self` untouched, if both hold
    /// different signatures for the same key.
    pub fn merge(&mut self, other: &PartialSignatureSet) -> Result<(), SignatureSetError> {
        let mut merged = self.clone();
        for sig in &other.entries {
            merged.insert(sig.clone())?;
        }
        *self = merged;
        Ok(())
    }

    pub fn get(&self, key: &AccordPublicKey) -> Option<&TransactionSignature> {
        self.entries
            .binary_search_by(|e| e.by.cmp(key))
            .ok()
            .map(|pos| &self.entries[pos])
    }

    pub fn contains(&self, key: &AccordPublicKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AccordPublicKey> {
        self.entries.iter().map(|e| &e.by)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionSignature> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sign a proposal's id with `keypair`.
pub fn sign_proposal(proposal: &TransactionProposal, keypair: &AccordKeypair) -> TransactionSignature {
    TransactionSignature::create(keypair, &proposal.id())
}
