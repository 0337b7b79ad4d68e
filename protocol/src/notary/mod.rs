//! # Notary
//!
//! The notary is the single arbiter of state consumption. Its contract with
//! the protocol is narrow: given a fully signed transaction it either
//! attests (signs the id) or reports which inputs were already consumed
//! by another transaction.
//!
//! [`SimpleNotary`] is a validating, in-memory uniqueness provider: it
//! checks signatures before committing and keeps the consumed-input map
//! behind one lock, so conflicting transactions are serialised and at
//! most one of them wins.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::AccordKeypair;
use crate::identity::Party;
use crate::ledger::StateRef;
use crate::transaction::{verify_fully_signed, SignedTransaction, TransactionSignature, TxId};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Outcomes of a notarisation request other than success.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotaryError {
    /// One or more inputs were already consumed by a different,
    /// already-notarised transaction.
    #[error("double spend: {} input(s) already consumed by {consumed_by}", conflicts.len())]
    DoubleSpend {
        conflicts: Vec<StateRef>,
        consumed_by: TxId,
    },

    /// The notary could not be reached. Transient.
    #[error("notary unavailable: {0}")]
    Unavailable(String),

    /// The notary refused to look at the transaction at all (wrong notary,
    /// missing or invalid signatures).
    #[error("transaction rejected by notary: {0}")]
    InvalidTransaction(String),
}

/// Notary collaborator.
#[async_trait]
pub trait NotaryService: Send + Sync {
    /// The party whose key signs attestations.
    fn identity(&self) -> Party;

    /// Attest that none of `stx`'s inputs has been consumed before, and mark
    /// them consumed. Re-submitting a transaction that was already accepted
    /// returns the same attestation.
    async fn notarize(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError>;
}

// ---------------------------------------------------------------------------
// SimpleNotary
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UniquenessLedger {
    /// Input -> transaction that consumed it.
    consumed: HashMap<StateRef, TxId>,
    /// Accepted transaction -> the attestation handed out for it.
    committed: HashMap<TxId, TransactionSignature>,
}

/// In-memory validating notary.
pub struct SimpleNotary {
    identity: Party,
    keypair: AccordKeypair,
    ledger: Mutex<UniquenessLedger>,
}

impl SimpleNotary {
    pub fn new(name: impl Into<String>, keypair: AccordKeypair) -> Self {
        Self {
            identity: Party::from_keypair(name, &keypair),
            keypair,
            ledger: Mutex::new(UniquenessLedger::default()),
        }
    }

    /// The transaction that consumed `state_ref`, if any.
    pub fn consumed_by(&self, state_ref: &StateRef) -> Option<TxId> {
        self.ledger.lock().consumed.get(state_ref).copied()
    }

    /// Number of transactions accepted so far.
    pub fn committed_count(&self) -> usize {
        self.ledger.lock().committed.len()
    }

    fn commit(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError> {
        let id = stx.id();
        let mut ledger = self.ledger.lock();

        if let Some(existing) = ledger.committed.get(&id) {
            debug!(tx_id = %id, "transaction already notarised, returning stored attestation");
            return Ok(existing.clone());
        }

        let mut conflicts = Vec::new();
        let mut consumed_by = None;
        for input in stx.proposal().inputs() {
            if let Some(other) = ledger.consumed.get(input) {
                conflicts.push(*input);
                consumed_by.get_or_insert(*other);
            }
        }
        if let Some(consumed_by) = consumed_by {
            warn!(tx_id = %id, %consumed_by, conflicts = conflicts.len(), "double spend refused");
            return Err(NotaryError::DoubleSpend {
                conflicts,
                consumed_by,
            });
        }

        for input in stx.proposal().inputs() {
            ledger.consumed.insert(*input, id);
        }
        let attestation = TransactionSignature::create(&self.keypair, &id);
        ledger.committed.insert(id, attestation.clone());
        info!(tx_id = %id, inputs = stx.proposal().inputs().len(), "transaction notarised");
        Ok(attestation)
    }
}

#[async_trait]
impl NotaryService for SimpleNotary {
    fn identity(&self) -> Party {
        self.identity.clone()
    }

    async fn notarize(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError> {
        if stx.notary() != &self.identity {
            return Err(NotaryError::InvalidTransaction(format!(
                "transaction names notary {}, not {}",
                stx.notary(),
                self.identity
            )));
        }
        verify_fully_signed(stx).map_err(|e| NotaryError::InvalidTransaction(e.to_string()))?;
        self.commit(stx)
    }
}
