//! Signed and notarised transactions.

use serde::{Deserialize, Serialize};

use super::builder::TransactionProposal;
use super::signing::{PartialSignatureSet, SignatureSetError};
use super::types::{TransactionSignature, TxId};
use super::verification::VerificationError;
use crate::crypto::AccordPublicKey;
use crate::identity::Party;

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// A proposal together with the signatures collected for it so far.
///
/// This is what travels between proposer and responders. Adding a
/// signature produces a new value; an existing one is never altered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    proposal: TransactionProposal,
    signatures: PartialSignatureSet,
}

impl SignedTransaction {
    /// A proposal with no signatures yet.
    pub fn unsigned(proposal: TransactionProposal) -> Self {
        Self {
            proposal,
            signatures: PartialSignatureSet::new(),
        }
    }

    pub fn proposal(&self) -> &TransactionProposal {
        &self.proposal
    }

    pub fn signatures(&self) -> &PartialSignatureSet {
        &self.signatures
    }

    pub fn id(&self) -> TxId {
        self.proposal.id()
    }

    pub fn notary(&self) -> &Party {
        self.proposal.notary()
    }

    /// Copy of `self` with `sig` appended.
    pub fn with_signature(&self, sig: TransactionSignature) -> Result<Self, SignatureSetError> {
        let mut next = self.clone();
        next.signatures.insert(sig)?;
        Ok(next)
    }

    /// Copy of `self` with every signature in `other` merged in.
    pub fn with_signatures(&self, other: &PartialSignatureSet) -> Result<Self, SignatureSetError> {
        let mut next = self.clone();
        next.signatures.merge(other)?;
        Ok(next)
    }

    /// Required keys without a signature, in command order.
    pub fn missing_signers(&self) -> Vec<AccordPublicKey> {
        self.proposal
            .required_signers()
            .into_iter()
            .filter(|k| !self.signatures.contains(k))
            .collect()
    }

    /// Every required key has a signature. Does not check validity; see
    /// [`verify_fully_signed`](super::verify_fully_signed).
    pub fn is_fully_signed(&self) -> bool {
        self.missing_signers().is_empty()
    }
}

// ---------------------------------------------------------------------------
// NotarizedTransaction
// ---------------------------------------------------------------------------

/// The terminal artifact of a successful run: a fully signed transaction
/// plus the notary's attestation that none of its inputs was consumed
/// before. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizedTransaction {
    transaction: SignedTransaction,
    notary_signature: TransactionSignature,
}

impl NotarizedTransaction {
    pub fn new(transaction: SignedTransaction, notary_signature: TransactionSignature) -> Self {
        Self {
            transaction,
            notary_signature,
        }
    }

    pub fn id(&self) -> TxId {
        self.transaction.id()
    }

    pub fn transaction(&self) -> &SignedTransaction {
        &self.transaction
    }

    pub fn notary_signature(&self) -> &TransactionSignature {
        &self.notary_signature
    }

    /// The attestation is by the transaction's designated notary and
    /// verifies against the id.
    pub fn verify_notary_signature(&self) -> Result<(), VerificationError> {
        let notary_key = *self.transaction.notary().public_key();
        if self.notary_signature.by != notary_key {
            return Err(VerificationError::UnexpectedSigner {
                key: self.notary_signature.by,
            });
        }
        if !self.notary_signature.is_valid_for(&self.id()) {
            return Err(VerificationError::InvalidSignature { key: notary_key });
        }
        Ok(())
    }
}
