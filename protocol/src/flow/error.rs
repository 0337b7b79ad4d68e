//! Error types for the commit protocol.
//!
//! [`BuildError`] covers everything that can go wrong before the first
//! session is opened. [`FlowError`] is what a protocol instance returns
//! when it ends anywhere other than `Committed`.

use thiserror::Error;

use super::message::RejectionReason;
use crate::contract::ConstraintViolation;
use crate::identity::Party;
use crate::ledger::{ConstraintError, StateRef};
use crate::network::SessionError;
use crate::storage::CheckpointError;
use crate::transaction::{SignatureSetError, TxId, VerificationError};

/// The proposal could not be drafted. Fatal, raised before any network
/// traffic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The builder refused the inputs, outputs or command.
    #[error("malformed proposal: {0}")]
    Constraint(#[from] ConstraintError),

    /// The contracts of the output states refused the proposal.
    #[error("contract verification failed: {0}")]
    Contract(#[from] ConstraintViolation),

    /// The identity service knows no notary.
    #[error("no notary available")]
    NoNotary,

    /// The proposer itself is not among the required signers.
    #[error("{0} is not a required signer of its own proposal")]
    NotARequiredSigner(Party),

    /// Appending the proposer's signature failed.
    #[error("self-signing failed: {0}")]
    Signing(#[from] SignatureSetError),
}

/// Why a protocol instance did not commit.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Drafting failed; no session was opened.
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    /// A counterparty refused to sign.
    #[error("rejected by {party}: {reason}")]
    Rejected {
        party: Party,
        reason: RejectionReason,
    },

    /// A counterparty did not answer within the session timeout.
    #[error("timed out waiting for {party}")]
    Timeout { party: Party },

    /// The notary reports that an input was already consumed.
    #[error("double spend: {} input(s) already consumed by {consumed_by}", conflicts.len())]
    DoubleSpend {
        conflicts: Vec<StateRef>,
        consumed_by: TxId,
    },

    /// The notary could not be reached.
    #[error("notary unavailable: {0}")]
    NotaryUnavailable(String),

    /// The notary refused the transaction for a reason other than a
    /// conflict.
    #[error("notary refused transaction: {0}")]
    NotaryRejected(String),

    /// A finality notice names a different transaction than the one signed.
    #[error("identity mismatch: signed {expected}, finalised {got}")]
    IdentityMismatch { expected: TxId, got: TxId },

    /// A counterparty replied with a signature that does not check out.
    #[error("invalid signature from {party}: {reason}")]
    CounterpartySignatureInvalid { party: Party, reason: String },

    /// The notary's attestation on a result does not verify.
    #[error("invalid notary signature: {0}")]
    NotarySignatureInvalid(VerificationError),

    /// The transaction's own signatures failed verification.
    #[error("transaction verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// A message arrived that the current state does not accept.
    #[error("unexpected {got} message from {party}")]
    UnexpectedMessage { party: Party, got: &'static str },

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A checkpoint could not be turned back into a running instance.
    #[error("cannot resume flow: {0}")]
    Resume(String),
}

impl FlowError {
    /// Whether a caller may reasonably start a fresh instance and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlowError::Rejected { .. }
                | FlowError::Timeout { .. }
                | FlowError::NotaryUnavailable(_)
                | FlowError::Session(_)
        )
    }

    /// Protocol-integrity faults that point at a bug in a collaborator and
    /// must not be retried blindly.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FlowError::IdentityMismatch { .. } | FlowError::NotarySignatureInvalid(_)
        )
    }
}
