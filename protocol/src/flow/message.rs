//! Wire messages exchanged on a flow session.
//!
//! A session with a signer carries at most three messages:
//!
//! ```text
//! proposer                     responder
//!    | -- Proposal(stx) ------------> |
//!    | <-- Signature(sig) | Reject -- |
//!    | -- Finalized(result) | Abort -> |
//! ```
//!
//! A participant whose key is not required gets `Observe` in place of the
//! proposal and then waits for the outcome.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::transaction::{NotarizedTransaction, SignedTransaction, TransactionSignature, TxId};

/// Unique identifier of one protocol instance. Also the checkpoint key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowId(Uuid);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowId({})", self.0)
    }
}

/// Why a responder refused to sign. Sent back to the proposer verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// A business rule failed (contract or validator).
    ConstraintViolation(String),
    /// A signature on the proposal did not verify.
    SignatureInvalid(String),
}

impl RejectionReason {
    pub fn message(&self) -> &str {
        match self {
            RejectionReason::ConstraintViolation(m) | RejectionReason::SignatureInvalid(m) => m,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::ConstraintViolation(m) => write!(f, "constraint violation: {m}"),
            RejectionReason::SignatureInvalid(m) => write!(f, "signature invalid: {m}"),
        }
    }
}

/// Everything that can travel on a flow session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMessage {
    /// Proposer -> responder: the transaction with the signatures so far.
    Proposal(SignedTransaction),
    /// Proposer -> non-signing participant: wait for the outcome of `tx_id`.
    Observe { tx_id: TxId },
    /// Responder -> proposer: the responder's signature over the id.
    Signature(TransactionSignature),
    /// Responder -> proposer: refusal to sign.
    Reject(RejectionReason),
    /// Proposer -> responder: the notarised result.
    Finalized(NotarizedTransaction),
    /// Proposer -> responder: the instance aborted; stop waiting.
    Abort { reason: String },
}

impl FlowMessage {
    /// Short name for logs and unexpected-message errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowMessage::Proposal(_) => "Proposal",
            FlowMessage::Observe { .. } => "Observe",
            FlowMessage::Signature(_) => "Signature",
            FlowMessage::Reject(_) => "Reject",
            FlowMessage::Finalized(_) => "Finalized",
            FlowMessage::Abort { .. } => "Abort",
        }
    }
}
