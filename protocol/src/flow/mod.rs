//! # Flow Module
//!
//! The distributed commit protocol: one proposer collects a signature
//! from every required signer of a transaction, hands the fully signed
//! transaction to a notary and announces the notarised result.
//!
//! ```text
//! message.rs   : FlowId, FlowMessage, RejectionReason
//! error.rs     : BuildError, FlowError
//! hub.rs       : ServiceHub: the collaborators an instance runs against
//! proposer.rs  : ProposerFlow state machine
//! responder.rs : ResponderFlow state machine
//! finality.rs  : FinalityCoordinator: notarise and distribute
//! dispatcher.rs: runs a responder per inbound session
//! ```
//!
//! ## Guarantees
//!
//! - Every party that signs has validated the transaction first.
//! - Nothing is submitted to the notary until every required signature is
//!   present and valid.
//! - Any rejection or timeout aborts the whole instance; there are no
//!   partial commits.
//! - The notary rejects a second transaction spending the same input, so
//!   at most one of two racing instances commits.

pub mod dispatcher;
pub mod error;
pub mod finality;
pub mod hub;
pub mod message;
pub mod proposer;
pub mod responder;

pub use dispatcher::{ResponderDispatcher, ResponderReport};
pub use error::{BuildError, FlowError};
pub use finality::{notify_abort, FinalityCoordinator};
pub use hub::ServiceHub;
pub use message::{FlowId, FlowMessage, RejectionReason};
pub use proposer::{ProposalRequest, ProposerFlow, ProposerState};
pub use responder::{ResponderFlow, ResponderOutcome, ResponderState};
