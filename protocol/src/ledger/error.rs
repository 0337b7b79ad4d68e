use thiserror::Error;

use super::state::StateRef;
use crate::crypto::AccordPublicKey;

/// A structural rule of the ledger model was broken while constructing a
/// state, a command or a transaction proposal. Always fatal and always
/// raised before anything touches the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// A state must name at least one participant.
    #[error("ledger state has no participants")]
    NoParticipants,

    /// The same key appears twice in a state's participant list.
    #[error("duplicate participant {key}")]
    DuplicateParticipant { key: AccordPublicKey },

    /// A command must be authorised by at least one key.
    #[error("command has no required signers")]
    NoSigners,

    /// A transaction must create at least one state.
    #[error("transaction has no outputs")]
    EmptyOutputs,

    /// A required signer is not a participant of any output.
    #[error("signer {key} is not a participant of any output")]
    SignerNotParticipant { key: AccordPublicKey },

    /// The same prior state is consumed twice by one transaction.
    #[error("input {state_ref} appears more than once")]
    DuplicateInput { state_ref: StateRef },
}
