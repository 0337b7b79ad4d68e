//! # Ledger Model
//!
//! Pure data describing what a transaction proposes: the states it
//! creates, the states it consumes and the commands that authorise it.
//! Nothing in here talks to the network or touches storage.

pub mod command;
pub mod error;
pub mod state;

pub use command::{Command, CommandKind};
pub use error::ConstraintError;
pub use state::{LedgerState, StateRef};
