use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ConstraintError;
use crate::crypto::AccordPublicKey;

/// The action a transaction performs on its states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Create new states with no prior consumed state.
    Issue,
    /// Consume states and re-create them with new owners or terms.
    Move,
    /// Consume states and retire them.
    Settle,
}

impl CommandKind {
    /// Stable tag for the canonical transaction encoding.
    pub fn tag(&self) -> u8 {
        match self {
            CommandKind::Issue => 0x01,
            CommandKind::Move => 0x02,
            CommandKind::Settle => 0x03,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Issue => write!(f, "Issue"),
            CommandKind::Move => write!(f, "Move"),
            CommandKind::Settle => write!(f, "Settle"),
        }
    }
}

/// An action tag plus the keys that must sign for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    kind: CommandKind,
    signers: Vec<AccordPublicKey>,
}

impl Command {
    /// Duplicate signer keys are collapsed, keeping first-seen order.
    pub fn new(kind: CommandKind, signers: Vec<AccordPublicKey>) -> Result<Self, ConstraintError> {
        let mut unique = Vec::with_capacity(signers.len());
        for key in signers {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        if unique.is_empty() {
            return Err(ConstraintError::NoSigners);
        }
        Ok(Self {
            kind,
            signers: unique,
        })
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn signers(&self) -> &[AccordPublicKey] {
        &self.signers
    }
}
