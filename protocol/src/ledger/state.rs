use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::error::ConstraintError;
use crate::identity::Party;
use crate::transaction::TxId;

/// Pointer to output `index` of transaction `tx_id`. This is what a
/// consuming transaction lists as an input and what the notary tracks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl StateRef {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tx_id, self.index)
    }
}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateRef({})", self)
    }
}

/// A proposed ledger record.
///
/// The participant list is ordered, non-empty and free of duplicates; the
/// payload is opaque to the protocol and interpreted only by the contract
/// named in `contract_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    contract_id: String,
    participants: Vec<Party>,
    payload: Vec<u8>,
}

impl LedgerState {
    pub fn new(
        contract_id: impl Into<String>,
        participants: Vec<Party>,
        payload: Vec<u8>,
    ) -> Result<Self, ConstraintError> {
        if participants.is_empty() {
            return Err(ConstraintError::NoParticipants);
        }
        let mut seen = HashSet::with_capacity(participants.len());
        for p in &participants {
            if !seen.insert(*p.public_key()) {
                return Err(ConstraintError::DuplicateParticipant {
                    key: *p.public_key(),
                });
            }
        }
        Ok(Self {
            contract_id: contract_id.into(),
            participants,
            payload,
        })
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn participants(&self) -> &[Party] {
        &self.participants
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_participant(&self, party: &Party) -> bool {
        self.participants.contains(party)
    }
}
