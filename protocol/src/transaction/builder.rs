//! Transaction proposal construction.
//!
//! [`TransactionBuilder`] collects inputs, outputs and commands and checks
//! the structural rules in [`TransactionBuilder::build`]; the free function
//! [`build`] is the single-command shorthand used by the proposer. Neither
//! signs, and neither reads any ambient state: the same arguments always
//! give the same proposal and the same [`TxId`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::types::TxId;
use crate::config::TX_ID_DOMAIN;
use crate::crypto::hash::double_sha256;
use crate::crypto::AccordPublicKey;
use crate::identity::Party;
use crate::ledger::{Command, ConstraintError, LedgerState, StateRef};

// ---------------------------------------------------------------------------
// TransactionProposal
// ---------------------------------------------------------------------------

/// An unsigned transaction: what is consumed, what is created, who must
/// authorise it and which notary will finalise it.
///
/// # Canonical Byte Format
///
/// [`signable_bytes`](Self::signable_bytes) is a length-prefixed
/// little-endian encoding of, in order: the domain tag, inputs, outputs
/// (contract id, participant names and keys, payload), commands (kind tag,
/// signer keys) and the notary. The [`TxId`] is the double SHA-256 of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionProposal {
    inputs: Vec<StateRef>,
    outputs: Vec<LedgerState>,
    commands: Vec<Command>,
    notary: Party,
}

impl TransactionProposal {
    pub fn inputs(&self) -> &[StateRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[LedgerState] {
        &self.outputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn notary(&self) -> &Party {
        &self.notary
    }

    /// Every key any command requires, first-seen order, no duplicates.
    pub fn required_signers(&self) -> Vec<AccordPublicKey> {
        let mut keys: Vec<AccordPublicKey> = Vec::new();
        for key in self.commands.iter().flat_map(|c| c.signers()) {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
        keys
    }

    /// Participants across all outputs, in declaration order, no duplicates.
    /// These are the parties the proposer has to contact.
    pub fn participants(&self) -> Vec<Party> {
        let mut parties: Vec<Party> = Vec::new();
        for p in self.outputs.iter().flat_map(|s| s.participants()) {
            if !parties.contains(p) {
                parties.push(p.clone());
            }
        }
        parties
    }

    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);
        put_bytes(&mut buf, TX_ID_DOMAIN);

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.tx_id.as_bytes());
            buf.extend_from_slice(&input.index.to_le_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            put_bytes(&mut buf, output.contract_id().as_bytes());
            buf.extend_from_slice(&(output.participants().len() as u32).to_le_bytes());
            for p in output.participants() {
                put_party(&mut buf, p);
            }
            put_bytes(&mut buf, output.payload());
        }

        buf.extend_from_slice(&(self.commands.len() as u32).to_le_bytes());
        for command in &self.commands {
            buf.push(command.kind().tag());
            buf.extend_from_slice(&(command.signers().len() as u32).to_le_bytes());
            for key in command.signers() {
                buf.extend_from_slice(key.as_bytes());
            }
        }

        put_party(&mut buf, &self.notary);
        buf
    }

    pub fn id(&self) -> TxId {
        TxId::from_bytes(double_sha256(&self.signable_bytes()))
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn put_party(buf: &mut Vec<u8>, party: &Party) {
    put_bytes(buf, party.name().as_bytes());
    buf.extend_from_slice(party.public_key().as_bytes());
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`TransactionProposal`].
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    notary: Party,
    inputs: Vec<StateRef>,
    outputs: Vec<LedgerState>,
    commands: Vec<Command>,
}

impl TransactionBuilder {
    pub fn new(notary: Party) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn add_input(mut self, state_ref: StateRef) -> Self {
        self.inputs.push(state_ref);
        self
    }

    pub fn add_output(mut self, state: LedgerState) -> Self {
        self.outputs.push(state);
        self
    }

    pub fn add_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Check the structural rules and produce the proposal.
    ///
    /// # Errors
    ///
    /// - [`ConstraintError::EmptyOutputs`] when nothing is created.
    /// - [`ConstraintError::SignerNotParticipant`] when a command requires a
    ///   key that no output lists as a participant.
    /// - [`ConstraintError::DuplicateInput`] when a state is consumed twice.
    /// - [`ConstraintError::NoSigners`] when there is no command at all.
    pub fn build(self) -> Result<TransactionProposal, ConstraintError> {
        if self.outputs.is_empty() {
            return Err(ConstraintError::EmptyOutputs);
        }
        if self.commands.is_empty() {
            return Err(ConstraintError::NoSigners);
        }

        let mut seen = HashSet::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !seen.insert(*input) {
                return Err(ConstraintError::DuplicateInput { state_ref: *input });
            }
        }

        let participant_keys: HashSet<&AccordPublicKey> = self
            .outputs
            .iter()
            .flat_map(|s| s.participants())
            .map(|p| p.public_key())
            .collect();
        for key in self.commands.iter().flat_map(|c| c.signers()) {
            if !participant_keys.contains(key) {
                return Err(ConstraintError::SignerNotParticipant { key: *key });
            }
        }

        Ok(TransactionProposal {
            inputs: self.inputs,
            outputs: self.outputs,
            commands: self.commands,
            notary: self.notary,
        })
    }
}

/// `build(inputs, outputs, command, notary)`: one command, checked.
pub fn build(
    inputs: Vec<StateRef>,
    outputs: Vec<LedgerState>,
    command: Command,
    notary: Party,
) -> Result<TransactionProposal, ConstraintError> {
    let builder = inputs
        .into_iter()
        .fold(TransactionBuilder::new(notary), |b, i| b.add_input(i));
    outputs
        .into_iter()
        .fold(builder, |b, o| b.add_output(o))
        .add_command(command)
        .build()
}
