//! # Contract Constraints
//!
//! Two seams for business rules:
//!
//! - [`ContractVerifier`] checks a proposal against the rules of the
//!   contracts its states belong to. Both proposer (before signing) and
//!   responder (before co-signing) run it.
//! - [`Validator`] is the responder's own extra check, supplied by whoever
//!   starts the responder. It sees the whole signed transaction.
//!
//! Both fail with a [`ConstraintViolation`] carrying a human-readable
//! reason that is sent back to the proposer verbatim.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::transaction::{SignedTransaction, TransactionProposal};

/// A business rule rejected the transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}")]
pub struct ConstraintViolation {
    pub reason: String,
}

impl ConstraintViolation {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// `requirement!(cond, "message")` returns a [`ConstraintViolation`] from the
/// enclosing function when `cond` is false.
#[macro_export]
macro_rules! requirement {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err($crate::contract::ConstraintViolation::new(format!($($msg)+)));
        }
    };
}

/// Contract-constraint collaborator.
pub trait ContractVerifier: Send + Sync {
    fn verify(&self, proposal: &TransactionProposal) -> Result<(), ConstraintViolation>;
}

/// Responder-side acceptance check.
pub trait Validator: Send + Sync {
    fn check_transaction(&self, stx: &SignedTransaction) -> Result<(), ConstraintViolation>;
}

impl<F> Validator for F
where
    F: Fn(&SignedTransaction) -> Result<(), ConstraintViolation> + Send + Sync,
{
    fn check_transaction(&self, stx: &SignedTransaction) -> Result<(), ConstraintViolation> {
        self(stx)
    }
}

/// Accepts everything. For flows whose states carry no contract rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ContractVerifier for AcceptAll {
    fn verify(&self, _proposal: &TransactionProposal) -> Result<(), ConstraintViolation> {
        Ok(())
    }
}

impl Validator for AcceptAll {
    fn check_transaction(&self, _stx: &SignedTransaction) -> Result<(), ConstraintViolation> {
        Ok(())
    }
}

/// Dispatches each output to the verifier registered for its contract id.
/// A proposal with an output whose contract is unknown is rejected.
#[derive(Default, Clone)]
pub struct ContractRegistry {
    verifiers: Vec<(String, Arc<dyn ContractVerifier>)>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, contract_id: impl Into<String>, verifier: Arc<dyn ContractVerifier>) -> Self {
        self.verifiers.push((contract_id.into(), verifier));
        self
    }

    fn lookup(&self, contract_id: &str) -> Option<&Arc<dyn ContractVerifier>> {
        self.verifiers
            .iter()
            .find(|(id, _)| id == contract_id)
            .map(|(_, v)| v)
    }
}

impl ContractVerifier for ContractRegistry {
    fn verify(&self, proposal: &TransactionProposal) -> Result<(), ConstraintViolation> {
        let mut checked: Vec<&str> = Vec::new();
        for output in proposal.outputs() {
            let id = output.contract_id();
            if checked.contains(&id) {
                continue;
            }
            let verifier = self
                .lookup(id)
                .ok_or_else(|| ConstraintViolation::new(format!("unknown contract {id}")))?;
            verifier.verify(proposal)?;
            checked.push(id);
        }
        Ok(())
    }
}
