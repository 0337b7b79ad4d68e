//! # IOU Contract
//!
//! An IOU records that `borrower` owes `lender` an amount in some currency.
//! The state travels as a [`LedgerState`] whose payload is the JSON
//! encoding of an [`IouState`].
//!
//! Only issuance is supported. An issue transaction:
//!
//! 1. consumes nothing,
//! 2. creates exactly one IOU with a positive amount and nothing paid,
//! 3. names two different parties as lender and borrower,
//! 4. is signed by exactly the lender and the borrower.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use accord_protocol::contract::{ConstraintViolation, ContractVerifier, Validator};
use accord_protocol::crypto::AccordPublicKey;
use accord_protocol::flow::ProposalRequest;
use accord_protocol::identity::Party;
use accord_protocol::ledger::{Command, CommandKind, ConstraintError, LedgerState};
use accord_protocol::requirement;
use accord_protocol::transaction::{SignedTransaction, TransactionProposal};

/// Contract id carried by every IOU ledger state.
pub const IOU_CONTRACT_ID: &str = "accord.contracts.iou";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IouError {
    /// The ledger state belongs to another contract.
    #[error("state belongs to contract {0}, not accord.contracts.iou")]
    WrongContract(String),

    #[error("malformed iou payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The ledger state's participants are not `[lender, borrower]`.
    #[error("participants do not match lender and borrower")]
    ParticipantMismatch,

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IouState {
    pub lender: Party,
    pub borrower: Party,
    /// Face value in minor units.
    pub amount: u64,
    pub currency: String,
    /// Amount repaid so far, in minor units.
    pub paid: u64,
    /// Stable identity of this debt across future transactions.
    pub linear_id: Uuid,
}

impl IouState {
    /// A fresh, unpaid IOU with a new linear id.
    pub fn new(lender: Party, borrower: Party, amount: u64, currency: impl Into<String>) -> Self {
        Self {
            lender,
            borrower,
            amount,
            currency: currency.into(),
            paid: 0,
            linear_id: Uuid::new_v4(),
        }
    }

    pub fn participants(&self) -> Vec<Party> {
        vec![self.lender.clone(), self.borrower.clone()]
    }

    pub fn to_ledger_state(&self) -> Result<LedgerState, IouError> {
        let payload = serde_json::to_vec(self)?;
        Ok(LedgerState::new(IOU_CONTRACT_ID, self.participants(), payload)?)
    }

    pub fn from_ledger_state(state: &LedgerState) -> Result<Self, IouError> {
        if state.contract_id() != IOU_CONTRACT_ID {
            return Err(IouError::WrongContract(state.contract_id().to_string()));
        }
        let iou: IouState = serde_json::from_slice(state.payload())?;
        if state.participants() != iou.participants().as_slice() {
            return Err(IouError::ParticipantMismatch);
        }
        Ok(iou)
    }

    /// The request a lender runs to issue this IOU.
    pub fn issue_request(&self) -> Result<ProposalRequest, IouError> {
        Ok(ProposalRequest::issue(self.to_ledger_state()?)?)
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Contract rules for IOU states. Register under [`IOU_CONTRACT_ID`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IouContract;

impl IouContract {
    fn verify_issue(
        proposal: &TransactionProposal,
        command: &Command,
    ) -> Result<(), ConstraintViolation> {
        requirement!(
            proposal.inputs().is_empty(),
            "no inputs should be consumed when issuing an iou"
        );
        requirement!(
            proposal.outputs().len() == 1,
            "only one output state should be created when issuing an iou"
        );
        let iou = IouState::from_ledger_state(&proposal.outputs()[0])
            .map_err(|e| ConstraintViolation::new(format!("output is not an iou: {e}")))?;
        requirement!(iou.amount > 0, "a newly issued iou must have a positive amount");
        requirement!(iou.paid == 0, "a newly issued iou must not be paid");
        requirement!(
            iou.lender != iou.borrower,
            "the lender and borrower cannot be the same party"
        );

        let mut expected: Vec<AccordPublicKey> =
            iou.participants().iter().map(|p| *p.public_key()).collect();
        let mut actual = command.signers().to_vec();
        expected.sort();
        actual.sort();
        requirement!(
            expected == actual,
            "the lender and borrower together only must sign an iou issue transaction"
        );
        Ok(())
    }
}

impl ContractVerifier for IouContract {
    fn verify(&self, proposal: &TransactionProposal) -> Result<(), ConstraintViolation> {
        for command in proposal.commands() {
            match command.kind() {
                CommandKind::Issue => Self::verify_issue(proposal, command)?,
                other => {
                    return Err(ConstraintViolation::new(format!(
                        "unsupported iou command {other}"
                    )))
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Responder check
// ---------------------------------------------------------------------------

/// What a borrower checks before co-signing an issuance: the transaction
/// creates a single IOU, optionally no larger than a configured limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct IouIssueValidator {
    max_amount: Option<u64>,
}

impl IouIssueValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse IOUs whose amount is above `max_amount`.
    pub fn with_max_amount(mut self, max_amount: u64) -> Self {
        self.max_amount = Some(max_amount);
        self
    }
}

impl Validator for IouIssueValidator {
    fn check_transaction(&self, stx: &SignedTransaction) -> Result<(), ConstraintViolation> {
        let outputs = stx.proposal().outputs();
        let iou = match outputs {
            [only] => IouState::from_ledger_state(only).ok(),
            _ => None,
        };
        let Some(iou) = iou else {
            return Err(ConstraintViolation::new("this must be an IOU transaction"));
        };
        if let Some(limit) = self.max_amount {
            requirement!(
                iou.amount <= limit,
                "bad amount: {} {} exceeds the limit of {}",
                iou.amount,
                iou.currency,
                limit
            );
        }
        Ok(())
    }
}
