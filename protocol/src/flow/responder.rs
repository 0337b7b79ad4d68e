//! # Responder
//!
//! The counterparty side of one protocol instance.
//!
//! ```text
//! AwaitingProposal -> Validating -> Signed -> AwaitingFinality -> Committed
//!        |                |                        |
//!        |                +--> Rejected            +--> Aborted
//!        +--> Aborted
//! ```
//!
//! A responder signs only after its own validation passes and never signs
//! anything it has not validated. After signing it waits for the notarised
//! result with no deadline: the proposer either finalises or sends an
//! abort notice. A participant that is not asked to sign is sent `Observe`
//! and goes straight to that wait.

use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::FlowError;
use super::hub::ServiceHub;
use super::message::{FlowId, FlowMessage, RejectionReason};
use crate::contract::Validator;
use crate::network::FlowSession;
use crate::storage::{Checkpoint, FlowState};
use crate::transaction::{
    verify_fully_signed, verify_signatures, NotarizedTransaction, SignedTransaction,
    TransactionSignature, TxId, VerificationError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponderState {
    AwaitingProposal,
    Validating { stx: SignedTransaction },
    Signed { stx: SignedTransaction },
    Rejected { reason: RejectionReason },
    AwaitingFinality { tx_id: TxId },
    Committed { result: NotarizedTransaction },
    Aborted { reason: String },
}

impl ResponderState {
    pub fn label(&self) -> &'static str {
        match self {
            ResponderState::AwaitingProposal => "AwaitingProposal",
            ResponderState::Validating { .. } => "Validating",
            ResponderState::Signed { .. } => "Signed",
            ResponderState::Rejected { .. } => "Rejected",
            ResponderState::AwaitingFinality { .. } => "AwaitingFinality",
            ResponderState::Committed { .. } => "Committed",
            ResponderState::Aborted { .. } => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResponderState::Rejected { .. }
                | ResponderState::Committed { .. }
                | ResponderState::Aborted { .. }
        )
    }
}

/// How a responder instance ended, when it ended cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderOutcome {
    Committed(NotarizedTransaction),
    /// We refused to sign.
    Rejected(RejectionReason),
    /// The proposer gave up.
    Aborted(String),
}

pub struct ResponderFlow {
    flow_id: FlowId,
    hub: ServiceHub,
    session: Arc<dyn FlowSession>,
    validator: Arc<dyn Validator>,
    state: ResponderState,
}

impl ResponderFlow {
    pub fn new(
        hub: ServiceHub,
        session: Arc<dyn FlowSession>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            flow_id: session.flow_id(),
            hub,
            session,
            validator,
            state: ResponderState::AwaitingProposal,
        }
    }

    /// Attach a fresh session to an existing checkpoint for the same flow
    /// id. Starts from `AwaitingProposal` when there is none.
    pub fn resume(
        hub: ServiceHub,
        session: Arc<dyn FlowSession>,
        validator: Arc<dyn Validator>,
    ) -> Result<Self, FlowError> {
        let mut flow = Self::new(hub, session, validator);
        if let Some(checkpoint) = flow.hub.checkpoints.load(&flow.flow_id)? {
            let FlowState::Responder(state) = checkpoint.state else {
                return Err(FlowError::Resume(format!(
                    "checkpoint {} belongs to a proposer",
                    flow.flow_id
                )));
            };
            info!(flow_id = %flow.flow_id, state = state.label(), "resuming responder");
            flow.state = state;
        }
        Ok(flow)
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    pub fn state(&self) -> &ResponderState {
        &self.state
    }

    pub async fn run(mut self) -> Result<ResponderOutcome, FlowError> {
        debug!(flow_id = %self.flow_id, proposer = %self.session.counterparty(), state = self.state.label(), "responder started");
        while !self.state.is_terminal() {
            let next = match self.advance().await {
                Ok(next) => next,
                Err(e) => return Err(self.abort(e)),
            };
            if let Err(e) = self.transition(next) {
                return Err(self.abort(e));
            }
        }

        Ok(match self.state {
            ResponderState::Committed { result } => ResponderOutcome::Committed(result),
            ResponderState::Rejected { reason } => ResponderOutcome::Rejected(reason),
            ResponderState::Aborted { reason } => ResponderOutcome::Aborted(reason),
            other => {
                return Err(FlowError::Resume(format!(
                    "responder stopped in {}",
                    other.label()
                )))
            }
        })
    }

    async fn advance(&mut self) -> Result<ResponderState, FlowError> {
        match self.state.clone() {
            ResponderState::AwaitingProposal => {
                let message = timeout(self.hub.config.session_timeout, self.session.receive())
                    .await
                    .map_err(|_| FlowError::Timeout {
                        party: self.session.counterparty().clone(),
                    })??;
                match message {
                    FlowMessage::Proposal(stx) => Ok(ResponderState::Validating { stx }),
                    FlowMessage::Observe { tx_id } => {
                        debug!(flow_id = %self.flow_id, %tx_id, "observing");
                        Ok(ResponderState::AwaitingFinality { tx_id })
                    }
                    // A resumed proposer whose observe notice was lost.
                    FlowMessage::Finalized(result) => {
                        self.check_finality(&result, &result.id())?;
                        Ok(ResponderState::Committed { result })
                    }
                    FlowMessage::Abort { reason } => Ok(ResponderState::Aborted { reason }),
                    other => Err(self.unexpected(&other)),
                }
            }
            ResponderState::Validating { stx } => match self.validate(&stx) {
                Ok(()) => Ok(ResponderState::Signed { stx }),
                Err(reason) => {
                    info!(flow_id = %self.flow_id, tx_id = %stx.id(), %reason, "refusing to sign");
                    if let Err(e) = self.session.send(FlowMessage::Reject(reason.clone())).await {
                        debug!(flow_id = %self.flow_id, error = %e, "rejection not delivered");
                    }
                    Ok(ResponderState::Rejected { reason })
                }
            },
            ResponderState::Signed { stx } => {
                let tx_id = stx.id();
                let sig = TransactionSignature::create(&self.hub.keypair, &tx_id);
                // The proposer may already have aborted; its notice is still
                // waiting on the session.
                if let Err(e) = self.session.send(FlowMessage::Signature(sig)).await {
                    debug!(flow_id = %self.flow_id, error = %e, "signature not delivered");
                }
                debug!(flow_id = %self.flow_id, %tx_id, "signed");
                Ok(ResponderState::AwaitingFinality { tx_id })
            }
            ResponderState::AwaitingFinality { tx_id } => match self.session.receive().await? {
                FlowMessage::Finalized(result) => {
                    self.check_finality(&result, &tx_id)?;
                    Ok(ResponderState::Committed { result })
                }
                FlowMessage::Abort { reason } => Ok(ResponderState::Aborted { reason }),
                // A resumed proposer that lost our signature asks again.
                FlowMessage::Proposal(stx) if stx.id() == tx_id => {
                    Ok(ResponderState::Signed { stx })
                }
                FlowMessage::Observe { tx_id: id } if id == tx_id => {
                    Ok(ResponderState::AwaitingFinality { tx_id })
                }
                other => Err(self.unexpected(&other)),
            },
            terminal => Err(FlowError::Resume(format!(
                "no transition out of {}",
                terminal.label()
            ))),
        }
    }

    /// Checks run in a fixed order; the first failure is reported.
    fn validate(&self, stx: &SignedTransaction) -> Result<(), RejectionReason> {
        let proposer = self.session.counterparty();
        if !stx.signatures().contains(proposer.public_key()) {
            return Err(RejectionReason::SignatureInvalid(format!(
                "proposal is not signed by {proposer}"
            )));
        }
        verify_signatures(stx, &stx.missing_signers())
            .map_err(|e| RejectionReason::SignatureInvalid(e.to_string()))?;

        let me = self.hub.me();
        if !stx.proposal().required_signers().contains(me.public_key()) {
            return Err(RejectionReason::ConstraintViolation(format!(
                "{me} is not a required signer"
            )));
        }
        if !self.hub.identity.is_notary(stx.notary()) {
            return Err(RejectionReason::ConstraintViolation(format!(
                "unknown notary {}",
                stx.notary()
            )));
        }
        self.hub
            .contracts
            .verify(stx.proposal())
            .map_err(|v| RejectionReason::ConstraintViolation(v.reason))?;
        self.validator
            .check_transaction(stx)
            .map_err(|v| RejectionReason::ConstraintViolation(v.reason))
    }

    fn check_finality(&self, result: &NotarizedTransaction, expected: &TxId) -> Result<(), FlowError> {
        let got = result.id();
        if &got != expected {
            return Err(FlowError::IdentityMismatch {
                expected: *expected,
                got,
            });
        }
        result
            .verify_notary_signature()
            .map_err(FlowError::NotarySignatureInvalid)?;
        let notary = result.transaction().notary();
        if !self.hub.identity.is_notary(notary) {
            return Err(FlowError::NotarySignatureInvalid(
                VerificationError::UnexpectedSigner {
                    key: *notary.public_key(),
                },
            ));
        }
        verify_fully_signed(result.transaction())?;
        Ok(())
    }

    fn unexpected(&self, message: &FlowMessage) -> FlowError {
        FlowError::UnexpectedMessage {
            party: self.session.counterparty().clone(),
            got: message.kind(),
        }
    }

    fn transition(&mut self, next: ResponderState) -> Result<(), FlowError> {
        debug!(flow_id = %self.flow_id, from = self.state.label(), to = next.label(), "responder transition");
        self.state = next;
        match &self.state {
            ResponderState::Committed { result } => {
                info!(flow_id = %self.flow_id, tx_id = %result.id(), "responder committed");
            }
            ResponderState::Aborted { reason } => {
                info!(flow_id = %self.flow_id, %reason, "proposer aborted");
            }
            _ => {}
        }
        if self.state.is_terminal() {
            self.drop_checkpoint();
            return Ok(());
        }
        self.hub.checkpoints.save(&Checkpoint::new(
            self.flow_id,
            FlowState::Responder(self.state.clone()),
        ))?;
        Ok(())
    }

    fn drop_checkpoint(&self) {
        if let Err(e) = self.hub.checkpoints.remove(&self.flow_id) {
            warn!(flow_id = %self.flow_id, error = %e, "failed to remove finished checkpoint");
        }
    }

    fn abort(&mut self, err: FlowError) -> FlowError {
        warn!(flow_id = %self.flow_id, state = self.state.label(), error = %err, "responder failed");
        self.state = ResponderState::Aborted {
            reason: err.to_string(),
        };
        self.drop_checkpoint();
        err
    }
}
