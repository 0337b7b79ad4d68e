//! # Proposer
//!
//! Drives one transaction from request to notarised record.
//!
//! ```text
//! Drafting -> SelfSigned -> CollectingSignatures -> FullySigned -> Submitting -> Committed
//!     |                             |                                  |
//!     +-----------------------------+----------------------------------+--> Aborted
//! ```
//!
//! The current state is a plain serialisable enum and is checkpointed on
//! every transition and after every accepted counterparty signature, so an
//! instance can be rebuilt with [`ProposerFlow::resume`] after a restart.
//!
//! Abort semantics: the first rejection, timeout or notary conflict ends
//! the instance. Outstanding receives are dropped (a reply that arrives
//! afterwards is never read) and every open session gets an abort notice.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::error::{BuildError, FlowError};
use super::finality::{notify_abort, FinalityCoordinator};
use super::hub::ServiceHub;
use super::message::{FlowId, FlowMessage};
use crate::crypto::AccordPublicKey;
use crate::identity::Party;
use crate::ledger::{Command, CommandKind, ConstraintError, LedgerState, StateRef};
use crate::network::FlowSession;
use crate::storage::{Checkpoint, FlowState};
use crate::transaction::{
    build, sign_proposal, verify_fully_signed, NotarizedTransaction, SignedTransaction,
    TransactionSignature, TxId,
};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// What the caller wants recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub inputs: Vec<StateRef>,
    pub outputs: Vec<LedgerState>,
    pub command: Command,
}

impl ProposalRequest {
    /// Issue `state`: no inputs, one `Issue` command signed by every
    /// participant.
    pub fn issue(state: LedgerState) -> Result<Self, ConstraintError> {
        let signers = state.participants().iter().map(|p| *p.public_key()).collect();
        Ok(Self {
            inputs: Vec::new(),
            command: Command::new(CommandKind::Issue, signers)?,
            outputs: vec![state],
        })
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposerState {
    Drafting {
        request: ProposalRequest,
    },
    SelfSigned {
        stx: SignedTransaction,
    },
    CollectingSignatures {
        stx: SignedTransaction,
        contacts: Vec<Party>,
    },
    FullySigned {
        stx: SignedTransaction,
        contacts: Vec<Party>,
    },
    Submitting {
        stx: SignedTransaction,
        contacts: Vec<Party>,
        /// Notarisation attempts already made.
        attempts: u32,
    },
    Committed {
        result: NotarizedTransaction,
    },
    Aborted {
        reason: String,
    },
}

impl ProposerState {
    pub fn label(&self) -> &'static str {
        match self {
            ProposerState::Drafting { .. } => "Drafting",
            ProposerState::SelfSigned { .. } => "SelfSigned",
            ProposerState::CollectingSignatures { .. } => "CollectingSignatures",
            ProposerState::FullySigned { .. } => "FullySigned",
            ProposerState::Submitting { .. } => "Submitting",
            ProposerState::Committed { .. } => "Committed",
            ProposerState::Aborted { .. } => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposerState::Committed { .. } | ProposerState::Aborted { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// ProposerFlow
// ---------------------------------------------------------------------------

pub struct ProposerFlow {
    flow_id: FlowId,
    hub: ServiceHub,
    state: ProposerState,
    /// Open sessions, in contact order.
    sessions: Vec<Arc<dyn FlowSession>>,
}

impl ProposerFlow {
    pub fn new(hub: ServiceHub, request: ProposalRequest) -> Self {
        Self {
            flow_id: FlowId::new(),
            hub,
            state: ProposerState::Drafting { request },
            sessions: Vec::new(),
        }
    }

    /// Rebuild an instance from its checkpoint. Sessions are re-opened
    /// under the same flow id when the instance next needs them.
    pub fn resume(hub: ServiceHub, flow_id: FlowId) -> Result<Self, FlowError> {
        let checkpoint = hub
            .checkpoints
            .load(&flow_id)?
            .ok_or_else(|| FlowError::Resume(format!("no checkpoint for {flow_id}")))?;
        let FlowState::Proposer(state) = checkpoint.state else {
            return Err(FlowError::Resume(format!(
                "checkpoint {flow_id} belongs to a responder"
            )));
        };
        info!(%flow_id, state = state.label(), "resuming proposer");
        Ok(Self {
            flow_id,
            hub,
            state,
            sessions: Vec::new(),
        })
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    pub fn state(&self) -> &ProposerState {
        &self.state
    }

    /// Run to a terminal state.
    pub async fn run(mut self) -> Result<NotarizedTransaction, FlowError> {
        if self.state.is_terminal() {
            return Err(FlowError::Resume(format!(
                "flow {} already finished in {}",
                self.flow_id,
                self.state.label()
            )));
        }
        info!(flow_id = %self.flow_id, state = self.state.label(), "proposer started");
        if let Err(e) = self.save_checkpoint(&self.state) {
            return Err(self.abort(e).await);
        }

        loop {
            let next = match self.advance().await {
                Ok(next) => next,
                Err(e) => return Err(self.abort(e).await),
            };
            if let Err(e) = self.transition(next) {
                return Err(self.abort(e).await);
            }
            if let ProposerState::Committed { result } = &self.state {
                info!(flow_id = %self.flow_id, tx_id = %result.id(), "proposer committed");
                return Ok(result.clone());
            }
        }
    }

    async fn advance(&mut self) -> Result<ProposerState, FlowError> {
        match self.state.clone() {
            ProposerState::Drafting { request } => {
                let stx = self.draft(&request)?;
                info!(flow_id = %self.flow_id, tx_id = %stx.id(), "proposal built and self-signed");
                Ok(ProposerState::SelfSigned { stx })
            }
            ProposerState::SelfSigned { stx } => {
                let contacts = self.contacts(&stx);
                if contacts.is_empty() {
                    return Ok(ProposerState::FullySigned { stx, contacts });
                }
                self.open_sessions(&contacts).await?;
                Ok(ProposerState::CollectingSignatures { stx, contacts })
            }
            ProposerState::CollectingSignatures { stx, contacts } => {
                self.open_sessions(&contacts).await?;
                let stx = self.collect_signatures(stx, &contacts).await?;
                info!(flow_id = %self.flow_id, tx_id = %stx.id(), "fully signed");
                Ok(ProposerState::FullySigned { stx, contacts })
            }
            ProposerState::FullySigned { stx, contacts } => {
                verify_fully_signed(&stx)?;
                Ok(ProposerState::Submitting {
                    stx,
                    contacts,
                    attempts: 0,
                })
            }
            ProposerState::Submitting {
                stx,
                contacts,
                attempts,
            } => self.submit(stx, contacts, attempts).await,
            terminal => Err(FlowError::Resume(format!(
                "no transition out of {}",
                terminal.label()
            ))),
        }
    }

    fn draft(&self, request: &ProposalRequest) -> Result<SignedTransaction, BuildError> {
        let notary = self
            .hub
            .identity
            .notaries()
            .into_iter()
            .next()
            .ok_or(BuildError::NoNotary)?;
        let proposal = build(
            request.inputs.clone(),
            request.outputs.clone(),
            request.command.clone(),
            notary,
        )?;
        self.hub.contracts.verify(&proposal)?;

        if !proposal.required_signers().contains(&self.our_key()) {
            return Err(BuildError::NotARequiredSigner(self.hub.me()));
        }
        let own = sign_proposal(&proposal, &self.hub.keypair);
        Ok(SignedTransaction::unsigned(proposal).with_signature(own)?)
    }

    /// Combined participants minus ourselves, in declaration order.
    fn contacts(&self, stx: &SignedTransaction) -> Vec<Party> {
        let us = self.our_key();
        stx.proposal()
            .participants()
            .into_iter()
            .filter(|p| p.public_key() != &us)
            .collect()
    }

    async fn open_sessions(&mut self, contacts: &[Party]) -> Result<(), FlowError> {
        for party in contacts {
            if self.session_for(party).is_none() {
                let session = self.hub.messaging.open(self.flow_id, party).await?;
                self.sessions.push(session);
            }
        }
        Ok(())
    }

    fn session_for(&self, party: &Party) -> Option<&Arc<dyn FlowSession>> {
        self.sessions.iter().find(|s| s.counterparty() == party)
    }

    /// Fan out the proposal to every contact whose signature is still
    /// missing and fan the replies back in, in whatever order they arrive.
    /// Contacts that are participants but not signers are sent `Observe`
    /// first and afterwards only told the outcome.
    async fn collect_signatures(
        &self,
        stx: SignedTransaction,
        contacts: &[Party],
    ) -> Result<SignedTransaction, FlowError> {
        let id = stx.id();
        self.announce_to_observers(&stx, contacts).await;

        let missing = stx.missing_signers();
        let mut pending = FuturesUnordered::new();
        for party in contacts {
            if !missing.contains(party.public_key()) {
                continue;
            }
            let session = self.session_for(party).ok_or_else(|| {
                FlowError::Resume(format!("no open session for {party}"))
            })?;
            let proposal = stx.clone();
            pending.push(async move {
                let reply = self.request_signature(session, proposal).await;
                (session.counterparty().clone(), reply)
            });
        }

        debug!(flow_id = %self.flow_id, tx_id = %id, outstanding = pending.len(), "collecting signatures");
        let mut collected = stx;
        while let Some((party, reply)) = pending.next().await {
            let sig = reply?;
            check_counterparty_signature(&party, &sig, &id, &missing)?;
            collected = collected.with_signature(sig).map_err(|e| {
                FlowError::CounterpartySignatureInvalid {
                    party: party.clone(),
                    reason: e.to_string(),
                }
            })?;
            debug!(flow_id = %self.flow_id, %party, remaining = pending.len(), "signature received");
            self.save_checkpoint(&ProposerState::CollectingSignatures {
                stx: collected.clone(),
                contacts: contacts.to_vec(),
            })?;
        }
        Ok(collected)
    }

    /// Best-effort: an observer that misses this still accepts `Finalized`.
    async fn announce_to_observers(&self, stx: &SignedTransaction, contacts: &[Party]) {
        let required = stx.proposal().required_signers();
        let tx_id = stx.id();
        for party in contacts.iter().filter(|p| !required.contains(p.public_key())) {
            let Some(session) = self.session_for(party) else {
                continue;
            };
            if let Err(e) = session.send(FlowMessage::Observe { tx_id }).await {
                warn!(flow_id = %self.flow_id, %party, error = %e, "observe notice not delivered");
            }
        }
    }

    async fn request_signature(
        &self,
        session: &Arc<dyn FlowSession>,
        stx: SignedTransaction,
    ) -> Result<TransactionSignature, FlowError> {
        let party = session.counterparty().clone();
        session.send(FlowMessage::Proposal(stx)).await?;
        let reply = timeout(self.hub.config.session_timeout, session.receive())
            .await
            .map_err(|_| FlowError::Timeout {
                party: party.clone(),
            })??;
        match reply {
            FlowMessage::Signature(sig) => Ok(sig),
            FlowMessage::Reject(reason) => Err(FlowError::Rejected { party, reason }),
            other => Err(FlowError::UnexpectedMessage {
                party,
                got: other.kind(),
            }),
        }
    }

    async fn submit(
        &mut self,
        stx: SignedTransaction,
        contacts: Vec<Party>,
        attempts: u32,
    ) -> Result<ProposerState, FlowError> {
        // After a resume the sessions are gone; reopen them so the outcome
        // can still be announced. Failing to reach a party does not stop
        // notarisation.
        let mut reopened = Vec::new();
        for party in &contacts {
            if self.session_for(party).is_none() {
                match self.hub.messaging.open(self.flow_id, party).await {
                    Ok(session) => {
                        self.sessions.push(session);
                        reopened.push(party.clone());
                    }
                    Err(e) => warn!(flow_id = %self.flow_id, %party, error = %e, "could not reopen session"),
                }
            }
        }
        self.announce_to_observers(&stx, &reopened).await;

        let coordinator = FinalityCoordinator::new(Arc::clone(&self.hub.notary));
        match coordinator.submit(&stx).await {
            Ok(result) => {
                coordinator.distribute(&result, &self.sessions).await;
                Ok(ProposerState::Committed { result })
            }
            Err(FlowError::NotaryUnavailable(reason))
                if attempts + 1 < self.hub.config.notary_max_attempts =>
            {
                warn!(
                    flow_id = %self.flow_id,
                    attempt = attempts + 1,
                    max_attempts = self.hub.config.notary_max_attempts,
                    %reason,
                    "notary unavailable, retrying"
                );
                sleep(self.hub.config.notary_retry_backoff).await;
                Ok(ProposerState::Submitting {
                    stx,
                    contacts,
                    attempts: attempts + 1,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn transition(&mut self, next: ProposerState) -> Result<(), FlowError> {
        debug!(flow_id = %self.flow_id, from = self.state.label(), to = next.label(), "proposer transition");
        self.state = next;
        if self.state.is_terminal() {
            self.drop_checkpoint();
            Ok(())
        } else {
            self.save_checkpoint(&self.state)
        }
    }

    fn save_checkpoint(&self, state: &ProposerState) -> Result<(), FlowError> {
        self.hub.checkpoints.save(&Checkpoint::new(
            self.flow_id,
            FlowState::Proposer(state.clone()),
        ))?;
        Ok(())
    }

    fn drop_checkpoint(&self) {
        if let Err(e) = self.hub.checkpoints.remove(&self.flow_id) {
            warn!(flow_id = %self.flow_id, error = %e, "failed to remove finished checkpoint");
        }
    }

    async fn abort(&mut self, err: FlowError) -> FlowError {
        warn!(flow_id = %self.flow_id, state = self.state.label(), error = %err, "proposer aborted");
        let reason = err.to_string();
        notify_abort(&self.sessions, &reason).await;
        self.sessions.clear();
        self.state = ProposerState::Aborted { reason };
        self.drop_checkpoint();
        err
    }

    fn our_key(&self) -> AccordPublicKey {
        self.hub.keypair.public_key()
    }
}

fn check_counterparty_signature(
    party: &Party,
    sig: &TransactionSignature,
    id: &TxId,
    expected_keys: &[AccordPublicKey],
) -> Result<(), FlowError> {
    let reason = if &sig.by != party.public_key() {
        "signed with a key that does not belong to the party"
    } else if !expected_keys.contains(&sig.by) {
        "not a required signer"
    } else if !sig.is_valid_for(id) {
        "signature does not verify"
    } else {
        return Ok(());
    };
    Err(FlowError::CounterpartySignatureInvalid {
        party: party.clone(),
        reason: reason.to_string(),
    })
}
