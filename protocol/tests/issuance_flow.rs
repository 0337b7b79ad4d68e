//! End-to-end tests for the commit protocol.
//!
//! Each test builds its own in-process network: a shared network map, one
//! reference notary and a set of nodes, each with its own checkpoint store.
//! Responders run behind a [`ResponderDispatcher`] exactly as a node would
//! run them, and every outcome is read back from the dispatcher's reports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Notify};

use accord_protocol::config::FlowConfig;
use accord_protocol::contract::{AcceptAll, ConstraintViolation, Validator};
use accord_protocol::crypto::AccordKeypair;
use accord_protocol::flow::{
    FinalityCoordinator, FlowError, FlowId, FlowMessage, ProposalRequest, ProposerFlow,
    ProposerState, RejectionReason, ResponderDispatcher, ResponderFlow, ResponderOutcome,
    ResponderReport, ResponderState, ServiceHub,
};
use accord_protocol::identity::{InMemoryIdentityService, NetworkMap, Party};
use accord_protocol::ledger::{Command, CommandKind, LedgerState, StateRef};
use accord_protocol::network::{
    FlowMessaging, FlowSession, InMemoryNetwork, InboundSession, SessionError,
};
use accord_protocol::notary::{NotaryError, NotaryService, SimpleNotary};
use accord_protocol::storage::{Checkpoint, CheckpointStore, FlowState, InMemoryCheckpointStore};
use accord_protocol::transaction::{
    build, sign_proposal, NotarizedTransaction, PartialSignatureSet, SignedTransaction,
    TransactionSignature, TxId,
};

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

const CONTRACT: &str = "test.iou";

struct Node {
    keypair: Arc<AccordKeypair>,
    hub: ServiceHub,
    checkpoints: Arc<InMemoryCheckpointStore>,
    inbox: Option<mpsc::Receiver<InboundSession>>,
}

struct TestNetwork {
    net: Arc<InMemoryNetwork>,
    notary: Arc<SimpleNotary>,
    nodes: HashMap<String, Node>,
    shutdown: watch::Sender<bool>,
}

impl TestNetwork {
    fn new(names: &[&str]) -> Self {
        Self::with_config(names, FlowConfig::default())
    }

    fn with_config(names: &[&str], config: FlowConfig) -> Self {
        let map = Arc::new(NetworkMap::new());
        let net = InMemoryNetwork::new();
        let notary = Arc::new(SimpleNotary::new("Notary", AccordKeypair::generate()));
        map.register_notary(notary.identity());

        let mut nodes = HashMap::new();
        for name in names {
            let keypair = Arc::new(AccordKeypair::generate());
            let party = Party::from_keypair(*name, &keypair);
            let checkpoints = Arc::new(InMemoryCheckpointStore::new());
            let inbox = net.register(&party);
            let hub = ServiceHub {
                keypair: Arc::clone(&keypair),
                identity: Arc::new(InMemoryIdentityService::new(party.clone(), Arc::clone(&map))),
                messaging: Arc::new(net.messaging(party)),
                contracts: Arc::new(AcceptAll),
                notary: notary.clone(),
                checkpoints: checkpoints.clone(),
                config: config.clone(),
            };
            nodes.insert(
                name.to_string(),
                Node {
                    keypair,
                    hub,
                    checkpoints,
                    inbox: Some(inbox),
                },
            );
        }

        let (shutdown, _) = watch::channel(false);
        Self {
            net,
            notary,
            nodes,
            shutdown,
        }
    }

    fn node(&self, name: &str) -> &Node {
        &self.nodes[name]
    }

    fn party(&self, name: &str) -> Party {
        self.node(name).hub.me()
    }

    fn hub(&self, name: &str) -> ServiceHub {
        self.node(name).hub.clone()
    }

    fn take_inbox(&mut self, name: &str) -> mpsc::Receiver<InboundSession> {
        self.nodes
            .get_mut(name)
            .and_then(|n| n.inbox.take())
            .expect("inbox already taken")
    }

    fn start_responder(
        &mut self,
        name: &str,
        validator: Arc<dyn Validator>,
    ) -> mpsc::UnboundedReceiver<ResponderReport> {
        let inbox = self.take_inbox(name);
        let dispatcher = ResponderDispatcher::new(self.hub(name), validator);
        let (_handle, reports) = dispatcher.spawn(inbox, self.shutdown.subscribe());
        reports
    }

    fn iou(&self, participants: &[&str], amount: u64) -> LedgerState {
        LedgerState::new(
            CONTRACT,
            participants.iter().map(|n| self.party(n)).collect(),
            amount.to_le_bytes().to_vec(),
        )
        .unwrap()
    }

    fn open_checkpoints(&self, name: &str) -> usize {
        self.node(name).checkpoints.list().unwrap().len()
    }
}

fn accept_all() -> Arc<dyn Validator> {
    Arc::new(AcceptAll)
}

fn reject_with(reason: &'static str) -> Arc<dyn Validator> {
    Arc::new(move |_: &SignedTransaction| -> Result<(), ConstraintViolation> {
        Err(ConstraintViolation::new(reason))
    })
}

async fn next_outcome(
    reports: &mut mpsc::UnboundedReceiver<ResponderReport>,
) -> Result<ResponderOutcome, FlowError> {
    reports.recv().await.expect("dispatcher stopped").outcome
}

fn bytes(result: &NotarizedTransaction) -> Vec<u8> {
    bincode::serialize(result).unwrap()
}

/// Notary double that reports itself unavailable for the first `failures`
/// calls and then delegates.
struct FlakyNotary {
    inner: Arc<SimpleNotary>,
    failures: u32,
    calls: AtomicU32,
}

#[async_trait]
impl NotaryService for FlakyNotary {
    fn identity(&self) -> Party {
        self.inner.identity()
    }

    async fn notarize(&self, stx: &SignedTransaction) -> Result<TransactionSignature, NotaryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(NotaryError::Unavailable("connection refused".into()));
        }
        self.inner.notarize(stx).await
    }
}

/// Session double that holds back outgoing signatures until the test
/// opens the gate. Everything else passes straight through.
struct GatedSession {
    inner: Arc<dyn FlowSession>,
    gate: Arc<Notify>,
}

#[async_trait]
impl FlowSession for GatedSession {
    fn flow_id(&self) -> FlowId {
        self.inner.flow_id()
    }

    fn counterparty(&self) -> &Party {
        self.inner.counterparty()
    }

    async fn send(&self, message: FlowMessage) -> Result<(), SessionError> {
        if matches!(message, FlowMessage::Signature(_)) {
            self.gate.notified().await;
        }
        self.inner.send(message).await
    }

    async fn receive(&self) -> Result<FlowMessage, SessionError> {
        self.inner.receive().await
    }
}

// ---------------------------------------------------------------------------
// 1. Two-Party Issuance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_party_issue_commits_on_both_sides() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let mut q_reports = net.start_responder("Q", accept_all());

    let request = ProposalRequest::issue(net.iou(&["P", "Q"], 10)).unwrap();
    let result = ProposerFlow::new(net.hub("P"), request).run().await.unwrap();

    let q_result = match next_outcome(&mut q_reports).await.unwrap() {
        ResponderOutcome::Committed(r) => r,
        other => panic!("expected commit, got {other:?}"),
    };
    assert_eq!(bytes(&result), bytes(&q_result));
    assert!(result.verify_notary_signature().is_ok());
    assert_eq!(result.transaction().signatures().len(), 2);
    assert_eq!(net.notary.committed_count(), 1);

    assert_eq!(net.open_checkpoints("P"), 0);
    assert_eq!(net.open_checkpoints("Q"), 0);
}

// ---------------------------------------------------------------------------
// 2. N-Party Issuance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_signer_ends_with_the_same_record() {
    let names = ["P", "Q", "R", "S"];
    let mut net = TestNetwork::new(&names);
    let mut reports: Vec<_> = names[1..]
        .iter()
        .map(|n| net.start_responder(n, accept_all()))
        .collect();

    let request = ProposalRequest::issue(net.iou(&names, 99)).unwrap();
    let result = ProposerFlow::new(net.hub("P"), request).run().await.unwrap();
    assert_eq!(result.transaction().signatures().len(), names.len());

    for rx in &mut reports {
        match next_outcome(rx).await.unwrap() {
            ResponderOutcome::Committed(r) => assert_eq!(bytes(&r), bytes(&result)),
            other => panic!("expected commit, got {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Rejection Aborts The Instance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejection_aborts_all_parties_without_commit() {
    let mut net = TestNetwork::new(&["P", "Q", "R"]);
    let mut q_reports = net.start_responder("Q", reject_with("bad amount"));
    let mut r_reports = net.start_responder("R", accept_all());

    let request = ProposalRequest::issue(net.iou(&["P", "Q", "R"], 0)).unwrap();
    let err = ProposerFlow::new(net.hub("P"), request).run().await.unwrap_err();
    match &err {
        FlowError::Rejected { party, reason } => {
            assert_eq!(party, &net.party("Q"));
            assert_eq!(
                reason,
                &RejectionReason::ConstraintViolation("bad amount".into())
            );
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(err.is_retryable());

    assert_eq!(
        next_outcome(&mut q_reports).await.unwrap(),
        ResponderOutcome::Rejected(RejectionReason::ConstraintViolation("bad amount".into()))
    );
    assert!(matches!(
        next_outcome(&mut r_reports).await.unwrap(),
        ResponderOutcome::Aborted(_)
    ));
    assert_eq!(net.notary.committed_count(), 0);
    for name in ["P", "Q", "R"] {
        assert_eq!(net.open_checkpoints(name), 0, "{name} kept a checkpoint");
    }
}

#[tokio::test]
async fn late_signature_after_a_rejection_has_no_effect() {
    let mut net = TestNetwork::new(&["P", "Q", "R"]);
    let mut q_reports = net.start_responder("Q", reject_with("bad amount"));

    // R accepts, but its signature is held back until Q has already refused.
    let mut r_inbox = net.take_inbox("R");
    let gate = Arc::new(Notify::new());
    let r_hub = net.hub("R");
    let r_gate = Arc::clone(&gate);
    let r_task = tokio::spawn(async move {
        let inbound = r_inbox.recv().await.expect("no session for R");
        let session: Arc<dyn FlowSession> = Arc::new(GatedSession {
            inner: inbound.session,
            gate: r_gate,
        });
        ResponderFlow::new(r_hub, session, accept_all()).run().await
    });

    let request = ProposalRequest::issue(net.iou(&["P", "Q", "R"], 7)).unwrap();
    let err = ProposerFlow::new(net.hub("P"), request).run().await.unwrap_err();
    assert!(matches!(&err, FlowError::Rejected { party, .. } if *party == net.party("Q")));

    gate.notify_one();
    let r_outcome = r_task.await.unwrap().unwrap();
    assert!(
        matches!(&r_outcome, ResponderOutcome::Aborted(reason) if reason.contains("bad amount")),
        "unexpected outcome for R: {r_outcome:?}"
    );
    assert!(matches!(
        next_outcome(&mut q_reports).await.unwrap(),
        ResponderOutcome::Rejected(_)
    ));
    assert_eq!(net.notary.committed_count(), 0);
    for name in ["P", "Q", "R"] {
        assert_eq!(net.open_checkpoints(name), 0, "{name} kept a checkpoint");
    }
}

#[tokio::test]
async fn proposal_missing_the_proposers_signature_is_refused() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let mut q_reports = net.start_responder("Q", accept_all());

    // P signs with a key that is not the one the network knows it by.
    let forger = Arc::new(AccordKeypair::generate());
    let mut hub = net.hub("P");
    hub.keypair = Arc::clone(&forger);
    let impostor = Party::from_keypair("P", &forger);
    let request = ProposalRequest {
        inputs: vec![],
        outputs: vec![LedgerState::new(CONTRACT, vec![impostor, net.party("Q")], vec![5]).unwrap()],
        command: Command::new(
            CommandKind::Issue,
            vec![forger.public_key(), *net.party("Q").public_key()],
        )
        .unwrap(),
    };
    let err = ProposerFlow::new(hub, request).run().await.unwrap_err();

    match err {
        FlowError::Rejected { party, reason } => {
            assert_eq!(party, net.party("Q"));
            assert!(matches!(reason, RejectionReason::SignatureInvalid(_)));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(matches!(
        next_outcome(&mut q_reports).await.unwrap(),
        ResponderOutcome::Rejected(RejectionReason::SignatureInvalid(_))
    ));
    assert_eq!(net.notary.committed_count(), 0);
}

#[tokio::test]
async fn forged_proposer_signature_is_refused() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let mut q_reports = net.start_responder("Q", accept_all());

    let proposal = build(
        vec![],
        vec![net.iou(&["P", "Q"], 5)],
        Command::new(
            CommandKind::Issue,
            vec![*net.party("P").public_key(), *net.party("Q").public_key()],
        )
        .unwrap(),
        net.notary.identity(),
    )
    .unwrap();
    // Claims to be P's signature but was made with another key.
    let forged = TransactionSignature {
        by: *net.party("P").public_key(),
        signature: sign_proposal(&proposal, &AccordKeypair::generate()).signature,
    };
    let stx = SignedTransaction::unsigned(proposal)
        .with_signature(forged)
        .unwrap();

    let session = net
        .hub("P")
        .messaging
        .open(FlowId::new(), &net.party("Q"))
        .await
        .unwrap();
    session.send(FlowMessage::Proposal(stx)).await.unwrap();

    match session.receive().await.unwrap() {
        FlowMessage::Reject(RejectionReason::SignatureInvalid(_)) => {}
        other => panic!("expected a signature rejection, got {other:?}"),
    }
    assert!(matches!(
        next_outcome(&mut q_reports).await.unwrap(),
        ResponderOutcome::Rejected(RejectionReason::SignatureInvalid(_))
    ));
    assert_eq!(net.open_checkpoints("Q"), 0);
}

// ---------------------------------------------------------------------------
// 4. Double Spend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn racing_spends_of_one_input_commit_at_most_once() {
    let mut net = TestNetwork::new(&["P", "Q", "R"]);
    let mut q_reports = net.start_responder("Q", accept_all());
    let mut r_reports = net.start_responder("R", accept_all());

    let input = StateRef::new(TxId::from_bytes([7; 32]), 0);
    let spend_to = |to: &str| ProposalRequest {
        inputs: vec![input],
        outputs: vec![net.iou(&["P", to], 5)],
        command: Command::new(
            CommandKind::Move,
            vec![*net.party("P").public_key(), *net.party(to).public_key()],
        )
        .unwrap(),
    };

    let (a, b) = tokio::join!(
        ProposerFlow::new(net.hub("P"), spend_to("Q")).run(),
        ProposerFlow::new(net.hub("P"), spend_to("R")).run(),
    );

    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
        other => panic!("expected exactly one commit, got {other:?}"),
    };
    match loser {
        FlowError::DoubleSpend {
            conflicts,
            consumed_by,
        } => {
            assert_eq!(conflicts, vec![input]);
            assert_eq!(consumed_by, winner.id());
        }
        other => panic!("expected double spend, got {other:?}"),
    }
    assert_eq!(net.notary.consumed_by(&input), Some(winner.id()));

    let q = next_outcome(&mut q_reports).await.unwrap();
    let r = next_outcome(&mut r_reports).await.unwrap();
    let committed = [&q, &r]
        .iter()
        .filter(|o| matches!(o, ResponderOutcome::Committed(_)))
        .count();
    assert_eq!(committed, 1);
    assert!([&q, &r].iter().any(|o| matches!(o, ResponderOutcome::Aborted(_))));
}

// ---------------------------------------------------------------------------
// 5. Signature Sets Merge In Any Order
// ---------------------------------------------------------------------------

#[test]
fn signature_sets_merge_in_any_order() {
    let keys: Vec<AccordKeypair> = (0..3).map(|_| AccordKeypair::generate()).collect();
    let parties: Vec<Party> = keys
        .iter()
        .enumerate()
        .map(|(i, k)| Party::from_keypair(format!("P{i}"), k))
        .collect();
    let proposal = build(
        vec![],
        vec![LedgerState::new(CONTRACT, parties, vec![1]).unwrap()],
        Command::new(CommandKind::Issue, keys.iter().map(|k| k.public_key()).collect()).unwrap(),
        Party::from_keypair("Notary", &AccordKeypair::generate()),
    )
    .unwrap();
    let sigs: Vec<_> = keys.iter().map(|k| sign_proposal(&proposal, k)).collect();

    let mut forward = PartialSignatureSet::new();
    let mut backward = PartialSignatureSet::new();
    for sig in &sigs {
        forward.insert(sig.clone()).unwrap();
    }
    for sig in sigs.iter().rev() {
        backward.insert(sig.clone()).unwrap();
    }
    assert_eq!(forward, backward);
    assert_eq!(
        bincode::serialize(&forward).unwrap(),
        bincode::serialize(&backward).unwrap()
    );

    // Two partially signed copies combine into one fully signed transaction.
    let left = SignedTransaction::unsigned(proposal.clone())
        .with_signature(sigs[0].clone())
        .unwrap();
    let right = SignedTransaction::unsigned(proposal)
        .with_signature(sigs[2].clone())
        .and_then(|s| s.with_signature(sigs[1].clone()))
        .unwrap();
    let merged = left.with_signatures(right.signatures()).unwrap();
    assert!(merged.is_fully_signed());
    assert_eq!(merged, right.with_signatures(left.signatures()).unwrap());
}

// ---------------------------------------------------------------------------
// 6. Idempotent Resubmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resubmitting_a_committed_transaction_returns_the_same_record() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let _q_reports = net.start_responder("Q", accept_all());

    let request = ProposalRequest::issue(net.iou(&["P", "Q"], 3)).unwrap();
    let first = ProposerFlow::new(net.hub("P"), request).run().await.unwrap();

    let coordinator = FinalityCoordinator::new(net.notary.clone());
    let again = coordinator.submit(first.transaction()).await.unwrap();
    assert_eq!(bytes(&first), bytes(&again));
    assert_eq!(net.notary.committed_count(), 1);
}

// ---------------------------------------------------------------------------
// 7. Timeouts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn silent_counterparty_times_out_and_is_told_to_abort() {
    let mut net = TestNetwork::with_config(
        &["P", "Q"],
        FlowConfig::default().with_session_timeout(Duration::from_secs(5)),
    );
    // Q is reachable but never answers.
    let mut q_inbox = net.take_inbox("Q");

    let request = ProposalRequest::issue(net.iou(&["P", "Q"], 1)).unwrap();
    let err = ProposerFlow::new(net.hub("P"), request).run().await.unwrap_err();
    match err {
        FlowError::Timeout { party } => assert_eq!(party, net.party("Q")),
        other => panic!("expected timeout, got {other:?}"),
    }

    let inbound = q_inbox.recv().await.unwrap();
    assert_eq!(inbound.session.receive().await.unwrap().kind(), "Proposal");
    assert_eq!(inbound.session.receive().await.unwrap().kind(), "Abort");
    assert_eq!(net.notary.committed_count(), 0);
    assert_eq!(net.open_checkpoints("P"), 0);
}

#[tokio::test(start_paused = true)]
async fn responder_gives_up_when_no_proposal_arrives() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let mut q_reports = net.start_responder("Q", accept_all());

    // Open a session and then say nothing on it.
    let session = net
        .hub("P")
        .messaging
        .open(FlowId::new(), &net.party("Q"))
        .await
        .unwrap();

    let report = q_reports.recv().await.unwrap();
    assert_eq!(report.initiator, net.party("P"));
    assert!(matches!(report.outcome, Err(FlowError::Timeout { .. })));
    drop(session);
}

// ---------------------------------------------------------------------------
// 8. Notary Availability
// ---------------------------------------------------------------------------

fn with_flaky_notary(net: &TestNetwork, failures: u32) -> (ServiceHub, Arc<FlakyNotary>) {
    let flaky = Arc::new(FlakyNotary {
        inner: net.notary.clone(),
        failures,
        calls: AtomicU32::new(0),
    });
    let client: Arc<dyn NotaryService> = flaky.clone();
    let mut hub = net.hub("P");
    hub.notary = client;
    (hub, flaky)
}

#[tokio::test(start_paused = true)]
async fn transient_notary_outage_is_retried() {
    let mut net = TestNetwork::with_config(&["P", "Q"], FlowConfig::default().with_notary_attempts(3));
    let mut q_reports = net.start_responder("Q", accept_all());
    let (hub, flaky) = with_flaky_notary(&net, 2);

    let request = ProposalRequest::issue(net.iou(&["P", "Q"], 8)).unwrap();
    let result = ProposerFlow::new(hub, request).run().await.unwrap();

    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    assert!(matches!(
        next_outcome(&mut q_reports).await.unwrap(),
        ResponderOutcome::Committed(r) if r == result
    ));
}

#[tokio::test(start_paused = true)]
async fn persistent_notary_outage_aborts_after_the_attempt_limit() {
    let mut net = TestNetwork::with_config(&["P", "Q"], FlowConfig::default().with_notary_attempts(3));
    let mut q_reports = net.start_responder("Q", accept_all());
    let (hub, flaky) = with_flaky_notary(&net, u32::MAX);

    let request = ProposalRequest::issue(net.iou(&["P", "Q"], 8)).unwrap();
    let err = ProposerFlow::new(hub, request).run().await.unwrap_err();

    assert!(matches!(err, FlowError::NotaryUnavailable(_)));
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    assert!(matches!(
        next_outcome(&mut q_reports).await.unwrap(),
        ResponderOutcome::Aborted(_)
    ));
    assert_eq!(net.notary.committed_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_signer_waits_through_notary_retries() {
    let config = FlowConfig::default()
        .with_session_timeout(Duration::from_secs(5))
        .with_notary_attempts(3)
        .with_notary_backoff(Duration::from_secs(3));
    let mut net = TestNetwork::with_config(&["P", "Q", "R"], config);
    let mut q_reports = net.start_responder("Q", accept_all());
    let mut r_reports = net.start_responder("R", accept_all());
    // Two outages cost longer than one session timeout.
    let (hub, flaky) = with_flaky_notary(&net, 2);

    let request = ProposalRequest {
        inputs: vec![],
        outputs: vec![net.iou(&["P", "Q", "R"], 6)],
        command: Command::new(
            CommandKind::Issue,
            vec![*net.party("P").public_key(), *net.party("Q").public_key()],
        )
        .unwrap(),
    };
    let result = ProposerFlow::new(hub, request).run().await.unwrap();
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

    for rx in [&mut q_reports, &mut r_reports] {
        assert_eq!(
            next_outcome(rx).await.unwrap(),
            ResponderOutcome::Committed(result.clone())
        );
    }
    assert_eq!(net.open_checkpoints("R"), 0);
}

#[tokio::test]
async fn non_signer_is_told_to_observe() {
    let mut net = TestNetwork::new(&["P", "Q", "R"]);
    let _q_reports = net.start_responder("Q", accept_all());
    let mut r_inbox = net.take_inbox("R");

    let request = ProposalRequest {
        inputs: vec![],
        outputs: vec![net.iou(&["P", "Q", "R"], 6)],
        command: Command::new(
            CommandKind::Issue,
            vec![*net.party("P").public_key(), *net.party("Q").public_key()],
        )
        .unwrap(),
    };
    let result = ProposerFlow::new(net.hub("P"), request).run().await.unwrap();

    let inbound = r_inbox.recv().await.unwrap();
    assert_eq!(
        inbound.session.receive().await.unwrap(),
        FlowMessage::Observe { tx_id: result.id() }
    );
    assert_eq!(
        inbound.session.receive().await.unwrap(),
        FlowMessage::Finalized(result)
    );
}

// ---------------------------------------------------------------------------
// 9. Finality Identity Check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn finality_for_a_different_transaction_is_fatal() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let mut q_reports = net.start_responder("Q", accept_all());
    let p = net.node("P");
    let notary = net.notary.identity();

    // What Q is asked to sign.
    let proposal = build(
        vec![],
        vec![net.iou(&["P", "Q"], 4)],
        Command::new(
            CommandKind::Issue,
            vec![*net.party("P").public_key(), *net.party("Q").public_key()],
        )
        .unwrap(),
        notary.clone(),
    )
    .unwrap();
    let stx = SignedTransaction::unsigned(proposal.clone())
        .with_signature(sign_proposal(&proposal, &p.keypair))
        .unwrap();

    // An unrelated, properly notarised transaction.
    let other = build(
        vec![],
        vec![net.iou(&["P"], 4)],
        Command::new(CommandKind::Issue, vec![*net.party("P").public_key()]).unwrap(),
        notary,
    )
    .unwrap();
    let other = SignedTransaction::unsigned(other.clone())
        .with_signature(sign_proposal(&other, &p.keypair))
        .unwrap();
    let attestation = net.notary.notarize(&other).await.unwrap();
    let wrong = NotarizedTransaction::new(other, attestation);

    let session = p
        .hub
        .messaging
        .open(FlowId::new(), &net.party("Q"))
        .await
        .unwrap();
    session.send(FlowMessage::Proposal(stx)).await.unwrap();
    assert_eq!(session.receive().await.unwrap().kind(), "Signature");
    session.send(FlowMessage::Finalized(wrong)).await.unwrap();

    let err = next_outcome(&mut q_reports).await.unwrap_err();
    assert!(matches!(err, FlowError::IdentityMismatch { .. }));
    assert!(err.is_fatal());
    assert_eq!(net.open_checkpoints("Q"), 0);
}

// ---------------------------------------------------------------------------
// 10. Resume From Checkpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proposer_resumes_from_a_fully_signed_checkpoint() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let mut q_reports = net.start_responder("Q", accept_all());
    let (p, q) = (net.node("P"), net.node("Q"));

    let proposal = build(
        vec![],
        vec![net.iou(&["P", "Q"], 12)],
        Command::new(
            CommandKind::Issue,
            vec![*net.party("P").public_key(), *net.party("Q").public_key()],
        )
        .unwrap(),
        net.notary.identity(),
    )
    .unwrap();
    let stx = SignedTransaction::unsigned(proposal.clone())
        .with_signature(sign_proposal(&proposal, &p.keypair))
        .and_then(|s| s.with_signature(sign_proposal(&proposal, &q.keypair)))
        .unwrap();

    // Both sides crashed after Q signed.
    let flow_id = FlowId::new();
    p.checkpoints
        .save(&Checkpoint::new(
            flow_id,
            FlowState::Proposer(ProposerState::FullySigned {
                stx: stx.clone(),
                contacts: vec![net.party("Q")],
            }),
        ))
        .unwrap();
    q.checkpoints
        .save(&Checkpoint::new(
            flow_id,
            FlowState::Responder(ResponderState::AwaitingFinality { tx_id: stx.id() }),
        ))
        .unwrap();

    let flow = ProposerFlow::resume(net.hub("P"), flow_id).unwrap();
    assert_eq!(flow.flow_id(), flow_id);
    let result = flow.run().await.unwrap();
    assert_eq!(result.id(), stx.id());

    let report = q_reports.recv().await.unwrap();
    assert_eq!(report.flow_id, flow_id);
    assert_eq!(report.outcome.unwrap(), ResponderOutcome::Committed(result));
    assert_eq!(net.open_checkpoints("P"), 0);
    assert_eq!(net.open_checkpoints("Q"), 0);
}

#[test]
fn resume_without_checkpoint_is_an_error() {
    let net = TestNetwork::new(&["P"]);
    assert!(matches!(
        ProposerFlow::resume(net.hub("P"), FlowId::new()),
        Err(FlowError::Resume(_))
    ));
}

// ---------------------------------------------------------------------------
// 11. Degenerate And Edge Shapes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_participant_commits_without_any_session() {
    let mut net = TestNetwork::new(&["P"]);
    let mut p_inbox = net.take_inbox("P");

    let request = ProposalRequest::issue(net.iou(&["P"], 1)).unwrap();
    let result = ProposerFlow::new(net.hub("P"), request).run().await.unwrap();

    assert_eq!(result.transaction().signatures().len(), 1);
    assert_eq!(net.notary.committed_count(), 1);
    assert!(p_inbox.try_recv().is_err());
}

#[tokio::test]
async fn non_signing_participant_only_receives_the_result() {
    let mut net = TestNetwork::new(&["P", "Q", "R"]);
    let mut q_reports = net.start_responder("Q", accept_all());
    // R would refuse anything it is asked to sign.
    let mut r_reports = net.start_responder("R", reject_with("not asked"));

    let request = ProposalRequest {
        inputs: vec![],
        outputs: vec![net.iou(&["P", "Q", "R"], 2)],
        command: Command::new(
            CommandKind::Issue,
            vec![*net.party("P").public_key(), *net.party("Q").public_key()],
        )
        .unwrap(),
    };
    let result = ProposerFlow::new(net.hub("P"), request).run().await.unwrap();
    assert_eq!(result.transaction().signatures().len(), 2);

    for rx in [&mut q_reports, &mut r_reports] {
        assert_eq!(
            next_outcome(rx).await.unwrap(),
            ResponderOutcome::Committed(result.clone())
        );
    }
}

#[tokio::test]
async fn proposer_must_be_a_required_signer() {
    let mut net = TestNetwork::new(&["P", "Q"]);
    let mut q_inbox = net.take_inbox("Q");

    let request = ProposalRequest {
        inputs: vec![],
        outputs: vec![net.iou(&["P", "Q"], 2)],
        command: Command::new(CommandKind::Issue, vec![*net.party("Q").public_key()]).unwrap(),
    };
    let err = ProposerFlow::new(net.hub("P"), request).run().await.unwrap_err();
    assert!(matches!(err, FlowError::Build(_)));
    assert!(q_inbox.try_recv().is_err());
}

#[tokio::test]
async fn unreachable_counterparty_aborts_before_signing() {
    let net = TestNetwork::new(&["P", "Q"]);
    net.net.disconnect(&net.party("Q"));

    let request = ProposalRequest::issue(net.iou(&["P", "Q"], 2)).unwrap();
    let err = ProposerFlow::new(net.hub("P"), request).run().await.unwrap_err();
    assert!(matches!(err, FlowError::Session(_)));
    assert_eq!(net.notary.committed_count(), 0);
}
