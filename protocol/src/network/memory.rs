//! In-process transport.
//!
//! Every registered party owns an inbox of [`InboundSession`]s. Opening a
//! session creates two bounded tokio channels (one per direction), keeps
//! one end and posts the other to the counterparty's inbox. Routing is by
//! party name through a `DashMap`, so any number of nodes can open
//! sessions concurrently.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::session::{FlowMessaging, FlowSession, SessionError};
use crate::config::{INBOX_CAPACITY, SESSION_CHANNEL_CAPACITY};
use crate::flow::{FlowId, FlowMessage};
use crate::identity::Party;

/// A session someone else opened to us.
pub struct InboundSession {
    pub flow_id: FlowId,
    pub initiator: Party,
    pub session: Arc<dyn FlowSession>,
}

/// Routing table of party inboxes.
#[derive(Default)]
pub struct InMemoryNetwork {
    inboxes: DashMap<String, mpsc::Sender<InboundSession>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach `party` to the network and return its inbox. Registering the
    /// same name again replaces the previous inbox.
    pub fn register(&self, party: &Party) -> mpsc::Receiver<InboundSession> {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.inboxes.insert(party.name().to_string(), tx);
        rx
    }

    /// Detach `party`; later attempts to open a session to it fail.
    pub fn disconnect(&self, party: &Party) {
        self.inboxes.remove(party.name());
    }

    /// Messaging handle that opens sessions as `me`.
    pub fn messaging(self: &Arc<Self>, me: Party) -> InMemoryMessaging {
        InMemoryMessaging {
            me,
            network: Arc::clone(self),
        }
    }

    fn inbox(&self, name: &str) -> Option<mpsc::Sender<InboundSession>> {
        self.inboxes.get(name).map(|entry| entry.value().clone())
    }
}

/// [`FlowMessaging`] over an [`InMemoryNetwork`].
#[derive(Clone)]
pub struct InMemoryMessaging {
    me: Party,
    network: Arc<InMemoryNetwork>,
}

#[async_trait]
impl FlowMessaging for InMemoryMessaging {
    async fn open(
        &self,
        flow_id: FlowId,
        counterparty: &Party,
    ) -> Result<Arc<dyn FlowSession>, SessionError> {
        let inbox = self
            .network
            .inbox(counterparty.name())
            .ok_or_else(|| SessionError::UnknownParty(counterparty.name().to_string()))?;

        let (to_peer, from_us) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (to_us, from_peer) = mpsc::channel(SESSION_CHANNEL_CAPACITY);

        let ours = InMemorySession::new(flow_id, counterparty.clone(), to_peer, from_peer);
        let theirs = InMemorySession::new(flow_id, self.me.clone(), to_us, from_us);

        inbox
            .send(InboundSession {
                flow_id,
                initiator: self.me.clone(),
                session: Arc::new(theirs),
            })
            .await
            .map_err(|_| SessionError::Closed(counterparty.name().to_string()))?;

        debug!(%flow_id, from = %self.me, to = %counterparty, "session opened");
        Ok(Arc::new(ours))
    }
}

/// One end of an in-memory session.
pub struct InMemorySession {
    flow_id: FlowId,
    counterparty: Party,
    outbound: mpsc::Sender<FlowMessage>,
    inbound: Mutex<mpsc::Receiver<FlowMessage>>,
}

impl InMemorySession {
    fn new(
        flow_id: FlowId,
        counterparty: Party,
        outbound: mpsc::Sender<FlowMessage>,
        inbound: mpsc::Receiver<FlowMessage>,
    ) -> Self {
        Self {
            flow_id,
            counterparty,
            outbound,
            inbound: Mutex::new(inbound),
        }
    }

    fn closed(&self) -> SessionError {
        SessionError::Closed(self.counterparty.name().to_string())
    }
}

#[async_trait]
impl FlowSession for InMemorySession {
    fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    async fn send(&self, message: FlowMessage) -> Result<(), SessionError> {
        self.outbound.send(message).await.map_err(|_| self.closed())
    }

    async fn receive(&self) -> Result<FlowMessage, SessionError> {
        self.inbound.lock().await.recv().await.ok_or_else(|| self.closed())
    }
}
