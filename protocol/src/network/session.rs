//! Session/messaging collaborator.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::flow::{FlowId, FlowMessage};
use crate::identity::Party;

/// Transport failures. Timeouts are not reported here: the protocol wraps
/// every receive in its own deadline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No route to the named party.
    #[error("unknown party {0}")]
    UnknownParty(String),

    /// The other end has gone away.
    #[error("session with {0} is closed")]
    Closed(String),
}

/// One end of a reliable, ordered, point-to-point channel scoped to a
/// single protocol instance.
///
/// Methods take `&self` so that an instance can wait on several sessions
/// at once and still send an abort to each of them afterwards.
#[async_trait]
pub trait FlowSession: Send + Sync {
    fn flow_id(&self) -> FlowId;

    fn counterparty(&self) -> &Party;

    async fn send(&self, message: FlowMessage) -> Result<(), SessionError>;

    /// Suspends until the next message arrives.
    async fn receive(&self) -> Result<FlowMessage, SessionError>;
}

/// Opens outbound sessions on behalf of one node.
#[async_trait]
pub trait FlowMessaging: Send + Sync {
    async fn open(
        &self,
        flow_id: FlowId,
        counterparty: &Party,
    ) -> Result<Arc<dyn FlowSession>, SessionError>;
}
