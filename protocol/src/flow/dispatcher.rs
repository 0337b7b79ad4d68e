//! Accepts inbound sessions for one node and runs a [`ResponderFlow`] for
//! each of them on its own task.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::FlowError;
use super::hub::ServiceHub;
use super::message::FlowId;
use super::responder::{ResponderFlow, ResponderOutcome};
use crate::contract::Validator;
use crate::identity::Party;
use crate::network::InboundSession;

/// How one responder instance ended.
#[derive(Debug)]
pub struct ResponderReport {
    pub flow_id: FlowId,
    pub initiator: Party,
    pub outcome: Result<ResponderOutcome, FlowError>,
}

pub struct ResponderDispatcher {
    hub: ServiceHub,
    validator: Arc<dyn Validator>,
}

impl ResponderDispatcher {
    pub fn new(hub: ServiceHub, validator: Arc<dyn Validator>) -> Self {
        Self { hub, validator }
    }

    /// Start accepting sessions from `inbox` until it closes or `shutdown`
    /// flips to `true`. Every finished instance is reported on the returned
    /// channel.
    pub fn spawn(
        self,
        inbox: mpsc::Receiver<InboundSession>,
        shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, mpsc::UnboundedReceiver<ResponderReport>) {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(inbox, shutdown, reports_tx));
        (handle, reports_rx)
    }

    async fn run(
        self,
        mut inbox: mpsc::Receiver<InboundSession>,
        mut shutdown: watch::Receiver<bool>,
        reports: mpsc::UnboundedSender<ResponderReport>,
    ) {
        let me = self.hub.me();
        info!(party = %me, "responder dispatcher started");
        loop {
            tokio::select! {
                inbound = inbox.recv() => {
                    let Some(inbound) = inbound else {
                        debug!(party = %me, "inbox closed");
                        break;
                    };
                    self.accept(inbound, reports.clone());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(party = %me, "responder dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn accept(&self, inbound: InboundSession, reports: mpsc::UnboundedSender<ResponderReport>) {
        let InboundSession {
            flow_id,
            initiator,
            session,
        } = inbound;
        debug!(%flow_id, from = %initiator, "inbound session");

        let hub = self.hub.clone();
        let validator = Arc::clone(&self.validator);
        tokio::spawn(async move {
            let outcome = match ResponderFlow::resume(hub, session, validator) {
                Ok(flow) => flow.run().await,
                Err(e) => Err(e),
            };
            if let Err(e) = &outcome {
                warn!(%flow_id, from = %initiator, error = %e, "responder ended with error");
            }
            // Nobody listening is fine.
            let _ = reports.send(ResponderReport {
                flow_id,
                initiator,
                outcome,
            });
        });
    }
}
