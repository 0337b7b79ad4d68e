//! # Finality Coordinator
//!
//! Hands a fully signed transaction to the notary and distributes the
//! notarised result.
//!
//! The coordinator never retries. A [`FlowError::NotaryUnavailable`] goes
//! straight back to the caller, which decides whether to try again. Once
//! the notary has signed, the record is final: distribution is
//! best-effort per session and a failed delivery does not undo anything.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::FlowError;
use super::message::FlowMessage;
use crate::network::FlowSession;
use crate::notary::{NotaryError, NotaryService};
use crate::transaction::{verify_fully_signed, NotarizedTransaction, SignedTransaction};

pub struct FinalityCoordinator {
    notary: Arc<dyn NotaryService>,
}

impl FinalityCoordinator {
    pub fn new(notary: Arc<dyn NotaryService>) -> Self {
        Self { notary }
    }

    /// Notarise `stx`.
    ///
    /// # Errors
    ///
    /// - [`FlowError::Verification`] if `stx` is not fully and validly signed.
    /// - [`FlowError::NotaryRejected`] if `stx` names a different notary or
    ///   the notary refuses it.
    /// - [`FlowError::DoubleSpend`] if an input was already consumed by a
    ///   different notarised transaction.
    /// - [`FlowError::NotaryUnavailable`] on communication failure.
    /// - [`FlowError::NotarySignatureInvalid`] if the attestation does not
    ///   verify.
    pub async fn submit(&self, stx: &SignedTransaction) -> Result<NotarizedTransaction, FlowError> {
        verify_fully_signed(stx)?;

        let notary = self.notary.identity();
        if stx.notary() != &notary {
            return Err(FlowError::NotaryRejected(format!(
                "transaction names notary {}, coordinator is connected to {}",
                stx.notary(),
                notary
            )));
        }

        let id = stx.id();
        debug!(tx_id = %id, %notary, "submitting for notarisation");
        let attestation = self.notary.notarize(stx).await.map_err(|e| match e {
            NotaryError::DoubleSpend {
                conflicts,
                consumed_by,
            } => FlowError::DoubleSpend {
                conflicts,
                consumed_by,
            },
            NotaryError::Unavailable(reason) => FlowError::NotaryUnavailable(reason),
            NotaryError::InvalidTransaction(reason) => FlowError::NotaryRejected(reason),
        })?;

        let result = NotarizedTransaction::new(stx.clone(), attestation);
        result
            .verify_notary_signature()
            .map_err(FlowError::NotarySignatureInvalid)?;
        info!(tx_id = %id, "transaction finalised");
        Ok(result)
    }

    /// Send `result` to every session. Returns how many deliveries
    /// succeeded.
    pub async fn distribute(
        &self,
        result: &NotarizedTransaction,
        sessions: &[Arc<dyn FlowSession>],
    ) -> usize {
        let deliveries = sessions.iter().map(|session| async move {
            let outcome = session
                .send(FlowMessage::Finalized(result.clone()))
                .await;
            if let Err(e) = &outcome {
                warn!(
                    tx_id = %result.id(),
                    party = %session.counterparty(),
                    error = %e,
                    "failed to deliver finality notice"
                );
            }
            outcome.is_ok()
        });
        let delivered = join_all(deliveries).await.into_iter().filter(|ok| *ok).count();
        debug!(tx_id = %result.id(), delivered, total = sessions.len(), "finality notices sent");
        delivered
    }
}

/// Tell every session the instance is over. Best-effort: a session that is
/// already closed has nobody waiting on it.
pub async fn notify_abort(sessions: &[Arc<dyn FlowSession>], reason: &str) {
    let notices = sessions.iter().map(|session| async move {
        if let Err(e) = session
            .send(FlowMessage::Abort {
                reason: reason.to_string(),
            })
            .await
        {
            debug!(party = %session.counterparty(), error = %e, "abort notice not delivered");
        }
    });
    join_all(notices).await;
}
