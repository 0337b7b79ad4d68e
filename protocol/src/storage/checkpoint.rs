//! Checkpoint store collaborator.
//!
//! A protocol instance writes its current state here before every
//! suspension point, keyed by [`FlowId`]. After a restart the state can be
//! loaded and the instance resumed from where it stopped.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::CheckpointError;
use crate::flow::{FlowId, ProposerState, ResponderState};

/// Which state machine a checkpoint belongs to, and where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Proposer(ProposerState),
    Responder(ResponderState),
}

impl FlowState {
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Proposer(s) => s.label(),
            FlowState::Responder(s) => s.label(),
        }
    }
}

/// A persisted protocol instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub flow_id: FlowId,
    pub state: FlowState,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(flow_id: FlowId, state: FlowState) -> Self {
        Self {
            flow_id,
            state,
            updated_at: Utc::now(),
        }
    }
}

/// Persists and restores protocol instances.
pub trait CheckpointStore: Send + Sync {
    /// Insert or overwrite the checkpoint for `checkpoint.flow_id`.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    fn load(&self, flow_id: &FlowId) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Forget a finished instance. Removing an unknown id is not an error.
    fn remove(&self, flow_id: &FlowId) -> Result<(), CheckpointError>;

    /// Ids of every instance that has not finished.
    fn list(&self) -> Result<Vec<FlowId>, CheckpointError>;
}

/// Volatile store for tests and single-process simulations.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<FlowId, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints
            .write()
            .insert(checkpoint.flow_id, checkpoint.clone());
        Ok(())
    }

    fn load(&self, flow_id: &FlowId) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.checkpoints.read().get(flow_id).cloned())
    }

    fn remove(&self, flow_id: &FlowId) -> Result<(), CheckpointError> {
        self.checkpoints.write().remove(flow_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<FlowId>, CheckpointError> {
        let mut ids: Vec<FlowId> = self.checkpoints.read().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
