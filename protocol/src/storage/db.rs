//! # Sled Checkpoint Store
//!
//! Durable [`CheckpointStore`] on sled's embedded key-value store.
//!
//! | Tree          | Key                | Value                |
//! |---------------|--------------------|----------------------|
//! | `checkpoints` | `flow_id` (16B)    | `bincode(Checkpoint)`|
//!
//! Every write is flushed before returning: a checkpoint that has not hit
//! the disk is not a checkpoint.

use sled::{Db, Tree};
use std::path::Path;
use uuid::Uuid;

use super::checkpoint::{Checkpoint, CheckpointStore};
use super::CheckpointError;
use crate::flow::FlowId;

const CHECKPOINT_TREE: &str = "checkpoints";

#[derive(Debug, Clone)]
pub struct SledCheckpointStore {
    db: Db,
    checkpoints: Tree,
}

impl SledCheckpointStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        Self::from_db(sled::open(path)?)
    }

    /// A store that is deleted when dropped.
    pub fn open_temporary() -> Result<Self, CheckpointError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, CheckpointError> {
        let checkpoints = db.open_tree(CHECKPOINT_TREE)?;
        Ok(Self { db, checkpoints })
    }
}

impl CheckpointStore for SledCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let bytes = bincode::serialize(checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        self.checkpoints
            .insert(checkpoint.flow_id.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn load(&self, flow_id: &FlowId) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.checkpoints.get(flow_id.as_bytes())? {
            Some(bytes) => {
                let checkpoint = bincode::deserialize(&bytes)
                    .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
                Ok(Some(checkpoint))
            }
            None => Ok(None),
        }
    }

    fn remove(&self, flow_id: &FlowId) -> Result<(), CheckpointError> {
        self.checkpoints.remove(flow_id.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<FlowId>, CheckpointError> {
        let mut ids = Vec::new();
        for entry in self.checkpoints.iter() {
            let (key, _) = entry?;
            let uuid = Uuid::from_slice(&key)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
            ids.push(FlowId::from_uuid(uuid));
        }
        Ok(ids)
    }
}
