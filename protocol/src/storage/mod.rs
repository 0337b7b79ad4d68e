//! # Storage Module
//!
//! Checkpoint persistence for suspended protocol instances.
//!
//! ```text
//! checkpoint.rs: Checkpoint, FlowState, CheckpointStore trait, in-memory store
//! db.rs        : sled-backed store
//! ```

pub mod checkpoint;
pub mod db;

pub use checkpoint::{Checkpoint, CheckpointStore, FlowState, InMemoryCheckpointStore};
pub use db::SledCheckpointStore;

/// Errors that can occur while persisting or restoring checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}
