//! Collaborator handles for a protocol instance.

use std::sync::Arc;

use crate::config::FlowConfig;
use crate::contract::ContractVerifier;
use crate::crypto::AccordKeypair;
use crate::identity::{IdentityService, Party};
use crate::network::FlowMessaging;
use crate::notary::NotaryService;
use crate::storage::CheckpointStore;

/// Everything a proposer or responder needs from its node, passed in
/// explicitly at construction. Cheap to clone.
#[derive(Clone)]
pub struct ServiceHub {
    /// Signs on behalf of [`IdentityService::self_identity`].
    pub keypair: Arc<AccordKeypair>,
    pub identity: Arc<dyn IdentityService>,
    pub messaging: Arc<dyn FlowMessaging>,
    pub contracts: Arc<dyn ContractVerifier>,
    /// Client for the notary this node submits to.
    pub notary: Arc<dyn NotaryService>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub config: FlowConfig,
}

impl ServiceHub {
    pub fn me(&self) -> Party {
        self.identity.self_identity()
    }
}
