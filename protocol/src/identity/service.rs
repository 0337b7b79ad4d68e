//! Identity collaborator and its in-memory network map.

use parking_lot::RwLock;
use std::sync::Arc;

use super::party::Party;
use crate::crypto::AccordPublicKey;

/// Identity lookups a protocol instance needs. Obtained once from the
/// [`ServiceHub`](crate::flow::ServiceHub) at construction.
pub trait IdentityService: Send + Sync {
    /// The party this node acts as.
    fn self_identity(&self) -> Party;

    /// Resolve a party by its network name.
    fn resolve(&self, name: &str) -> Option<Party>;

    /// Resolve the party that owns `key`.
    fn resolve_key(&self, key: &AccordPublicKey) -> Option<Party>;

    /// Notaries this node is willing to use, in preference order.
    fn notaries(&self) -> Vec<Party>;

    fn is_notary(&self, party: &Party) -> bool {
        self.notaries().iter().any(|n| n == party)
    }
}

// ---------------------------------------------------------------------------
// NetworkMap
// ---------------------------------------------------------------------------

/// Shared registry of every party and notary on an in-process network.
#[derive(Debug, Default)]
pub struct NetworkMap {
    parties: RwLock<Vec<Party>>,
    notaries: RwLock<Vec<Party>>,
}

impl NetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a party. Re-registering an identical party is a no-op.
    pub fn register(&self, party: Party) {
        let mut parties = self.parties.write();
        if !parties.contains(&party) {
            parties.push(party);
        }
    }

    /// Register a notary. Notaries are also ordinary parties.
    pub fn register_notary(&self, notary: Party) {
        self.register(notary.clone());
        let mut notaries = self.notaries.write();
        if !notaries.contains(&notary) {
            notaries.push(notary);
        }
    }

    pub fn parties(&self) -> Vec<Party> {
        self.parties.read().clone()
    }
}

// ---------------------------------------------------------------------------
// InMemoryIdentityService
// ---------------------------------------------------------------------------

/// A node's view of the [`NetworkMap`] together with its own identity.
#[derive(Debug, Clone)]
pub struct InMemoryIdentityService {
    me: Party,
    map: Arc<NetworkMap>,
}

impl InMemoryIdentityService {
    /// Registers `me` on the map as a side effect.
    pub fn new(me: Party, map: Arc<NetworkMap>) -> Self {
        map.register(me.clone());
        Self { me, map }
    }
}

impl IdentityService for InMemoryIdentityService {
    fn self_identity(&self) -> Party {
        self.me.clone()
    }

    fn resolve(&self, name: &str) -> Option<Party> {
        self.map
            .parties
            .read()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    fn resolve_key(&self, key: &AccordPublicKey) -> Option<Party> {
        self.map
            .parties
            .read()
            .iter()
            .find(|p| p.public_key() == key)
            .cloned()
    }

    fn notaries(&self) -> Vec<Party> {
        self.map.notaries.read().clone()
    }
}
