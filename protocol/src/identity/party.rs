use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{AccordKeypair, AccordPublicKey};

/// A ledger participant: a human-readable name plus the key that signs on
/// its behalf. The name is also the party's address on the session layer.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    name: String,
    public_key: AccordPublicKey,
}

impl Party {
    pub fn new(name: impl Into<String>, public_key: AccordPublicKey) -> Self {
        Self {
            name: name.into(),
            public_key,
        }
    }

    /// Convenience for fixtures: the party that `keypair` signs for.
    pub fn from_keypair(name: impl Into<String>, keypair: &AccordKeypair) -> Self {
        Self::new(name, keypair.public_key())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> &AccordPublicKey {
        &self.public_key
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({}, {})", self.name, self.public_key.short())
    }
}
