//! # Identity Module
//!
//! Who is who on the ledger network.
//!
//! - [`Party`] is a named identity bound to one Ed25519 public key. Parties
//!   are immutable and long-lived; protocol code compares them by value.
//! - [`IdentityService`] is the collaborator a protocol instance asks for
//!   its own identity, for the notaries it may use and to resolve names and
//!   keys seen on the wire.
//! - [`NetworkMap`] + [`InMemoryIdentityService`] are the in-process
//!   implementation used by the node simulator and the tests.

pub mod party;
pub mod service;

pub use party::Party;
pub use service::{IdentityService, InMemoryIdentityService, NetworkMap};
