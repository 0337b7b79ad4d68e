// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Accord Protocol: Core Library
//!
//! A multi-party commit protocol for a permissioned ledger. A proposer
//! drafts a transaction, every party whose key the transaction requires
//! validates and co-signs it, and a notary attests that none of its inputs
//! has been consumed before. The result is either a notarised record held
//! by every participant or nothing at all.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys and signatures, SHA-256 hashing.
//! - **identity**: Parties and the identity service.
//! - **ledger**: States, state references and commands.
//! - **transaction**: Proposals, transaction ids and signature sets.
//! - **contract**: Contract verification and responder-side validators.
//! - **notary**: The uniqueness service and a reference notary.
//! - **network**: Flow sessions and an in-process transport.
//! - **storage**: Checkpoints for suspended protocol instances.
//! - **flow**: The proposer and responder state machines.
//! - **config**: Protocol constants and timeouts.
//!
//! Every collaborator a protocol instance talks to is a trait object held
//! by a [`flow::ServiceHub`], so nodes, simulators and tests plug in their
//! own implementations.

pub mod config;
pub mod contract;
pub mod crypto;
pub mod flow;
pub mod identity;
pub mod ledger;
pub mod network;
pub mod notary;
pub mod storage;
pub mod transaction;
