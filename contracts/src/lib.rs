//! # Accord Contracts
//!
//! Business states and the rules that govern them.
//!
//! - **IOU**: a debt owed by a borrower to a lender. Issued by the lender
//!   with the borrower's co-signature; see [`iou`].
//!
//! Contracts plug into the protocol through
//! [`ContractVerifier`](accord_protocol::contract::ContractVerifier), which
//! every signer runs before signing, and
//! [`Validator`](accord_protocol::contract::Validator), the extra check a
//! responder applies to what it is asked to sign.

pub mod iou;

pub use iou::{IouContract, IouError, IouIssueValidator, IouState, IOU_CONTRACT_ID};
