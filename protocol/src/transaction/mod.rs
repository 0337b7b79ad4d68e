//! # Transaction Module
//!
//! From proposal to notarised record.
//!
//! ```text
//! types.rs       : TxId and TransactionSignature
//! builder.rs     : TransactionProposal, TransactionBuilder, build()
//! signing.rs     : PartialSignatureSet and proposal signing
//! signed.rs      : SignedTransaction and NotarizedTransaction
//! verification.rs: signature checks over a SignedTransaction
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: assemble a [`TransactionProposal`]; its [`TxId`] is fixed here.
//! 2. **Sign**: each required signer adds a [`TransactionSignature`] over the id.
//! 3. **Verify**: [`verify_fully_signed`] before handing to the notary.
//! 4. **Notarise**: the notary's signature turns it into a [`NotarizedTransaction`].

pub mod builder;
pub mod signed;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{build, TransactionBuilder, TransactionProposal};
pub use signed::{NotarizedTransaction, SignedTransaction};
pub use signing::{sign_proposal, PartialSignatureSet, SignatureSetError};
pub use types::{TransactionSignature, TxId};
pub use verification::{verify_fully_signed, verify_signatures, VerificationError};
