//! Cryptographic checks over collected signatures.

use thiserror::Error;

use super::signed::SignedTransaction;
use crate::crypto::AccordPublicKey;

/// Why a signed transaction failed verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// A signature does not verify against the transaction id.
    #[error("invalid signature by {key}")]
    InvalidSignature { key: AccordPublicKey },

    /// A signature is present from a key no command requires.
    #[error("signature by {key}, which is not a required signer")]
    UnexpectedSigner { key: AccordPublicKey },

    /// Required signatures are still missing.
    #[error("missing signatures from {} required signer(s)", keys.len())]
    MissingSignatures { keys: Vec<AccordPublicKey> },
}

/// Verify every signature present on `stx` and require all signers except
/// those in `allowed_missing`.
///
/// Checks, in order: each present signature comes from a required signer,
/// each present signature is valid for the id, and finally no required key
/// other than the allowed ones is missing.
pub fn verify_signatures(
    stx: &SignedTransaction,
    allowed_missing: &[AccordPublicKey],
) -> Result<(), VerificationError> {
    let id = stx.id();
    let required = stx.proposal().required_signers();

    for sig in stx.signatures().iter() {
        if !required.contains(&sig.by) {
            return Err(VerificationError::UnexpectedSigner { key: sig.by });
        }
        if !sig.is_valid_for(&id) {
            return Err(VerificationError::InvalidSignature { key: sig.by });
        }
    }

    let missing: Vec<AccordPublicKey> = stx
        .missing_signers()
        .into_iter()
        .filter(|k| !allowed_missing.contains(k))
        .collect();
    if !missing.is_empty() {
        return Err(VerificationError::MissingSignatures { keys: missing });
    }
    Ok(())
}

/// Shorthand for "fully signed and every signature valid".
pub fn verify_fully_signed(stx: &SignedTransaction) -> Result<(), VerificationError> {
    verify_signatures(stx, &[])
}
