//! # Key Management
//!
//! Ed25519 keypairs for ledger parties and notaries.
//!
//! Every [`Party`](crate::identity::Party) is bound to exactly one
//! [`AccordPublicKey`]. Signatures over transaction ids and notary
//! attestations are all plain Ed25519, so anything signed here can be
//! checked by any other implementation of RFC 8032.
//!
//! Key bytes are never logged. `Debug` on a keypair prints the public half
//! only.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while decoding key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes: expected 32 hex-encoded bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// An Ed25519 signing identity.
///
/// Deliberately not `Serialize`: writing a secret key somewhere should be an
/// explicit call to [`secret_key_bytes`](Self::secret_key_bytes), not a side
/// effect of putting a keypair in a checkpoint.
pub struct AccordKeypair {
    signing_key: SigningKey,
}

/// The public half of a party's identity.
///
/// Ordered by raw bytes so that signature sets keyed by public key have a
/// canonical iteration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccordPublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature. Always 64 bytes when produced by this crate; a
/// signature of any other length simply fails verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccordSignature {
    bytes: Vec<u8>,
}

impl AccordKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. Tests and fixtures only
    /// unless the seed comes from a proper KDF.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from a hex-encoded secret key, as written by
    /// `accord-node init`.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> AccordPublicKey {
        AccordPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign arbitrary bytes. Ed25519 is deterministic: the same key and
    /// message always give the same signature.
    pub fn sign(&self, message: &[u8]) -> AccordSignature {
        AccordSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &AccordSignature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Raw secret key material. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for AccordKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for AccordKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccordKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// AccordPublicKey
// ---------------------------------------------------------------------------

impl AccordPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse and validate a public key. Rejects byte strings that are not a
    /// valid Ed25519 point.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify `signature` over `message`. Malformed keys or signatures are
    /// reported as `false`, never as a panic.
    pub fn verify(&self, message: &[u8], signature: &AccordSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Some(dalek_sig) = signature.to_dalek_signature() else {
            return false;
        };
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.bytes[..4])
    }
}

impl fmt::Display for AccordPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccordPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccordPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// AccordSignature
// ---------------------------------------------------------------------------

impl AccordSignature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_dalek_signature(&self) -> Option<DalekSignature> {
        let arr: [u8; 64] = self.bytes.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for AccordSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccordSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "AccordSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "AccordSignature({})", hex_str)
        }
    }
}
