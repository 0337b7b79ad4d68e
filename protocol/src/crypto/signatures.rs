//! # Digital Signatures
//!
//! Free-function layer over [`AccordKeypair`] / [`AccordPublicKey`], used
//! wherever the protocol signs or checks a transaction id.

use super::keys::{AccordKeypair, AccordPublicKey, AccordSignature};

pub fn sign(keypair: &AccordKeypair, message: &[u8]) -> AccordSignature {
    keypair.sign(message)
}

pub fn verify(public_key: &AccordPublicKey, message: &[u8], signature: &AccordSignature) -> bool {
    public_key.verify(message, signature)
}
