//! Signature types and traits

use crate::error::Result;
use base64::{engine::general_purpose, Engine as _};

/// Signature abstraction
#[derive(Debug, Clone)]
pub enum Signature {
    /// Ed25519 signature (64 bytes)
    Ed25519(ed25519_dalek::Signature),
    /// RSA-PSS-SHA256 signature (raw, modulus length)
    RsaPss(Vec<u8>),
}

impl Signature {
    /// Encode signature to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Signature::Ed25519(sig) => sig.to_bytes().to_vec(),
            Signature::RsaPss(bytes) => bytes.clone(),
        }
    }

    /// Encode signature to base64
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.to_bytes())
    }
}

/// Trait for signing messages
pub trait Signer {
    /// Sign a message
    fn sign(&self, message: &[u8]) -> Result<Signature>;
}

/// Trait for verifying signatures
pub trait Verifier {
    /// Verify a signature
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<()>;
}
