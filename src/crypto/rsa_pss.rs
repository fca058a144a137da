//! RSA-PSS-SHA256 signature implementation
//!
//! The TAP profile fixes the PSS parameters: MGF1 over SHA-256 and a salt
//! length equal to the hash output length (32 bytes). `Pss::new::<Sha256>()`
//! pins exactly those parameters.

use crate::error::{Error, Result};
use rand::rngs::OsRng;
use rsa::pss::Pss;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Modulus size used for generated keys
pub const KEY_BITS: usize = 2048;

/// Generate a new RSA private key
pub fn generate_private_key() -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut OsRng, KEY_BITS).map_err(|e| Error::KeyGeneration(e.to_string()))
}

/// Sign a message, producing a raw signature of modulus length
pub fn sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let digest = Sha256::digest(message);
    private_key
        .sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), &digest)
        .map_err(|e| Error::Signature(e.to_string()))
}

/// Verify a raw RSA-PSS-SHA256 signature
pub fn verify(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let digest = Sha256::digest(message);
    public_key
        .verify(Pss::new::<Sha256>(), &digest, signature)
        .map_err(|_| Error::Verification("RSA-PSS signature verification failed".to_string()))
}
