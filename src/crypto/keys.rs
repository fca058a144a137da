//! Key pair management and operations

use crate::crypto::{rsa_pss, Signature, Signer, Verifier};
use crate::error::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};

/// Key types supported by TAP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Ed25519 key type
    Ed25519,
    /// RSA key type (used with PSS-SHA256)
    Rsa,
}

/// Public key abstraction
#[derive(Debug, Clone)]
pub enum PublicKey {
    /// Ed25519 public key
    Ed25519(ed25519_dalek::VerifyingKey),
    /// RSA public key
    Rsa(rsa::RsaPublicKey),
}

impl PublicKey {
    /// Get the key type
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Ed25519(_) => KeyType::Ed25519,
            PublicKey::Rsa(_) => KeyType::Rsa,
        }
    }

    /// Raw key material bytes (the 32-byte point for Ed25519, the modulus for RSA)
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::Rsa(key) => key.n().to_bytes_be(),
        }
    }

    /// Short hex fingerprint of the key material, for diagnostics
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let digest = Sha256::digest(self.to_bytes());
        hex::encode(&digest[..8])
    }
}

impl Verifier for PublicKey {
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        match (self, signature) {
            (PublicKey::Ed25519(key), Signature::Ed25519(sig)) => {
                use ed25519_dalek::Verifier as _;
                key.verify(message, sig).map_err(|_| {
                    Error::Verification("Ed25519 signature verification failed".to_string())
                })
            }
            (PublicKey::Rsa(key), Signature::RsaPss(sig)) => rsa_pss::verify(key, message, sig),
            _ => Err(Error::InvalidKeyType("Key type mismatch".to_string())),
        }
    }
}

/// Private key abstraction
#[derive(Clone)]
pub enum PrivateKey {
    /// Ed25519 private key
    Ed25519(ed25519_dalek::SigningKey),
    /// RSA private key
    Rsa(rsa::RsaPrivateKey),
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret material is never printed
        match self {
            PrivateKey::Ed25519(_) => f.write_str("PrivateKey::Ed25519(..)"),
            PrivateKey::Rsa(_) => f.write_str("PrivateKey::Rsa(..)"),
        }
    }
}

impl PrivateKey {
    /// Get the key type
    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Ed25519(_) => KeyType::Ed25519,
            PrivateKey::Rsa(_) => KeyType::Rsa,
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            PrivateKey::Rsa(key) => PublicKey::Rsa(rsa::RsaPublicKey::from(key)),
        }
    }
}

impl Signer for PrivateKey {
    fn sign(&self, message: &[u8]) -> Result<Signature> {
        match self {
            PrivateKey::Ed25519(key) => {
                use ed25519_dalek::Signer as _;
                Ok(Signature::Ed25519(key.sign(message)))
            }
            PrivateKey::Rsa(key) => Ok(Signature::RsaPss(rsa_pss::sign(key, message)?)),
        }
    }
}

/// Key pair containing both private and public keys
#[derive(Debug, Clone)]
pub struct KeyPair {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair
    pub fn generate(key_type: KeyType) -> Result<Self> {
        let private_key = match key_type {
            KeyType::Ed25519 => {
                let mut seed = [0u8; 32];
                OsRng.fill_bytes(&mut seed);
                PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
            }
            KeyType::Rsa => PrivateKey::Rsa(rsa_pss::generate_private_key()?),
        };
        Ok(Self::from_private_key(private_key))
    }

    /// Create a key pair from an existing private key
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Get the key type
    pub fn key_type(&self) -> KeyType {
        self.private_key.key_type()
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Get the private key
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

impl Signer for KeyPair {
    fn sign(&self, message: &[u8]) -> Result<Signature> {
        self.private_key.sign(message)
    }
}

impl Verifier for KeyPair {
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        self.public_key.verify(message, signature)
    }
}
