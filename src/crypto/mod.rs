//! Cryptographic primitives and key management

pub mod keys;
pub mod rsa_pss;
pub mod signature;

pub use keys::{KeyPair, KeyType, PrivateKey, PublicKey};
pub use signature::{Signature, Signer, Verifier};
