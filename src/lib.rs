//! TAP Core Library
//!
//! This library provides the cryptographic core of the Trusted Agent
//! Protocol (TAP): signing and verification of HTTP requests under a
//! profile of RFC 9421 HTTP Message Signatures, with Ed25519 and
//! RSA-PSS-SHA256 keys, content digests, and nonce-based replay
//! protection.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod crypto;
pub mod error;
pub mod formats;
pub mod tap;

// Re-export main types
pub use crypto::{KeyPair, KeyType, PrivateKey, PublicKey, Signature};
pub use error::{Error, Result};
pub use formats::{KeyExporter, KeyFormat, KeyImporter};
pub use tap::{
    InteractionType, SignatureAlgorithm, SignatureComponents, TapSigner, TapVerifier,
    VerificationErrorKind, VerificationResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
