//! Trusted Agent Protocol: an RFC 9421 HTTP Message Signatures profile
//!
//! Agents sign outgoing requests with [`TapSigner`]; merchants verify them
//! with [`TapVerifier`] against a registry of trusted agent keys. The
//! profile uses a single signature label (`sig1`), a fixed set of derived
//! components, and mandatory `created` / `expires` / `keyid` / `alg` /
//! `nonce` / `tag` parameters.

pub mod canonicalize;
pub mod components;
pub mod middleware;
pub mod nonce;
pub mod signer;
pub mod verifier;

pub use components::{CoveredComponent, SignatureParams};
pub use middleware::{RoutePolicy, TapMiddleware, TapStatus};
pub use signer::{SignatureComponents, TapSigner};
pub use verifier::{
    AgentRegistration, TapVerifier, VerificationErrorKind, VerificationResult, VerifierConfig,
};

use crate::crypto::KeyType;
use serde::{Deserialize, Serialize};

/// Current unix time in seconds. A clock before the epoch reads as zero,
/// which the temporal checks then reject.
pub(crate) fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(_) => 0,
    }
}

/// Signature algorithms admitted by the TAP profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Ed25519 signature algorithm
    #[serde(rename = "ed25519")]
    Ed25519,
    /// RSASSA-PSS with SHA-256
    #[serde(rename = "rsa-pss-sha256")]
    RsaPssSha256,
}

impl SignatureAlgorithm {
    /// Get the algorithm identifier string as it appears in the `alg` parameter
    pub fn identifier(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "ed25519",
            SignatureAlgorithm::RsaPssSha256 => "rsa-pss-sha256",
        }
    }

    /// Parse an `alg` parameter value
    pub fn from_identifier(s: &str) -> Option<Self> {
        match s {
            "ed25519" => Some(SignatureAlgorithm::Ed25519),
            "rsa-pss-sha256" => Some(SignatureAlgorithm::RsaPssSha256),
            _ => None,
        }
    }

    /// The key material this algorithm signs with
    pub fn key_type(&self) -> KeyType {
        match self {
            SignatureAlgorithm::Ed25519 => KeyType::Ed25519,
            SignatureAlgorithm::RsaPssSha256 => KeyType::Rsa,
        }
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Declared intent of an agent-merchant interaction, carried as the `tag`
/// signature parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    /// Product discovery, cart inspection
    Browsing,
    /// Order placement
    Checkout,
}

impl InteractionType {
    /// Wire label used in the `tag` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Browsing => "browsing",
            InteractionType::Checkout => "checkout",
        }
    }

    /// Map a received `tag` value; anything other than `checkout` is browsing
    pub fn from_tag(tag: &str) -> Self {
        if tag == "checkout" {
            InteractionType::Checkout
        } else {
            InteractionType::Browsing
        }
    }
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
