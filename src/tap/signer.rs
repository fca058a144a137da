//! TAP request signing

use crate::crypto::{PrivateKey, Signer as _};
use crate::error::{Error, Result};
use crate::formats::KeyImporter;
use crate::tap::canonicalize;
use crate::tap::components::{CoveredComponent, SignatureParams};
use crate::tap::{unix_now, InteractionType, SignatureAlgorithm};
use http::{HeaderMap, HeaderValue};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Default signature validity window in seconds
pub const DEFAULT_VALIDITY_SECONDS: u64 = 300;

/// Output of signing a request: the two header values plus the decomposed
/// parameters, kept for logging
#[derive(Debug, Clone)]
pub struct SignatureComponents {
    /// `Signature` header value: `sig1=:<base64>:`
    pub signature: String,
    /// `Signature-Input` header value: `sig1=<params-line>`
    pub signature_input: String,
    /// Signer identifier
    pub keyid: String,
    /// Creation time, unix seconds
    pub created: i64,
    /// Expiry time, unix seconds
    pub expires: i64,
    /// Fresh nonce carried by this signature
    pub nonce: String,
    /// Algorithm that produced the signature
    pub algorithm: SignatureAlgorithm,
    /// Declared interaction intent
    pub interaction_type: InteractionType,
}

impl SignatureComponents {
    /// Render the two signature headers ready to merge into a request
    pub fn to_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "signature",
            HeaderValue::from_str(&self.signature)
                .map_err(|_| Error::HttpSignature("invalid signature header value".to_string()))?,
        );
        headers.insert(
            "signature-input",
            HeaderValue::from_str(&self.signature_input).map_err(|_| {
                Error::HttpSignature("invalid signature-input header value".to_string())
            })?,
        );
        Ok(headers)
    }
}

/// Signs outgoing agent requests under the TAP profile.
///
/// A signer is created once per agent identity and holds only immutable
/// state, so it can be shared freely across request tasks.
pub struct TapSigner {
    private_key: PrivateKey,
    keyid: String,
    algorithm: SignatureAlgorithm,
    validity_seconds: u64,
}

impl TapSigner {
    /// Create a signer from a PEM private key.
    ///
    /// Fails when the PEM is malformed or the key does not match
    /// `algorithm`.
    pub fn new(
        private_key_pem: &str,
        keyid: impl Into<String>,
        algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        let private_key = PrivateKey::from_pem(private_key_pem)?;
        Self::from_private_key(private_key, keyid, algorithm)
    }

    /// Create a signer from an already-parsed private key
    pub fn from_private_key(
        private_key: PrivateKey,
        keyid: impl Into<String>,
        algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        if private_key.key_type() != algorithm.key_type() {
            return Err(Error::KeyLoad(format!(
                "private key does not match algorithm {algorithm}"
            )));
        }

        Ok(Self {
            private_key,
            keyid: keyid.into(),
            algorithm,
            validity_seconds: DEFAULT_VALIDITY_SECONDS,
        })
    }

    /// Override the validity window (`expires - created`)
    pub fn with_validity(mut self, seconds: u64) -> Self {
        self.validity_seconds = seconds;
        self
    }

    /// The keyid emitted in signature parameters
    pub fn keyid(&self) -> &str {
        &self.keyid
    }

    /// The algorithm this signer uses
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Sign an outgoing request.
    ///
    /// Covers `@method`, `@authority` and `@path` always, `content-digest`
    /// when a non-empty body is supplied, and each extra header (lowercased,
    /// in lexicographic name order). `body` must be the exact bytes the HTTP
    /// layer will transmit.
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        interaction_type: InteractionType,
        extra_headers: Option<&BTreeMap<String, String>>,
    ) -> Result<SignatureComponents> {
        let (authority, path) = canonicalize::split_url(url)?;
        let body = body.filter(|bytes| !bytes.is_empty());

        let created = unix_now();
        let expires = created + self.validity_seconds as i64;
        let nonce = Uuid::new_v4().to_string();

        let mut covered_components = vec![
            CoveredComponent::Method,
            CoveredComponent::Authority,
            CoveredComponent::Path,
        ];
        if body.is_some() {
            covered_components.push(CoveredComponent::ContentDigest);
        }

        let mut header_values = HashMap::new();
        if let Some(extra) = extra_headers {
            // BTreeMap iteration gives the lexicographic tie-break order
            for (name, value) in extra {
                let name = name.to_lowercase();
                covered_components.push(CoveredComponent::Header(name.clone()));
                header_values.insert(name, value.clone());
            }
        }

        let params = SignatureParams {
            covered_components,
            created,
            expires,
            keyid: self.keyid.clone(),
            alg: self.algorithm.identifier().to_string(),
            nonce: nonce.clone(),
            tag: interaction_type.as_str().to_string(),
        };
        let params_line = params.to_string();

        let canonical_values = canonicalize::canonicalize_components(
            &params.covered_components,
            method,
            &authority,
            &path,
            body,
            &header_values,
        )?;
        let signature_base = canonicalize::build_signature_base(&canonical_values, &params_line);

        let signature = self.private_key.sign(signature_base.as_bytes())?;

        Ok(SignatureComponents {
            signature: format!("sig1=:{}:", signature.to_base64()),
            signature_input: format!("sig1={params_line}"),
            keyid: self.keyid.clone(),
            created,
            expires,
            nonce,
            algorithm: self.algorithm,
            interaction_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, KeyType};

    fn ed25519_signer() -> TapSigner {
        let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
        TapSigner::from_private_key(
            keypair.private_key().clone(),
            "urn:agent:test",
            SignatureAlgorithm::Ed25519,
        )
        .unwrap()
    }

    #[test]
    fn test_header_framing() {
        let signer = ed25519_signer();
        let components = signer
            .sign(
                "GET",
                "https://merchant.example/api/products",
                None,
                InteractionType::Browsing,
                None,
            )
            .unwrap();

        assert!(components.signature.starts_with("sig1=:"));
        assert!(components.signature.ends_with(':'));
        assert!(components.signature_input.starts_with("sig1=(\"@method\""));
        assert_eq!(components.expires - components.created, 300);
    }

    #[test]
    fn test_content_digest_only_with_body() {
        let signer = ed25519_signer();

        let without_body = signer
            .sign(
                "GET",
                "https://merchant.example/api/products",
                None,
                InteractionType::Browsing,
                None,
            )
            .unwrap();
        assert!(!without_body.signature_input.contains("content-digest"));

        let empty_body = signer
            .sign(
                "POST",
                "https://merchant.example/api/cart",
                Some(b""),
                InteractionType::Browsing,
                None,
            )
            .unwrap();
        assert!(!empty_body.signature_input.contains("content-digest"));

        let with_body = signer
            .sign(
                "POST",
                "https://merchant.example/api/cart",
                Some(b"{\"item\":\"sku-1\"}"),
                InteractionType::Checkout,
                None,
            )
            .unwrap();
        assert!(with_body.signature_input.contains("\"content-digest\""));
    }

    #[test]
    fn test_extra_headers_lowercased_and_ordered() {
        let signer = ed25519_signer();
        let mut extra = BTreeMap::new();
        extra.insert("X-Agent-Session".to_string(), "s-123".to_string());
        extra.insert("Accept".to_string(), "application/json".to_string());

        let components = signer
            .sign(
                "GET",
                "https://merchant.example/api/products",
                None,
                InteractionType::Browsing,
                Some(&extra),
            )
            .unwrap();

        let accept = components.signature_input.find("\"accept\"").unwrap();
        let session = components
            .signature_input
            .find("\"x-agent-session\"")
            .unwrap();
        assert!(accept < session);
    }

    #[test]
    fn test_nonces_are_fresh() {
        let signer = ed25519_signer();
        let first = signer
            .sign(
                "GET",
                "https://merchant.example/",
                None,
                InteractionType::Browsing,
                None,
            )
            .unwrap();
        let second = signer
            .sign(
                "GET",
                "https://merchant.example/",
                None,
                InteractionType::Browsing,
                None,
            )
            .unwrap();
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn test_algorithm_mismatch_rejected_at_construction() {
        let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
        let result = TapSigner::from_private_key(
            keypair.private_key().clone(),
            "urn:agent:test",
            SignatureAlgorithm::RsaPssSha256,
        );
        assert!(result.is_err());
    }
}
