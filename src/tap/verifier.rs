//! TAP signature verification
//!
//! The verifier owns the trusted-agent registry and the replay-protection
//! store. Verification is a linear pipeline; the first failing check is
//! terminal for the request and never mutates the nonce store.

use crate::crypto::{PublicKey, Signature, Verifier as _};
use crate::error::{Error, Result};
use crate::formats::KeyImporter;
use crate::tap::canonicalize;
use crate::tap::components::SignatureParams;
use crate::tap::nonce::{NonceStore, DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER};
use crate::tap::{unix_now, InteractionType, SignatureAlgorithm};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// Verifier tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Tolerated clock skew for `created` (seconds)
    #[serde(default = "default_clock_skew")]
    pub max_clock_skew_seconds: i64,
    /// Maximum accepted signature age (seconds)
    #[serde(default = "default_signature_age")]
    pub max_signature_age_seconds: i64,
    /// Nonce store size that triggers eviction of expired entries
    #[serde(default = "default_high_water")]
    pub nonce_high_water: usize,
    /// Nonce store size eviction aims for
    #[serde(default = "default_low_water")]
    pub nonce_low_water: usize,
}

fn default_clock_skew() -> i64 {
    60
}

fn default_signature_age() -> i64 {
    300
}

fn default_high_water() -> usize {
    DEFAULT_HIGH_WATER
}

fn default_low_water() -> usize {
    DEFAULT_LOW_WATER
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_clock_skew_seconds: default_clock_skew(),
            max_signature_age_seconds: default_signature_age(),
            nonce_high_water: default_high_water(),
            nonce_low_water: default_low_water(),
        }
    }
}

/// A trusted agent known to the verifier, keyed by `keyid`
#[derive(Debug, Clone)]
pub struct AgentRegistration {
    /// Parsed public key; immutable after registration
    pub public_key: PublicKey,
    /// Human-readable name used in diagnostics and results
    pub display_name: String,
    /// Algorithm every signature claiming this keyid must use
    pub expected_algorithm: SignatureAlgorithm,
}

/// The reason a verification failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationErrorKind {
    /// Missing or unparseable `Signature` / `Signature-Input`
    MalformedHeaders,
    /// `keyid` is not in the registry
    UnknownKey,
    /// `alg` differs from the registered algorithm
    AlgorithmMismatch,
    /// `created` is too far in the future
    CreatedInFuture,
    /// `expires` has passed
    Expired,
    /// `created` is older than the maximum signature age
    TooOld,
    /// The `(keyid, nonce)` pair was already accepted
    NonceReplay,
    /// Cryptographic verification failed
    InvalidSignature,
    /// A covered component could not be resolved from the request
    BaseReconstructionFailed,
}

impl std::fmt::Display for VerificationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VerificationErrorKind::MalformedHeaders => "MalformedHeaders",
            VerificationErrorKind::UnknownKey => "UnknownKey",
            VerificationErrorKind::AlgorithmMismatch => "AlgorithmMismatch",
            VerificationErrorKind::CreatedInFuture => "CreatedInFuture",
            VerificationErrorKind::Expired => "Expired",
            VerificationErrorKind::TooOld => "TooOld",
            VerificationErrorKind::NonceReplay => "NonceReplay",
            VerificationErrorKind::InvalidSignature => "InvalidSignature",
            VerificationErrorKind::BaseReconstructionFailed => "BaseReconstructionFailed",
        };
        f.write_str(name)
    }
}

/// Outcome of verifying one request
#[derive(Debug, Clone)]
pub enum VerificationResult {
    /// The request was signed by a trusted agent
    Valid {
        /// Registered display name of the agent
        agent_id: String,
        /// Intent the signer declared in the `tag` parameter
        interaction_type: InteractionType,
        /// Keyid the signature was made under
        keyid: String,
        /// Signature creation time
        created: i64,
        /// Signature expiry time
        expires: i64,
    },
    /// The request failed verification
    Invalid {
        /// What went wrong
        kind: VerificationErrorKind,
        /// Diagnostic message; never contains key or signature material
        message: String,
        /// Keyid, when parsing got that far
        keyid: Option<String>,
        /// Creation time, when parsing got that far
        created: Option<i64>,
        /// Expiry time, when parsing got that far
        expires: Option<i64>,
    },
}

impl VerificationResult {
    /// Whether verification succeeded
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid { .. })
    }

    /// Whether this is a valid browsing interaction
    pub fn is_browsing(&self) -> bool {
        matches!(
            self,
            VerificationResult::Valid {
                interaction_type: InteractionType::Browsing,
                ..
            }
        )
    }

    /// Whether this is a valid checkout interaction
    pub fn is_checkout(&self) -> bool {
        matches!(
            self,
            VerificationResult::Valid {
                interaction_type: InteractionType::Checkout,
                ..
            }
        )
    }

    /// The failure kind, for invalid results
    pub fn error_kind(&self) -> Option<VerificationErrorKind> {
        match self {
            VerificationResult::Valid { .. } => None,
            VerificationResult::Invalid { kind, .. } => Some(*kind),
        }
    }
}

/// Verifies TAP signatures on incoming requests against a registry of
/// trusted agents.
///
/// The registry takes a readers-writer discipline: registrations are rare
/// (startup, key rotation) while verifications read concurrently. The
/// nonce store serializes its check-and-insert per request.
#[derive(Debug)]
pub struct TapVerifier {
    config: VerifierConfig,
    agents: RwLock<HashMap<String, AgentRegistration>>,
    nonces: Mutex<NonceStore>,
}

impl TapVerifier {
    /// Create a verifier with default configuration
    pub fn new() -> Self {
        Self::with_config(VerifierConfig::default())
    }

    /// Create a verifier with explicit configuration
    pub fn with_config(config: VerifierConfig) -> Self {
        let nonces = NonceStore::new(config.nonce_high_water, config.nonce_low_water);
        Self {
            config,
            agents: RwLock::new(HashMap::new()),
            nonces: Mutex::new(nonces),
        }
    }

    /// Register a trusted agent. Re-registering a keyid replaces the
    /// earlier entry.
    ///
    /// Fails when the PEM is malformed or the key does not match
    /// `expected_algorithm`.
    pub fn register_agent(
        &self,
        keyid: &str,
        public_key_pem: &str,
        name: Option<&str>,
        expected_algorithm: SignatureAlgorithm,
    ) -> Result<()> {
        let public_key = PublicKey::from_pem(public_key_pem)?;
        if public_key.key_type() != expected_algorithm.key_type() {
            return Err(Error::KeyLoad(format!(
                "public key does not match algorithm {expected_algorithm}"
            )));
        }

        tracing::info!(
            keyid,
            fingerprint = %public_key.fingerprint(),
            algorithm = %expected_algorithm,
            "registered trusted agent"
        );

        let registration = AgentRegistration {
            public_key,
            display_name: name.unwrap_or(keyid).to_string(),
            expected_algorithm,
        };
        self.write_agents().insert(keyid.to_string(), registration);
        Ok(())
    }

    /// Whether a keyid is registered
    pub fn has_agent(&self, keyid: &str) -> bool {
        self.read_agents().contains_key(keyid)
    }

    /// Verify a signed request.
    ///
    /// `headers` are the live request headers; `body` must be the exact
    /// bytes received on the wire. Failures are reported as
    /// [`VerificationResult::Invalid`], never as panics or errors.
    pub fn verify(
        &self,
        method: &str,
        url: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> VerificationResult {
        // 1. Both headers must be present and well formed.
        let Some(signature_header) = header_str(headers, "signature") else {
            return malformed("missing Signature header");
        };
        let Some(signature_input) = header_str(headers, "signature-input") else {
            return malformed("missing Signature-Input header");
        };

        // 2. Parse the signature payload and the parameters. The params
        //    line is the verbatim suffix of Signature-Input after `sig1=`;
        //    it is reused for the @signature-params base line without
        //    re-rendering.
        let Some(params_line) = signature_input.strip_prefix("sig1=") else {
            return malformed("Signature-Input does not carry the sig1 label");
        };
        let signature_bytes = match parse_signature_header(&signature_header) {
            Ok(bytes) => bytes,
            Err(e) => return malformed(&e.to_string()),
        };
        let params = match parse_signature_input(&signature_input) {
            Ok(params) => params,
            Err(e) => return malformed(&e.to_string()),
        };

        // 3. The keyid must belong to a registered agent.
        let Some(agent) = self.read_agents().get(&params.keyid).cloned() else {
            return invalid(
                VerificationErrorKind::UnknownKey,
                format!("unknown agent keyid: {}", params.keyid),
                &params,
            );
        };

        // 4. The declared algorithm must match the registration, before
        //    any cryptographic work.
        if agent.expected_algorithm.identifier() != params.alg {
            return invalid(
                VerificationErrorKind::AlgorithmMismatch,
                format!(
                    "signature algorithm {} does not match registration",
                    params.alg
                ),
                &params,
            );
        }

        // 5. Temporal checks.
        let now = unix_now();
        if params.created > now + self.config.max_clock_skew_seconds {
            return invalid(
                VerificationErrorKind::CreatedInFuture,
                "signature created in the future".to_string(),
                &params,
            );
        }
        if params.expires < now {
            return invalid(
                VerificationErrorKind::Expired,
                "signature has expired".to_string(),
                &params,
            );
        }
        if now - params.created > self.config.max_signature_age_seconds {
            return invalid(
                VerificationErrorKind::TooOld,
                "signature too old".to_string(),
                &params,
            );
        }

        // 6. Replay pre-check. Admission is decided again at commit time.
        if self.lock_nonces().contains(&params.keyid, &params.nonce) {
            return invalid(
                VerificationErrorKind::NonceReplay,
                "nonce already used".to_string(),
                &params,
            );
        }

        // 7. Reconstruct the signature base from the live request.
        let (authority, path) = match canonicalize::split_url(url) {
            Ok(parts) => parts,
            Err(e) => {
                return invalid(
                    VerificationErrorKind::BaseReconstructionFailed,
                    e.to_string(),
                    &params,
                )
            }
        };
        let header_values = collect_header_values(headers);
        let body = body.filter(|bytes| !bytes.is_empty());
        let canonical_values = match canonicalize::canonicalize_components(
            &params.covered_components,
            method,
            &authority,
            &path,
            body,
            &header_values,
        ) {
            Ok(values) => values,
            Err(e) => {
                return invalid(
                    VerificationErrorKind::BaseReconstructionFailed,
                    e.to_string(),
                    &params,
                )
            }
        };
        let signature_base = canonicalize::build_signature_base(&canonical_values, params_line);

        // 8. Cryptographic verification against the registered key.
        let signature = match agent.expected_algorithm {
            SignatureAlgorithm::Ed25519 => {
                match ed25519_dalek::Signature::try_from(signature_bytes.as_slice()) {
                    Ok(sig) => Signature::Ed25519(sig),
                    Err(_) => {
                        return invalid(
                            VerificationErrorKind::InvalidSignature,
                            "malformed Ed25519 signature".to_string(),
                            &params,
                        )
                    }
                }
            }
            SignatureAlgorithm::RsaPssSha256 => Signature::RsaPss(signature_bytes),
        };
        if agent
            .public_key
            .verify(signature_base.as_bytes(), &signature)
            .is_err()
        {
            return invalid(
                VerificationErrorKind::InvalidSignature,
                "invalid signature".to_string(),
                &params,
            );
        }

        // 9. Map the declared tag.
        let interaction_type = InteractionType::from_tag(&params.tag);

        // 10. Commit the nonce. The insert re-checks membership under the
        //     lock, so of two concurrent requests carrying the same pair
        //     exactly one is admitted.
        if !self
            .lock_nonces()
            .insert(&params.keyid, &params.nonce, params.expires, now)
        {
            return invalid(
                VerificationErrorKind::NonceReplay,
                "nonce already used".to_string(),
                &params,
            );
        }

        tracing::debug!(
            agent = %agent.display_name,
            keyid = %params.keyid,
            interaction = %interaction_type,
            "verified agent request"
        );

        VerificationResult::Valid {
            agent_id: agent.display_name,
            interaction_type,
            keyid: params.keyid,
            created: params.created,
            expires: params.expires,
        }
    }

    fn read_agents(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, AgentRegistration>> {
        self.agents.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_agents(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, AgentRegistration>> {
        self.agents.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_nonces(&self) -> std::sync::MutexGuard<'_, NonceStore> {
        self.nonces.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TapVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch a header as a string, case-insensitively
fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Lowercased header name -> value map for base reconstruction. Repeated
/// headers are joined with a comma and space.
fn collect_header_values(headers: &HeaderMap) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        values.insert(name.as_str().to_string(), joined);
    }
    values
}

/// Parse the `Signature` header, expecting a single `sig1` byte sequence
fn parse_signature_header(header: &str) -> Result<Vec<u8>> {
    let dictionary = sfv::Parser::new(header)
        .parse_dictionary()
        .map_err(|e| Error::HttpSignature(format!("invalid Signature header: {e}")))?;

    let mut entries = dictionary.into_iter();
    let (label, entry) = entries
        .next()
        .ok_or_else(|| Error::HttpSignature("empty Signature header".to_string()))?;
    if entries.next().is_some() {
        return Err(Error::HttpSignature(
            "exactly one signature label is expected".to_string(),
        ));
    }
    if label.as_str() != "sig1" {
        return Err(Error::HttpSignature(
            "Signature does not carry the sig1 label".to_string(),
        ));
    }

    match entry {
        sfv::ListEntry::Item(item) => match item.bare_item {
            sfv::BareItem::ByteSequence(bytes) => Ok(bytes),
            _ => Err(Error::HttpSignature(
                "signature payload is not a byte sequence".to_string(),
            )),
        },
        sfv::ListEntry::InnerList(_) => Err(Error::HttpSignature(
            "signature payload is not a byte sequence".to_string(),
        )),
    }
}

/// Parse the `Signature-Input` header, expecting a single `sig1` inner list
fn parse_signature_input(header: &str) -> Result<SignatureParams> {
    let dictionary = sfv::Parser::new(header)
        .parse_dictionary()
        .map_err(|e| Error::HttpSignature(format!("invalid Signature-Input header: {e}")))?;

    let mut entries = dictionary.into_iter();
    let (label, entry) = entries
        .next()
        .ok_or_else(|| Error::HttpSignature("empty Signature-Input header".to_string()))?;
    if entries.next().is_some() {
        return Err(Error::HttpSignature(
            "exactly one signature label is expected".to_string(),
        ));
    }
    if label.as_str() != "sig1" {
        return Err(Error::HttpSignature(
            "Signature-Input does not carry the sig1 label".to_string(),
        ));
    }

    match entry {
        sfv::ListEntry::InnerList(inner) => SignatureParams::from_inner_list(&inner),
        sfv::ListEntry::Item(_) => Err(Error::HttpSignature(
            "Signature-Input value is not an inner list".to_string(),
        )),
    }
}

fn malformed(message: &str) -> VerificationResult {
    VerificationResult::Invalid {
        kind: VerificationErrorKind::MalformedHeaders,
        message: message.to_string(),
        keyid: None,
        created: None,
        expires: None,
    }
}

fn invalid(
    kind: VerificationErrorKind,
    message: String,
    params: &SignatureParams,
) -> VerificationResult {
    tracing::warn!(kind = %kind, keyid = %params.keyid, "verification failed: {message}");
    VerificationResult::Invalid {
        kind,
        message,
        keyid: Some(params.keyid.clone()),
        created: Some(params.created),
        expires: Some(params.expires),
    }
}
