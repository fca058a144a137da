//! Security-focused tests: tampering, replay, freshness, algorithm binding

use http::HeaderMap;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tap_core::crypto::Signer;
use tap_core::formats::KeyExporter;
use tap_core::tap::canonicalize;
use tap_core::tap::components::{CoveredComponent, SignatureParams};
use tap_core::{
    InteractionType, KeyPair, KeyType, SignatureAlgorithm, TapSigner, TapVerifier,
    VerificationErrorKind,
};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Hand-assemble signed headers so tests control created / expires / nonce.
fn craft_headers(
    keypair: &KeyPair,
    params: &SignatureParams,
    method: &str,
    url: &str,
    body: Option<&[u8]>,
    extra_headers: &[(&str, &str)],
) -> HeaderMap {
    let params_line = params.to_string();
    let (authority, path) = canonicalize::split_url(url).unwrap();

    let mut header_values = HashMap::new();
    for (name, value) in extra_headers {
        header_values.insert(name.to_string(), value.to_string());
    }

    let canonical_values = canonicalize::canonicalize_components(
        &params.covered_components,
        method,
        &authority,
        &path,
        body,
        &header_values,
    )
    .unwrap();
    let base = canonicalize::build_signature_base(&canonical_values, &params_line);
    let signature = keypair.sign(base.as_bytes()).unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        "signature",
        format!("sig1=:{}:", signature.to_base64()).parse().unwrap(),
    );
    headers.insert(
        "signature-input",
        format!("sig1={params_line}").parse().unwrap(),
    );
    for (name, value) in extra_headers {
        headers.insert(
            http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            value.parse().unwrap(),
        );
    }
    headers
}

fn fresh_params(keyid: &str, alg: &str, covered: Vec<CoveredComponent>) -> SignatureParams {
    let now = unix_now();
    SignatureParams {
        covered_components: covered,
        created: now,
        expires: now + 300,
        keyid: keyid.to_string(),
        alg: alg.to_string(),
        nonce: uuid::Uuid::new_v4().to_string(),
        tag: "browsing".to_string(),
    }
}

fn base_components() -> Vec<CoveredComponent> {
    vec![
        CoveredComponent::Method,
        CoveredComponent::Authority,
        CoveredComponent::Path,
    ]
}

fn registered_verifier(keypair: &KeyPair, algorithm: SignatureAlgorithm) -> TapVerifier {
    let verifier = TapVerifier::new();
    verifier
        .register_agent(
            "urn:agent:a",
            &keypair.public_key().to_pem().unwrap(),
            Some("Agent A"),
            algorithm,
        )
        .unwrap();
    verifier
}

const URL: &str = "https://merchant.example/api/products?q=headphones";

#[test]
fn test_tampered_method_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);
    let params = fresh_params("urn:agent:a", "ed25519", base_components());
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    let result = verifier.verify("POST", URL, &headers, None);
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );
}

#[test]
fn test_tampered_authority_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);
    let params = fresh_params("urn:agent:a", "ed25519", base_components());
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    let result = verifier.verify(
        "GET",
        "https://evil.example/api/products?q=headphones",
        &headers,
        None,
    );
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );
}

#[test]
fn test_tampered_query_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);
    let params = fresh_params("urn:agent:a", "ed25519", base_components());
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    let result = verifier.verify(
        "GET",
        "https://merchant.example/api/products?q=speakers",
        &headers,
        None,
    );
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );
}

#[test]
fn test_tampered_body_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);

    let mut covered = base_components();
    covered.push(CoveredComponent::ContentDigest);
    let params = fresh_params("urn:agent:a", "ed25519", covered);
    let headers = craft_headers(
        &keypair,
        &params,
        "POST",
        URL,
        Some(b"{\"cart\":\"c1\"}"),
        &[],
    );

    let result = verifier.verify("POST", URL, &headers, Some(b"{\"cart\":\"c2\"}"));
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );
}

#[test]
fn test_tampered_covered_header_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);

    let mut covered = base_components();
    covered.push(CoveredComponent::Header("x-agent-session".to_string()));
    let params = fresh_params("urn:agent:a", "ed25519", covered);
    let headers = craft_headers(
        &keypair,
        &params,
        "GET",
        URL,
        None,
        &[("x-agent-session", "s-1")],
    );

    // Same signature, different header value on the live request
    let mut tampered = headers.clone();
    tampered.insert("x-agent-session", "s-2".parse().unwrap());

    let result = verifier.verify("GET", URL, &tampered, None);
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );
}

#[test]
fn test_corrupted_signature_bit_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);
    let signer = TapSigner::from_private_key(
        keypair.private_key().clone(),
        "urn:agent:a",
        SignatureAlgorithm::Ed25519,
    )
    .unwrap();

    let components = signer
        .sign("GET", URL, None, InteractionType::Browsing, None)
        .unwrap();

    // Flip one character inside the base64 payload
    let mut corrupted = components.signature.clone();
    let payload_start = corrupted.find(':').unwrap() + 1;
    let target = payload_start + 10;
    let original_char = corrupted.as_bytes()[target] as char;
    let replacement = if original_char == 'A' { 'B' } else { 'A' };
    corrupted.replace_range(target..target + 1, &replacement.to_string());

    let mut headers = components.to_headers().unwrap();
    headers.insert("signature", corrupted.parse().unwrap());

    let result = verifier.verify("GET", URL, &headers, None);
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );
}

#[test]
fn test_replay_detected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);
    let params = fresh_params("urn:agent:a", "ed25519", base_components());
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    assert!(verifier.verify("GET", URL, &headers, None).is_valid());
    let replayed = verifier.verify("GET", URL, &headers, None);
    assert_eq!(
        replayed.error_kind(),
        Some(VerificationErrorKind::NonceReplay)
    );
}

#[test]
fn test_failed_verification_does_not_burn_nonce() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);
    let params = fresh_params("urn:agent:a", "ed25519", base_components());
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    // First attempt arrives tampered and fails
    let tampered = verifier.verify("DELETE", URL, &headers, None);
    assert_eq!(
        tampered.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );

    // The genuine request must still be accepted
    assert!(verifier.verify("GET", URL, &headers, None).is_valid());
}

#[test]
fn test_wrong_registered_key_rejected() {
    let keypair_a = KeyPair::generate(KeyType::Ed25519).unwrap();
    let keypair_b = KeyPair::generate(KeyType::Ed25519).unwrap();

    // Agent B's public key is registered under agent A's keyid
    let verifier = registered_verifier(&keypair_b, SignatureAlgorithm::Ed25519);

    let params = fresh_params("urn:agent:a", "ed25519", base_components());
    let headers = craft_headers(&keypair_a, &params, "GET", URL, None, &[]);

    let result = verifier.verify("GET", URL, &headers, None);
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::InvalidSignature)
    );
}

#[test]
fn test_algorithm_binding_checked_before_crypto() {
    let ed_keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let rsa_keypair = KeyPair::generate(KeyType::Rsa).unwrap();

    // The registration for this keyid demands RSA-PSS
    let verifier = registered_verifier(&rsa_keypair, SignatureAlgorithm::RsaPssSha256);

    // An Ed25519 signature claiming alg="ed25519" under that keyid must be
    // rejected as a mismatch, not as a bad signature
    let params = fresh_params("urn:agent:a", "ed25519", base_components());
    let headers = craft_headers(&ed_keypair, &params, "GET", URL, None, &[]);

    let result = verifier.verify("GET", URL, &headers, None);
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::AlgorithmMismatch)
    );
}

#[test]
fn test_unknown_algorithm_label_is_a_mismatch() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);

    let params = fresh_params("urn:agent:a", "hmac-sha256", base_components());
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    let result = verifier.verify("GET", URL, &headers, None);
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::AlgorithmMismatch)
    );
}

#[test]
fn test_expired_signature_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);

    let now = unix_now();
    let mut params = fresh_params("urn:agent:a", "ed25519", base_components());
    params.created = now - 100;
    params.expires = now - 10;
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    let result = verifier.verify("GET", URL, &headers, None);
    assert_eq!(result.error_kind(), Some(VerificationErrorKind::Expired));
}

#[test]
fn test_too_old_signature_rejected() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);

    // Still inside the expiry window, but older than max_signature_age
    let now = unix_now();
    let mut params = fresh_params("urn:agent:a", "ed25519", base_components());
    params.created = now - 301;
    params.expires = now + 100;
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);

    let result = verifier.verify("GET", URL, &headers, None);
    assert_eq!(result.error_kind(), Some(VerificationErrorKind::TooOld));
}

#[test]
fn test_clock_skew_window() {
    let keypair = KeyPair::generate(KeyType::Ed25519).unwrap();
    let verifier = registered_verifier(&keypair, SignatureAlgorithm::Ed25519);

    // created 30s in the future is inside the default 60s skew
    let now = unix_now();
    let mut params = fresh_params("urn:agent:a", "ed25519", base_components());
    params.created = now + 30;
    params.expires = now + 330;
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);
    assert!(verifier.verify("GET", URL, &headers, None).is_valid());

    // created 90s in the future is not
    let mut params = fresh_params("urn:agent:a", "ed25519", base_components());
    params.created = now + 90;
    params.expires = now + 390;
    let headers = craft_headers(&keypair, &params, "GET", URL, None, &[]);
    let result = verifier.verify("GET", URL, &headers, None);
    assert_eq!(
        result.error_kind(),
        Some(VerificationErrorKind::CreatedInFuture)
    );
}
