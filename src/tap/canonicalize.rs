//! Signature base canonicalization
//!
//! Signing and verification both funnel through this module so the two
//! sides hash identical bytes. Any deviation in whitespace or component
//! order invalidates signatures produced by a conformant peer.

use crate::error::{Error, Result};
use crate::tap::components::CoveredComponent;
use base64::{engine::general_purpose, Engine as _};
use http::Uri;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Compute the `content-digest` component value for a request body:
/// `sha-256=:<base64>:`
pub fn content_digest(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("sha-256=:{}:", general_purpose::STANDARD.encode(digest))
}

/// Decompose a URL into the authority and the path-with-query carried in
/// the signature base. An empty path becomes `/`; the scheme is dropped.
pub fn split_url(url: &str) -> Result<(String, String)> {
    let uri: Uri = url
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid URL: {url}")))?;

    let authority = uri
        .authority()
        .ok_or_else(|| Error::InvalidInput("URL has no authority".to_string()))?
        .to_string();

    let mut path = uri.path().to_string();
    if path.is_empty() {
        path = "/".to_string();
    }
    if let Some(query) = uri.query() {
        path = format!("{path}?{query}");
    }

    Ok((authority, path))
}

/// Resolve each covered component to its canonical value, in list order.
///
/// `headers` must be keyed by lowercase header name. Fails when a covered
/// header is absent from the request, or when `content-digest` is covered
/// but no body was supplied.
pub fn canonicalize_components(
    components: &[CoveredComponent],
    method: &str,
    authority: &str,
    path: &str,
    body: Option<&[u8]>,
    headers: &HashMap<String, String>,
) -> Result<Vec<(String, String)>> {
    let mut values = Vec::with_capacity(components.len());

    for component in components {
        let value = match component {
            CoveredComponent::Method => method.to_uppercase(),
            CoveredComponent::Authority => authority.to_string(),
            CoveredComponent::Path => path.to_string(),
            CoveredComponent::ContentDigest => match body {
                Some(bytes) if !bytes.is_empty() => content_digest(bytes),
                _ => {
                    return Err(Error::HttpSignature(
                        "content-digest is covered but the request has no body".to_string(),
                    ))
                }
            },
            CoveredComponent::Header(name) => headers
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| {
                    Error::HttpSignature(format!("covered header {name} not present"))
                })?,
        };

        values.push((component.identifier(), value));
    }

    Ok(values)
}

/// Build the signature base string: one line per covered component, then
/// the `@signature-params` line, joined by `\n` with no trailing newline.
pub fn build_signature_base(components: &[(String, String)], signature_params: &str) -> String {
    let mut lines = Vec::with_capacity(components.len() + 1);

    for (name, value) in components {
        lines.push(format!("\"{name}\": {value}"));
    }

    lines.push(format!("\"@signature-params\": {signature_params}"));

    lines.join("\n")
}
