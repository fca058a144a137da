//! Signature components and parameters for the TAP profile

use crate::error::{Error, Result};
use std::fmt;

/// A component covered by the signature base
///
/// The profile admits three derived components plus `content-digest` and
/// arbitrary (lowercased) request header names. Order is significant: the
/// signature base carries one line per component in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoveredComponent {
    /// HTTP method (`@method`)
    Method,
    /// URL authority (`@authority`)
    Authority,
    /// URL path including the query string (`@path`)
    Path,
    /// SHA-256 digest of the request body (`content-digest`)
    ContentDigest,
    /// Any other request header, by lowercase name
    Header(String),
}

impl CoveredComponent {
    /// Get the component identifier string
    pub fn identifier(&self) -> String {
        match self {
            CoveredComponent::Method => "@method".to_string(),
            CoveredComponent::Authority => "@authority".to_string(),
            CoveredComponent::Path => "@path".to_string(),
            CoveredComponent::ContentDigest => "content-digest".to_string(),
            CoveredComponent::Header(name) => name.to_lowercase(),
        }
    }

    /// Parse a component identifier as it appears inside the covered list
    pub fn from_identifier(s: &str) -> Result<Self> {
        match s {
            "@method" => Ok(CoveredComponent::Method),
            "@authority" => Ok(CoveredComponent::Authority),
            "@path" => Ok(CoveredComponent::Path),
            "content-digest" => Ok(CoveredComponent::ContentDigest),
            other if other.starts_with('@') => Err(Error::HttpSignature(format!(
                "derived component {other} is outside the TAP profile"
            ))),
            other => Ok(CoveredComponent::Header(other.to_lowercase())),
        }
    }
}

/// The parameters carried in a single `Signature-Input` label
#[derive(Debug, Clone)]
pub struct SignatureParams {
    /// Ordered covered components
    pub covered_components: Vec<CoveredComponent>,
    /// Creation time, unix seconds
    pub created: i64,
    /// Expiry time, unix seconds; always after `created`
    pub expires: i64,
    /// Opaque signer identifier, resolved against the agent registry
    pub keyid: String,
    /// Algorithm wire label; kept verbatim so unknown labels surface as an
    /// algorithm mismatch rather than a parse failure
    pub alg: String,
    /// Single-use randomness, unique per (keyid, nonce)
    pub nonce: String,
    /// Declared interaction intent
    pub tag: String,
}

impl fmt::Display for SignatureParams {
    /// Render the canonical params line: the exact spelling that follows
    /// `sig1=` in the `Signature-Input` header and the value of the
    /// `@signature-params` base line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components = self
            .covered_components
            .iter()
            .map(|c| format!("\"{}\"", c.identifier()))
            .collect::<Vec<_>>()
            .join(" ");

        write!(
            f,
            "({components});created={};expires={};keyid=\"{}\";alg=\"{}\";nonce=\"{}\";tag=\"{}\"",
            self.created, self.expires, self.keyid, self.alg, self.nonce, self.tag
        )
    }
}

impl SignatureParams {
    /// Build from a parsed `Signature-Input` inner list
    pub fn from_inner_list(inner: &sfv::InnerList) -> Result<Self> {
        let mut covered_components = Vec::with_capacity(inner.items.len());
        for item in &inner.items {
            let name = item
                .bare_item
                .as_string()
                .ok_or_else(|| {
                    Error::HttpSignature("covered component is not a string".to_string())
                })?
                .as_str();
            covered_components.push(CoveredComponent::from_identifier(name)?);
        }

        let mut created = None;
        let mut expires = None;
        let mut keyid = None;
        let mut alg = None;
        let mut nonce = None;
        let mut tag = None;

        for (key, value) in &inner.params {
            match key.as_str() {
                "created" => created = value.as_integer().map(i64::from),
                "expires" => expires = value.as_integer().map(i64::from),
                "keyid" => keyid = value.as_string().map(|s| s.as_str().to_string()),
                "alg" => alg = value.as_string().map(|s| s.as_str().to_string()),
                "nonce" => nonce = value.as_string().map(|s| s.as_str().to_string()),
                "tag" => tag = value.as_string().map(|s| s.as_str().to_string()),
                _ => {}
            }
        }

        let missing = |name: &str| Error::HttpSignature(format!("missing {name} parameter"));
        let params = Self {
            covered_components,
            created: created.ok_or_else(|| missing("created"))?,
            expires: expires.ok_or_else(|| missing("expires"))?,
            keyid: keyid.ok_or_else(|| missing("keyid"))?,
            alg: alg.ok_or_else(|| missing("alg"))?,
            nonce: nonce.ok_or_else(|| missing("nonce"))?,
            tag: tag.ok_or_else(|| missing("tag"))?,
        };

        if params.expires <= params.created {
            return Err(Error::HttpSignature(
                "expires must be after created".to_string(),
            ));
        }

        Ok(params)
    }
}
