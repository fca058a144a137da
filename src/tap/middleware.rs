//! Verification boundary for hosts
//!
//! Merchants front every route with [`TapMiddleware::inspect`]: unsigned
//! requests pass through as anonymous traffic, signed requests are
//! verified and either annotated with [`TapStatus::Verified`] or rejected
//! with a 401. Individual routes then apply a [`RoutePolicy`] to the
//! attached status. The types here are framework-neutral; binding them to
//! a concrete server is a few lines of adapter code.

use crate::tap::verifier::{TapVerifier, VerificationResult};
use crate::tap::InteractionType;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

/// Authentication status attached to a request after the boundary filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapStatus {
    /// No signature headers were present: a regular user request
    Unsigned,
    /// A trusted agent signed this request
    Verified {
        /// Registered display name of the agent
        agent_id: String,
        /// Intent declared in the signature's `tag`
        interaction_type: InteractionType,
        /// Keyid the signature was made under
        keyid: String,
    },
}

impl TapStatus {
    /// Whether the request carried a valid agent signature
    pub fn is_verified(&self) -> bool {
        matches!(self, TapStatus::Verified { .. })
    }

    /// The declared interaction type, for verified requests
    pub fn interaction_type(&self) -> Option<InteractionType> {
        match self {
            TapStatus::Unsigned => None,
            TapStatus::Verified {
                interaction_type, ..
            } => Some(*interaction_type),
        }
    }
}

/// An HTTP rejection produced by the boundary or a route policy
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Response status: 401 for verification failures, 403 for policy
    pub status: StatusCode,
    /// Value of the `detail` field in the response body
    pub detail: String,
}

impl Rejection {
    /// The JSON response body: `{"detail": "<detail>"}`
    pub fn body(&self) -> String {
        serde_json::json!({ "detail": self.detail }).to_string()
    }
}

/// Boundary filter wrapping a [`TapVerifier`]
#[derive(Debug, Clone)]
pub struct TapMiddleware {
    verifier: Arc<TapVerifier>,
}

impl TapMiddleware {
    /// Wrap a verifier
    pub fn new(verifier: Arc<TapVerifier>) -> Self {
        Self { verifier }
    }

    /// Access the wrapped verifier (e.g. for registration at startup)
    pub fn verifier(&self) -> &TapVerifier {
        &self.verifier
    }

    /// Classify an incoming request.
    ///
    /// Requests without any signature header pass through as
    /// [`TapStatus::Unsigned`]. Requests with signature headers are
    /// verified; failures reject with 401 and a `{"detail":
    /// "<error_kind>"}` body.
    pub fn inspect(
        &self,
        method: &str,
        url: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<TapStatus, Rejection> {
        let has_signature_headers =
            headers.contains_key("signature") || headers.contains_key("signature-input");
        if !has_signature_headers {
            return Ok(TapStatus::Unsigned);
        }

        match self.verifier.verify(method, url, headers, body) {
            VerificationResult::Valid {
                agent_id,
                interaction_type,
                keyid,
                ..
            } => {
                tracing::info!(agent = %agent_id, interaction = %interaction_type, "agent request verified");
                Ok(TapStatus::Verified {
                    agent_id,
                    interaction_type,
                    keyid,
                })
            }
            VerificationResult::Invalid { kind, message, .. } => {
                tracing::warn!(kind = %kind, "rejecting agent request: {message}");
                Err(Rejection {
                    status: StatusCode::UNAUTHORIZED,
                    detail: kind.to_string(),
                })
            }
        }
    }
}

/// Per-route requirements applied to the attached [`TapStatus`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutePolicy {
    /// Reject requests without a valid agent signature
    pub require_signed: bool,
    /// Reject requests whose declared intent differs
    pub require_interaction_type: Option<InteractionType>,
}

impl RoutePolicy {
    /// Policy requiring any valid agent signature
    pub fn signed_only() -> Self {
        Self {
            require_signed: true,
            require_interaction_type: None,
        }
    }

    /// Policy requiring a signed checkout interaction
    pub fn checkout_only() -> Self {
        Self {
            require_signed: true,
            require_interaction_type: Some(InteractionType::Checkout),
        }
    }

    /// Apply the policy; violations map to HTTP 403
    pub fn check(&self, status: &TapStatus) -> Result<(), Rejection> {
        if self.require_signed && !status.is_verified() {
            return Err(Rejection {
                status: StatusCode::FORBIDDEN,
                detail: "this endpoint requires an agent signature".to_string(),
            });
        }

        if let Some(required) = self.require_interaction_type {
            if status.interaction_type() != Some(required) {
                return Err(Rejection {
                    status: StatusCode::FORBIDDEN,
                    detail: format!("this endpoint requires the {required} interaction type"),
                });
            }
        }

        Ok(())
    }
}
