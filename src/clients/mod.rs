//! Collaborator clients
//!
//! Async traits at the seams to the external services the engine depends on,
//! plus `reqwest`-based HTTP implementations:
//! - **identity**: authorization URLs and revoke for the auth handshake
//! - **publish**: one adapter per platform, with typed remote-id extraction
//! - **assistant**: chat turns and image generation through the proxy endpoint
//! - **retry**: backoff helper for idempotent calls

pub mod assistant;
pub mod identity;
pub mod publish;
pub mod retry;

pub use assistant::{AssistantService, HttpAssistantClient};
pub use identity::{HttpIdentityClient, IdentityProvider};
pub use publish::{
    extract_remote_id, HttpPublishAdapter, PublishAdapter, PublishReceipt, PublishRequest,
    PublisherRegistry,
};

use crate::platform::{CorrelationId, UserId};
use crate::CrosspostError;
use serde::Deserialize;

/// Header carrying the per-request correlation id
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";
/// Header carrying the calling user's id
pub const USER_HEADER: &str = "X-User-ID";

/// Tracing context attached to every outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: UserId,
    pub correlation_id: CorrelationId,
}

impl RequestContext {
    /// New context with a fresh correlation id
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            correlation_id: CorrelationId::new(),
        }
    }
}

/// Attach the tracing headers to a request
pub(crate) fn traced(
    builder: reqwest::RequestBuilder,
    ctx: &RequestContext,
) -> reqwest::RequestBuilder {
    builder
        .header(CORRELATION_HEADER, ctx.correlation_id.to_string())
        .header(USER_HEADER, ctx.user_id.as_str())
}

/// Error response from collaborator APIs
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "message")]
    error: String,
}

/// Turn a non-success response into a typed error
pub(crate) async fn error_from_response(response: reqwest::Response, what: &str) -> CrosspostError {
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(crate::error::parse_retry_after)
            .unwrap_or(60);
        return CrosspostError::RateLimited(retry_after);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body
            }
        });

    match status.as_u16() {
        401 | 403 => CrosspostError::Auth(format!("{} ({}): {}", what, status, detail)),
        _ => CrosspostError::Network(format!("{} ({}): {}", what, status, detail)),
    }
}

/// Strip a trailing slash so paths can be appended with `format!`
pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
