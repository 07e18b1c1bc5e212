//! Error types for Crosspost
//!
//! Defines a comprehensive error enum covering all failure modes across the engine.
//! Uses thiserror for ergonomic error handling.

use crate::platform::PlatformId;
use thiserror::Error;

/// Result type alias for Crosspost operations
pub type Result<T> = std::result::Result<T, CrosspostError>;

/// Which plan-tier limit blocked an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    /// Posts published this month
    MonthlyPosts,
    /// Pending scheduled posts
    ScheduledPosts,
}

impl QuotaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::MonthlyPosts => "monthly_posts",
            QuotaKind::ScheduledPosts => "scheduled_posts",
        }
    }
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaKind::MonthlyPosts => write!(f, "monthly post"),
            QuotaKind::ScheduledPosts => write!(f, "scheduled post"),
        }
    }
}

/// Comprehensive error type for Crosspost operations
#[derive(Error, Debug)]
pub enum CrosspostError {
    /// Local precondition failures (no platform selected, empty content, past time)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Plan-tier limit reached
    #[error("Your {tier} plan allows {limit} {kind}s; limit reached")]
    QuotaExceeded {
        kind: QuotaKind,
        tier: String,
        limit: u32,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage/database errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network/HTTP errors
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing errors (JSON, YAML, dates)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// AI assistant errors
    #[error("Assistant error: {0}")]
    Assistant(String),

    /// Per-platform publish errors
    #[error("Publish to {platform} failed: {message}")]
    Publish {
        platform: PlatformId,
        message: String,
    },

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request throttled locally
    #[error("Please wait {0} seconds before trying again")]
    Cooldown(u64),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    /// Rate limited (with retry-after duration in seconds)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl CrosspostError {
    /// True for errors raised before any network call was attempted
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            CrosspostError::Validation(_)
                | CrosspostError::QuotaExceeded { .. }
                | CrosspostError::Cooldown(_)
        )
    }
}

impl crate::clients::retry::RetryableError for CrosspostError {
    fn retry_decision(&self) -> crate::clients::retry::RetryDecision {
        use crate::clients::retry::RetryDecision;
        use std::time::Duration;

        match self {
            CrosspostError::Network(_) => RetryDecision::Retry,
            CrosspostError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
                        500..=599 => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    }
                } else {
                    RetryDecision::Retry
                }
            }
            CrosspostError::RateLimited(secs) => {
                RetryDecision::RetryAfter(Duration::from_secs(*secs))
            }
            CrosspostError::Anyhow(e) => {
                let msg = e.to_string().to_lowercase();
                if msg.contains("timeout") || msg.contains("connection") {
                    RetryDecision::Retry
                } else {
                    RetryDecision::NoRetry
                }
            }
            CrosspostError::Validation(_)
            | CrosspostError::QuotaExceeded { .. }
            | CrosspostError::Config(_)
            | CrosspostError::Storage(_)
            | CrosspostError::Parse(_)
            | CrosspostError::Auth(_)
            | CrosspostError::Assistant(_)
            | CrosspostError::Publish { .. }
            | CrosspostError::NotFound(_)
            | CrosspostError::Cooldown(_)
            | CrosspostError::Io(_)
            | CrosspostError::Json(_)
            | CrosspostError::Yaml(_)
            | CrosspostError::Database(_)
            | CrosspostError::Other(_) => RetryDecision::NoRetry,
        }
    }
}

/// Extract a retry-after value in seconds from a `Retry-After` header value
pub(crate) fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}
