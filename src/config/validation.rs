//! Configuration validation
//!
//! Validates Crosspost configuration for correctness:
//! - Service URLs and the handshake origin are http(s)
//! - Poll interval and timeouts are non-zero
//! - At least one quota tier exists
//! - Tone overrides and the composer route are well-formed

use super::crosspost_config::CrosspostConfig;
use crate::CrosspostError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub section: String,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(section: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            section: section.to_string(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.section, self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

fn is_http_url(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://"))
        && url.split("://").nth(1).is_some_and(|rest| !rest.is_empty())
}

/// Validate a Crosspost configuration, collecting every problem found
pub fn validate_config(config: &CrosspostConfig) -> ValidationResult {
    let mut errors = Vec::new();

    for (section, url) in [
        ("identity", &config.identity.base_url),
        ("assistant", &config.assistant.base_url),
        ("publish", &config.publish.base_url),
    ] {
        if !is_http_url(url) {
            errors.push(ValidationError::new(
                section,
                "base_url",
                format!("Not an http(s) URL: {}", url),
            ));
        }
    }

    for (section, timeout) in [
        ("identity", config.identity.timeout_secs),
        ("assistant", config.assistant.timeout_secs),
        ("publish", config.publish.timeout_secs),
    ] {
        if timeout == 0 {
            errors.push(ValidationError::new(
                section,
                "timeout_secs",
                "Timeout must be greater than zero",
            ));
        }
    }

    if !is_http_url(&config.handshake.origin) {
        errors.push(ValidationError::new(
            "handshake",
            "origin",
            format!("Not an http(s) origin: {}", config.handshake.origin),
        ));
    } else if config.handshake.origin.ends_with('/') {
        errors.push(ValidationError::new(
            "handshake",
            "origin",
            "Origin must not have a trailing slash",
        ));
    }

    if config.handshake.poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "handshake",
            "poll_interval_ms",
            "Poll interval must be greater than zero",
        ));
    }

    if config.quota.tiers.is_empty() {
        errors.push(ValidationError::new(
            "quota",
            "tiers",
            "At least one plan tier must be defined",
        ));
    }

    for (platform, tone) in &config.tones {
        if tone.trim().is_empty() {
            errors.push(ValidationError::new(
                "tones",
                platform.clone(),
                "Tone must not be empty",
            ));
        }
    }

    for (platform, overrides) in &config.publish.platforms {
        for path in &overrides.remote_id_paths {
            if !path.starts_with('/') {
                errors.push(ValidationError::new(
                    "publish",
                    format!("platforms.{}.remote_id_paths", platform),
                    format!("JSON pointer must start with '/': {}", path),
                ));
            }
        }
    }

    if !config.composer.route.starts_with('/') {
        errors.push(ValidationError::new(
            "composer",
            "route",
            "Route must start with '/'",
        ));
    }

    if config.composer.utc_offset_minutes.abs() > 14 * 60 {
        errors.push(ValidationError::new(
            "composer",
            "utc_offset_minutes",
            "Offset must be within +/-14 hours",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and fold all errors into one [`CrosspostError::Config`]
pub fn validate_config_result(config: &CrosspostConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        CrosspostError::Config(messages.join("; "))
    })
}
