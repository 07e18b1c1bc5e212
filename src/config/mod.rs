//! Configuration system
//!
//! Loads ~/.config/crosspost/config.yaml with support for:
//! - Collaborator endpoints (identity, assistant, publish)
//! - Handshake origin and poll interval
//! - Plan-tier quota limits
//! - Per-platform default tones and publish-response conventions
//! - Local storage location

mod crosspost_config;
pub mod validation;

pub use crosspost_config::{
    AssistantConfig, ComposerConfig, CrosspostConfig, HandshakeConfig, IdentityConfig,
    PlatformPublishConfig, PublishConfig, QuotaConfig, StorageConfig, TierLimits,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
