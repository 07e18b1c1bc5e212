//! Crosspost configuration file handling
//!
//! Loads and manages the ~/.config/crosspost/config.yaml file.

use crate::model::PlanTier;
use crate::platform::{PlatformCatalog, PlatformId, ToneId};
use crate::Result;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identity/auth collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity service
    #[serde(default = "default_api_base")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// AI assistant collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_api_base")]
    pub base_url: String,

    /// Chat turns can take a while when the assistant executes actions
    #[serde(default = "default_assistant_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum seconds between two image-generation requests
    #[serde(default = "default_image_cooldown_secs")]
    pub image_cooldown_secs: u64,
}

fn default_assistant_timeout_secs() -> u64 {
    60
}

fn default_image_cooldown_secs() -> u64 {
    10
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            timeout_secs: default_assistant_timeout_secs(),
            image_cooldown_secs: default_image_cooldown_secs(),
        }
    }
}

/// Per-platform publish overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformPublishConfig {
    /// Path of the publish endpoint, relative to `publish.base_url`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// JSON pointer paths tried, in order, to find the remote post id
    #[serde(default)]
    pub remote_id_paths: Vec<String>,

    /// Whether delete-by-id is supported
    #[serde(default)]
    pub supports_delete: Option<bool>,
}

/// Publish collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_api_base")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides keyed by platform id
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformPublishConfig>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            timeout_secs: default_timeout_secs(),
            platforms: BTreeMap::new(),
        }
    }
}

impl PublishConfig {
    /// Endpoint path for a platform (`/api/{platform}/post` unless overridden)
    pub fn endpoint_for(&self, platform: &PlatformId) -> String {
        self.platforms
            .get(platform.as_str())
            .and_then(|p| p.endpoint.clone())
            .unwrap_or_else(|| format!("/api/{}/post", platform))
    }
}

/// External-auth handshake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Origin that completion messages must come from
    #[serde(default = "default_api_base")]
    pub origin: String,

    /// How often to check whether the auth window was closed
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Port for the loopback callback listener
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_callback_port() -> u16 {
    8736
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            origin: default_api_base(),
            poll_interval_ms: default_poll_interval_ms(),
            callback_port: default_callback_port(),
        }
    }
}

impl HandshakeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Limits for one plan tier; `None` means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    #[serde(default)]
    pub monthly_posts: Option<u32>,
    #[serde(default)]
    pub scheduled_posts: Option<u32>,
}

/// Plan-tier quota table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierLimits>,
}

fn default_tiers() -> BTreeMap<String, TierLimits> {
    let mut tiers = BTreeMap::new();
    tiers.insert(
        "basic".to_string(),
        TierLimits {
            monthly_posts: Some(10),
            scheduled_posts: Some(5),
        },
    );
    tiers.insert(
        "pro".to_string(),
        TierLimits {
            monthly_posts: Some(100),
            scheduled_posts: Some(50),
        },
    );
    tiers.insert("enterprise".to_string(), TierLimits::default());
    tiers
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

impl QuotaConfig {
    /// Limits for a tier; unknown tiers fall back to "basic", then to unlimited
    pub fn limits_for(&self, tier: &PlanTier) -> TierLimits {
        self.tiers
            .get(tier.as_str())
            .or_else(|| self.tiers.get("basic"))
            .copied()
            .unwrap_or_default()
    }
}

/// Composer behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Route of the composer view; navigation to it is never intercepted
    #[serde(default = "default_composer_route")]
    pub route: String,

    /// Offset applied to `schedule(date, time)` inputs, in minutes east of UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl ComposerConfig {
    /// Fixed offset for schedule inputs; out-of-range values fall back to UTC
    pub fn time_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

fn default_composer_route() -> String {
    "/compose".to_string()
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            route: default_composer_route(),
            utc_offset_minutes: 0,
        }
    }
}

/// Local document store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("crosspost");
        path.push("crosspost.db");
        Self { path }
    }
}

/// Crosspost configuration
///
/// Represents the complete ~/.config/crosspost/config.yaml file. Every section
/// is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrosspostConfig {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub handshake: HandshakeConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    /// Default tone overrides keyed by platform id
    #[serde(default)]
    pub tones: BTreeMap<String, String>,

    #[serde(default)]
    pub composer: ComposerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl CrosspostConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (~/.config/crosspost/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::CrosspostError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading Crosspost configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            tiers = config.quota.tiers.len(),
            poll_interval_ms = config.handshake.poll_interval_ms,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving Crosspost configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/crosspost/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("crosspost");
        path.push("config.yaml");
        path
    }

    /// Platform catalog with this configuration's tone and publish overrides applied
    pub fn catalog(&self) -> PlatformCatalog {
        let mut catalog = PlatformCatalog::builtin();

        for (platform, tone) in &self.tones {
            catalog.set_default_tone(&PlatformId::normalized(platform), ToneId::new(tone.clone()));
        }

        for (platform, overrides) in &self.publish.platforms {
            let id = PlatformId::normalized(platform);
            let mut info = catalog.info(&id);
            if !overrides.remote_id_paths.is_empty() {
                info.remote_id_paths = overrides.remote_id_paths.clone();
            }
            if let Some(supports_delete) = overrides.supports_delete {
                info.supports_delete = supports_delete;
            }
            catalog.insert(info);
        }

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_defaults() {
        let config = CrosspostConfig::new();
        assert_eq!(config.handshake.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.composer.route, "/compose");
        assert_eq!(
            config.quota.limits_for(&PlanTier::new("basic")).monthly_posts,
            Some(10)
        );
        assert_eq!(
            config.quota.limits_for(&PlanTier::new("enterprise")),
            TierLimits::default()
        );
    }

    #[test]
    fn test_unknown_tier_falls_back_to_basic() {
        let config = CrosspostConfig::new();
        assert_eq!(
            config.quota.limits_for(&PlanTier::new("startup")),
            config.quota.limits_for(&PlanTier::new("basic"))
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
handshake:
  origin: https://app.example.com
quota:
  tiers:
    basic:
      monthly_posts: 3
tones:
  LinkedIn: formal
"#;
        let config: CrosspostConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.handshake.origin, "https://app.example.com");
        assert_eq!(config.handshake.poll_interval_ms, 500);
        assert_eq!(config.quota.tiers.len(), 1);
        assert_eq!(
            config.quota.limits_for(&PlanTier::new("basic")).scheduled_posts,
            None
        );

        let catalog = config.catalog();
        assert_eq!(
            catalog.default_tone(&PlatformId::new("linkedin")),
            ToneId::new("formal")
        );
    }

    #[test]
    fn test_publish_overrides_apply_to_catalog() {
        let mut config = CrosspostConfig::new();
        config.publish.platforms.insert(
            "twitter".to_string(),
            PlatformPublishConfig {
                endpoint: Some("/v2/tweets".to_string()),
                remote_id_paths: vec!["/result/id".to_string()],
                supports_delete: Some(false),
            },
        );

        let twitter = PlatformId::new("twitter");
        let info = config.catalog().info(&twitter);
        assert_eq!(info.remote_id_paths, vec!["/result/id".to_string()]);
        assert!(!info.supports_delete);
        assert_eq!(config.publish.endpoint_for(&twitter), "/v2/tweets");
        assert_eq!(
            config.publish.endpoint_for(&PlatformId::new("facebook")),
            "/api/facebook/post"
        );
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = CrosspostConfig::new();
        config.composer.utc_offset_minutes = 120;
        config.save(path).unwrap();

        let loaded = CrosspostConfig::load(path).unwrap();
        assert_eq!(loaded.composer.utc_offset_minutes, 120);
    }

    #[test]
    fn test_load_missing_file() {
        let err = CrosspostConfig::load("/nonexistent/crosspost.yaml").unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
