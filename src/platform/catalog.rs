//! Known publishing platforms and their per-platform defaults

use super::ids::{PlatformId, ToneId};
use std::collections::HashMap;

/// Tone used for platforms the catalog does not know about
pub const FALLBACK_TONE: &str = "neutral";

/// Static description of a publishing platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub id: PlatformId,
    pub display_name: String,
    pub default_tone: ToneId,
    /// JSON pointer paths tried, in order, to find the remote post id in a publish response
    pub remote_id_paths: Vec<String>,
    /// Whether the platform accepts delete-by-id
    pub supports_delete: bool,
}

impl PlatformInfo {
    fn builtin(id: &str, name: &str, tone: &str, paths: &[&str], supports_delete: bool) -> Self {
        Self {
            id: PlatformId::new(id),
            display_name: name.to_string(),
            default_tone: ToneId::new(tone),
            remote_id_paths: paths.iter().map(|p| p.to_string()).collect(),
            supports_delete,
        }
    }
}

/// Lookup table of platform defaults
///
/// Unknown platform ids are accepted everywhere; they get a title-cased display
/// name and the fallback tone.
#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    platforms: HashMap<PlatformId, PlatformInfo>,
}

impl Default for PlatformCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlatformCatalog {
    /// Catalog with the built-in platforms
    pub fn builtin() -> Self {
        let list = [
            PlatformInfo::builtin("linkedin", "LinkedIn", "professional", &["/id", "/urn", "/postUrn"], true),
            PlatformInfo::builtin("twitter", "X (Twitter)", "casual", &["/data/id", "/id", "/tweetId"], true),
            PlatformInfo::builtin("facebook", "Facebook", "friendly", &["/id", "/post_id"], true),
            PlatformInfo::builtin("instagram", "Instagram", "friendly", &["/id", "/media_id"], false),
            PlatformInfo::builtin("threads", "Threads", "casual", &["/id"], false),
            PlatformInfo::builtin("bluesky", "Bluesky", "casual", &["/uri", "/cid"], true),
            PlatformInfo::builtin("mastodon", "Mastodon", "casual", &["/id", "/url"], true),
        ];

        Self {
            platforms: list.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Override the default tone for a platform
    pub fn set_default_tone(&mut self, platform: &PlatformId, tone: ToneId) {
        let mut info = self.info(platform);
        info.default_tone = tone;
        self.platforms.insert(platform.clone(), info);
    }

    /// Register or replace a platform
    pub fn insert(&mut self, info: PlatformInfo) {
        self.platforms.insert(info.id.clone(), info);
    }

    /// Info for a platform, synthesised when unknown
    pub fn info(&self, platform: &PlatformId) -> PlatformInfo {
        self.platforms
            .get(platform)
            .cloned()
            .unwrap_or_else(|| PlatformInfo {
                id: platform.clone(),
                display_name: title_case(platform.as_str()),
                default_tone: ToneId::new(FALLBACK_TONE),
                remote_id_paths: vec!["/id".to_string()],
                supports_delete: false,
            })
    }

    pub fn default_tone(&self, platform: &PlatformId) -> ToneId {
        self.platforms
            .get(platform)
            .map(|p| p.default_tone.clone())
            .unwrap_or_else(|| ToneId::new(FALLBACK_TONE))
    }

    pub fn display_name(&self, platform: &PlatformId) -> String {
        self.platforms
            .get(platform)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| title_case(platform.as_str()))
    }

    /// Comma-separated display names, in the given order
    pub fn display_names(&self, platforms: &[PlatformId]) -> String {
        platforms
            .iter()
            .map(|p| self.display_name(p))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// All known platform ids, sorted
    pub fn ids(&self) -> Vec<PlatformId> {
        let mut ids: Vec<_> = self.platforms.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let catalog = PlatformCatalog::builtin();
        assert_eq!(
            catalog.default_tone(&PlatformId::new("linkedin")),
            ToneId::new("professional")
        );
        assert_eq!(catalog.display_name(&PlatformId::new("twitter")), "X (Twitter)");
        assert!(!catalog.info(&PlatformId::new("instagram")).supports_delete);
    }

    #[test]
    fn test_unknown_platform_fallbacks() {
        let catalog = PlatformCatalog::builtin();
        let pinterest = PlatformId::new("pinterest");
        assert_eq!(catalog.display_name(&pinterest), "Pinterest");
        assert_eq!(catalog.default_tone(&pinterest), ToneId::new(FALLBACK_TONE));
    }

    #[test]
    fn test_tone_override() {
        let mut catalog = PlatformCatalog::builtin();
        let twitter = PlatformId::new("twitter");
        catalog.set_default_tone(&twitter, ToneId::new("witty"));
        assert_eq!(catalog.default_tone(&twitter), ToneId::new("witty"));
        // Other fields survive the override
        assert_eq!(catalog.display_name(&twitter), "X (Twitter)");
    }

    #[test]
    fn test_display_names_join() {
        let catalog = PlatformCatalog::builtin();
        let names = catalog.display_names(&[PlatformId::new("linkedin"), PlatformId::new("facebook")]);
        assert_eq!(names, "LinkedIn, Facebook");
    }
}
