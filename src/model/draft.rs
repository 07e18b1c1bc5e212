//! Draft snapshots and the shared image attachment

use crate::platform::{DraftId, PlatformId, ToneId};
use crate::Result;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Single image shared by every platform in a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Base64-encoded image bytes
    pub base64: String,
    pub mime_type: String,
}

impl Attachment {
    /// Build an attachment from raw bytes
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            base64: BASE64_STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// Decode the raw image bytes
    pub fn bytes(&self) -> Result<Vec<u8>> {
        BASE64_STANDARD
            .decode(&self.base64)
            .map_err(|e| crate::CrosspostError::Parse(format!("Invalid attachment data: {}", e)))
    }

    /// `data:` URL form, as accepted by the assistant and publish endpoints
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Frozen copy of the four draft fields
///
/// Used both to persist a draft and as the single input of
/// [`DraftOrchestrator::load_from`](crate::draft::DraftOrchestrator::load_from).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    #[serde(default)]
    pub platform_content: BTreeMap<PlatformId, String>,
    #[serde(default)]
    pub platform_tone: BTreeMap<PlatformId, ToneId>,
    #[serde(default)]
    pub selected_platforms: Vec<PlatformId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl DraftSnapshot {
    /// Seed a snapshot with the same text for several platforms
    pub fn seeded(platforms: &[PlatformId], text: &str) -> Self {
        Self {
            platform_content: platforms
                .iter()
                .map(|p| (p.clone(), text.to_string()))
                .collect(),
            selected_platforms: platforms.to_vec(),
            ..Default::default()
        }
    }

    /// True if any platform has non-blank content
    pub fn has_any_content(&self) -> bool {
        self.platform_content.values().any(|c| !c.trim().is_empty())
    }

    /// Selected platforms with non-blank content, in selection order
    pub fn publishable(&self) -> Vec<(PlatformId, String)> {
        self.selected_platforms
            .iter()
            .filter_map(|p| {
                self.platform_content
                    .get(p)
                    .filter(|c| !c.trim().is_empty())
                    .map(|c| (p.clone(), c.clone()))
            })
            .collect()
    }
}

/// A standalone saved draft record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDraft {
    pub id: DraftId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub snapshot: DraftSnapshot,
    pub saved_at: DateTime<Utc>,
}

impl SavedDraft {
    /// Wrap a snapshot in a new saved-draft record
    ///
    /// The title is the first line of the first non-blank content, trimmed to 60 characters.
    pub fn new(snapshot: DraftSnapshot) -> Self {
        let title = snapshot
            .platform_content
            .values()
            .find(|c| !c.trim().is_empty())
            .and_then(|c| c.lines().find(|l| !l.trim().is_empty()))
            .map(|l| l.trim().chars().take(60).collect::<String>());

        Self {
            id: DraftId::generate(),
            title,
            snapshot,
            saved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_roundtrip_bytes() {
        let att = Attachment::from_bytes(b"\x89PNG", "image/png");
        assert_eq!(att.bytes().unwrap(), b"\x89PNG");
        assert!(att.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_attachment_invalid_base64() {
        let att = Attachment {
            base64: "not base64!!".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert!(att.bytes().is_err());
    }

    #[test]
    fn test_has_any_content_ignores_whitespace() {
        let mut snap = DraftSnapshot::default();
        snap.platform_content
            .insert(PlatformId::new("linkedin"), "   \n".to_string());
        assert!(!snap.has_any_content());

        snap.platform_content
            .insert(PlatformId::new("twitter"), "hi".to_string());
        assert!(snap.has_any_content());
    }

    #[test]
    fn test_saved_draft_title() {
        let snap = DraftSnapshot::seeded(&[PlatformId::new("linkedin")], "\nLaunch day!\nMore text");
        let saved = SavedDraft::new(snap);
        assert_eq!(saved.title.as_deref(), Some("Launch day!"));
    }

    #[test]
    fn test_saved_draft_serializes_flat() {
        let saved = SavedDraft::new(DraftSnapshot::seeded(&[PlatformId::new("twitter")], "x"));
        let value = serde_json::to_value(&saved).unwrap();
        assert_eq!(value["platformContent"]["twitter"], "x");
        assert_eq!(value["selectedPlatforms"][0], "twitter");
    }
}
