//! Persisted scheduled/posted records

use super::draft::{Attachment, DraftSnapshot};
use crate::platform::{PlatformId, PostId, ToneId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a persisted post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Waiting for the external scheduler
    Pending,
    /// Published to at least one platform
    Posted,
    /// The external scheduler gave up
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "posted" => Some(PostStatus::Posted),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }
}

/// A draft frozen for delayed or completed publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPost {
    pub id: PostId,
    pub user_id: UserId,
    pub platforms: Vec<PlatformId>,
    #[serde(default)]
    pub platform_content: BTreeMap<PlatformId, String>,
    #[serde(default)]
    pub platform_tone: BTreeMap<PlatformId, ToneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Attachment>,
    pub scheduled_time: DateTime<Utc>,
    pub status: PostStatus,
    /// Remote ids, present only where the platform response exposed one
    #[serde(default)]
    pub platform_post_ids: BTreeMap<PlatformId, String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledPost {
    /// Freeze the given platforms of a draft snapshot into a record
    pub fn from_snapshot(
        user_id: UserId,
        snapshot: &DraftSnapshot,
        platforms: &[PlatformId],
        scheduled_time: DateTime<Utc>,
        status: PostStatus,
    ) -> Self {
        let platform_content = platforms
            .iter()
            .filter_map(|p| {
                snapshot
                    .platform_content
                    .get(p)
                    .map(|c| (p.clone(), c.clone()))
            })
            .collect();
        let platform_tone = platforms
            .iter()
            .filter_map(|p| snapshot.platform_tone.get(p).map(|t| (p.clone(), t.clone())))
            .collect();

        Self {
            id: PostId::generate(),
            user_id,
            platforms: platforms.to_vec(),
            platform_content,
            platform_tone,
            image: snapshot.attachment.clone(),
            scheduled_time,
            status,
            platform_post_ids: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Remove one platform's sub-fields
    ///
    /// Returns true when no platforms remain and the whole record should go.
    pub fn remove_platform(&mut self, platform: &PlatformId) -> bool {
        self.platforms.retain(|p| p != platform);
        self.platform_content.remove(platform);
        self.platform_tone.remove(platform);
        self.platform_post_ids.remove(platform);
        self.platforms.is_empty()
    }

    /// Snapshot suitable for reloading into the composer
    pub fn to_snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            platform_content: self.platform_content.clone(),
            platform_tone: self.platform_tone.clone(),
            selected_platforms: self.platforms.clone(),
            attachment: self.image.clone(),
        }
    }
}
