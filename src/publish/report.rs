//! Outcome of a fan-out publish

use crate::platform::{PlatformId, PostId};
use std::collections::BTreeMap;

/// One platform that rejected the post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformFailure {
    pub platform: PlatformId,
    pub message: String,
}

/// Per-platform results of `post_now`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Platforms that accepted the post, in dispatch order
    pub succeeded: Vec<PlatformId>,
    pub failed: Vec<PlatformFailure>,
    /// Selected platforms with blank content; never dispatched
    pub skipped: Vec<PlatformId>,
    /// Remote ids, where the platform exposed one
    pub post_ids: BTreeMap<PlatformId, String>,
    /// Id of the persisted record, if the best-effort write went through
    pub record_id: Option<PostId>,
}

impl PublishReport {
    /// At least one platform accepted the post
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }

    /// Some platforms accepted and some failed
    pub fn is_partial(&self) -> bool {
        self.is_success() && !self.failed.is_empty()
    }

    pub fn failed_platforms(&self) -> Vec<PlatformId> {
        self.failed.iter().map(|f| f.platform.clone()).collect()
    }
}
