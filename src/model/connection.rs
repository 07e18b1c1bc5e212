//! Per-platform connection record

use crate::platform::PlatformId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection status of one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub platform_id: PlatformId,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

impl Connection {
    pub fn connected(platform_id: PlatformId) -> Self {
        Self {
            platform_id,
            connected: true,
            connected_at: Some(Utc::now()),
        }
    }

    pub fn disconnected(platform_id: PlatformId) -> Self {
        Self {
            platform_id,
            connected: false,
            connected_at: None,
        }
    }
}
