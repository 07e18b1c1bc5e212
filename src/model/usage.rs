//! Usage counters gating plan-tier quotas

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named usage-limit profile (e.g. basic, pro, enterprise)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanTier(String);

impl PlanTier {
    pub fn new(tier: impl Into<String>) -> Self {
        Self(tier.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlanTier {
    fn default() -> Self {
        Self::new("basic")
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which counter to increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageCounter {
    MonthlyPosts,
    ScheduledPosts,
}

impl UsageCounter {
    pub fn column(&self) -> &'static str {
        match self {
            UsageCounter::MonthlyPosts => "monthly_post_count",
            UsageCounter::ScheduledPosts => "scheduled_posts_count",
        }
    }
}

/// Per-user usage counters
///
/// Only ever incremented by this engine; monthly resets happen elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub monthly_post_count: u32,
    pub scheduled_posts_count: u32,
}

impl UsageCounters {
    pub fn get(&self, counter: UsageCounter) -> u32 {
        match counter {
            UsageCounter::MonthlyPosts => self.monthly_post_count,
            UsageCounter::ScheduledPosts => self.scheduled_posts_count,
        }
    }

    pub fn increment(&mut self, counter: UsageCounter) {
        match counter {
            UsageCounter::MonthlyPosts => {
                self.monthly_post_count = self.monthly_post_count.saturating_add(1)
            }
            UsageCounter::ScheduledPosts => {
                self.scheduled_posts_count = self.scheduled_posts_count.saturating_add(1)
            }
        }
    }
}
