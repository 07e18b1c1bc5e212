//! Plan-tier quota checks against a local usage ledger

use crate::config::TierLimits;
use crate::error::QuotaKind;
use crate::metrics;
use crate::model::{PlanTier, UsageCounter, UsageCounters};
use crate::{CrosspostError, Result};
use std::sync::{Arc, PoisonError, RwLock};

/// Cached usage counters for the session's user and tier
///
/// Checked before any network call; refreshed from the document store and
/// bumped locally after each successful commit.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    counters: Arc<RwLock<UsageCounters>>,
}

impl UsageLedger {
    pub fn new(counters: UsageCounters) -> Self {
        Self {
            counters: Arc::new(RwLock::new(counters)),
        }
    }

    pub fn get(&self) -> UsageCounters {
        *self.counters.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, counters: UsageCounters) {
        *self.counters.write().unwrap_or_else(PoisonError::into_inner) = counters;
    }

    pub fn increment(&self, counter: UsageCounter) -> UsageCounters {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters.increment(counter);
        *counters
    }
}

/// Limits of one tier, checked against a ledger
#[derive(Debug, Clone)]
pub struct QuotaGate {
    tier: PlanTier,
    limits: TierLimits,
}

impl QuotaGate {
    pub fn new(tier: PlanTier, limits: TierLimits) -> Self {
        Self { tier, limits }
    }

    pub fn tier(&self) -> &PlanTier {
        &self.tier
    }

    pub fn limits(&self) -> TierLimits {
        self.limits
    }

    /// Fail with `QuotaExceeded` when the counter already reached its limit
    pub fn check(&self, counters: &UsageCounters, kind: QuotaKind) -> Result<()> {
        let (limit, used) = match kind {
            QuotaKind::MonthlyPosts => (self.limits.monthly_posts, counters.monthly_post_count),
            QuotaKind::ScheduledPosts => {
                (self.limits.scheduled_posts, counters.scheduled_posts_count)
            }
        };

        match limit {
            Some(limit) if used >= limit => {
                tracing::info!(
                    kind = kind.as_str(),
                    tier = %self.tier,
                    used,
                    limit,
                    "Quota exhausted"
                );
                metrics::record_quota_rejection(kind.as_str(), self.tier.as_str());
                Err(CrosspostError::QuotaExceeded {
                    kind,
                    tier: self.tier.to_string(),
                    limit,
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(monthly: Option<u32>, scheduled: Option<u32>) -> QuotaGate {
        QuotaGate::new(
            PlanTier::new("basic"),
            TierLimits {
                monthly_posts: monthly,
                scheduled_posts: scheduled,
            },
        )
    }

    #[test]
    fn test_limit_blocks_at_count() {
        let gate = gate(Some(2), None);
        let ledger = UsageLedger::default();

        assert!(gate.check(&ledger.get(), QuotaKind::MonthlyPosts).is_ok());
        ledger.increment(UsageCounter::MonthlyPosts);
        assert!(gate.check(&ledger.get(), QuotaKind::MonthlyPosts).is_ok());
        ledger.increment(UsageCounter::MonthlyPosts);

        match gate.check(&ledger.get(), QuotaKind::MonthlyPosts) {
            Err(CrosspostError::QuotaExceeded { kind, limit, .. }) => {
                assert_eq!(kind, QuotaKind::MonthlyPosts);
                assert_eq!(limit, 2);
            }
            other => panic!("expected quota error, got {:?}", other),
        }
    }

    #[test]
    fn test_unlimited_and_zero_limits() {
        let counters = UsageCounters {
            monthly_post_count: 10_000,
            scheduled_posts_count: 0,
        };
        assert!(gate(None, Some(0))
            .check(&counters, QuotaKind::MonthlyPosts)
            .is_ok());
        assert!(gate(None, Some(0))
            .check(&counters, QuotaKind::ScheduledPosts)
            .is_err());
    }
}
