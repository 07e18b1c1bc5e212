//! Document store
//!
//! Holds drafts, scheduled posts, connections and usage counters keyed by user.
//! Every write takes an explicit [`WriteMode`]:
//! - **Critical** writes gate a user-visible transition (draft save before
//!   navigating, scheduling); their failure is returned to the caller.
//! - **BestEffort** writes are bookkeeping (the post-now audit record, usage
//!   counters); their failure is logged and swallowed by [`settle`].
//!
//! Changes are broadcast as [`StoreChange`]s so caches update without polling.

mod memory;
mod sqlite;

pub use memory::{InMemoryDocumentStore, WriteRecord};
pub use sqlite::SqliteDocumentStore;

use crate::model::{
    Connection, PlanTier, SavedDraft, ScheduledPost, UsageCounter, UsageCounters,
};
use crate::platform::{DraftId, PostId, UserId};
use crate::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Whether a failed write blocks the operation that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Awaited; failure is propagated
    Critical,
    /// Non-critical bookkeeping; failure is logged only
    BestEffort,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Critical => "critical",
            WriteMode::BestEffort => "best_effort",
        }
    }
}

/// Change notification for live subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    DraftSaved { user: UserId, id: DraftId },
    DraftDeleted { user: UserId, id: DraftId },
    PostUpserted { user: UserId, id: PostId },
    PostDeleted { user: UserId, id: PostId },
    ConnectionChanged { user: UserId, connection: Connection },
    UsageChanged { user: UserId, tier: PlanTier, counters: UsageCounters },
}

/// Document store collaborator seam
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save_draft(&self, user: &UserId, draft: &SavedDraft, mode: WriteMode) -> Result<()>;

    async fn load_draft(&self, user: &UserId, id: &DraftId) -> Result<Option<SavedDraft>>;

    /// Saved drafts, most recent first
    async fn list_drafts(&self, user: &UserId) -> Result<Vec<SavedDraft>>;

    async fn delete_draft(&self, user: &UserId, id: &DraftId, mode: WriteMode) -> Result<()>;

    /// Insert or replace a scheduled/posted record
    async fn upsert_post(&self, post: &ScheduledPost, mode: WriteMode) -> Result<()>;

    async fn get_post(&self, user: &UserId, id: &PostId) -> Result<Option<ScheduledPost>>;

    /// Records ordered by scheduled time
    async fn list_posts(&self, user: &UserId) -> Result<Vec<ScheduledPost>>;

    async fn delete_post(&self, user: &UserId, id: &PostId, mode: WriteMode) -> Result<()>;

    async fn put_connection(
        &self,
        user: &UserId,
        connection: &Connection,
        mode: WriteMode,
    ) -> Result<()>;

    async fn connections(&self, user: &UserId) -> Result<Vec<Connection>>;

    /// Counters for a user on a tier (zero when never written)
    async fn usage(&self, user: &UserId, tier: &PlanTier) -> Result<UsageCounters>;

    /// Increment one counter and return the new values
    async fn increment_usage(
        &self,
        user: &UserId,
        tier: &PlanTier,
        counter: UsageCounter,
        mode: WriteMode,
    ) -> Result<UsageCounters>;

    /// Subscribe to changes made from now on
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Apply the write-mode policy to a finished write
///
/// Critical failures are returned; best-effort failures are logged and become `Ok(None)`.
pub fn settle<T>(mode: WriteMode, what: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => match mode {
            WriteMode::Critical => {
                tracing::error!(write = what, error = %e, "Critical write failed");
                Err(e)
            }
            WriteMode::BestEffort => {
                tracing::warn!(write = what, error = %e, "Best-effort write failed; continuing");
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrosspostError;

    #[test]
    fn test_settle_best_effort_swallows() {
        let result: Result<()> = Err(CrosspostError::Storage("disk full".into()));
        assert!(matches!(settle(WriteMode::BestEffort, "audit", result), Ok(None)));
    }

    #[test]
    fn test_settle_critical_propagates() {
        let result: Result<()> = Err(CrosspostError::Storage("disk full".into()));
        assert!(settle(WriteMode::Critical, "draft", result).is_err());

        let ok: Result<u8> = Ok(3);
        assert_eq!(settle(WriteMode::Critical, "draft", ok).unwrap(), Some(3));
    }
}
