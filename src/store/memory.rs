//! In-memory document store
//!
//! Used by embedders without persistence and by tests. It records the
//! [`WriteMode`] of every write and can be told to fail writes, so the
//! critical/best-effort policy is observable.

use super::{DocumentStore, StoreChange, WriteMode};
use crate::model::{
    Connection, PlanTier, SavedDraft, ScheduledPost, UsageCounter, UsageCounters,
};
use crate::platform::{DraftId, PlatformId, PostId, UserId};
use crate::{CrosspostError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// One recorded write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub operation: &'static str,
    pub mode: WriteMode,
}

#[derive(Debug, Default)]
struct MemoryState {
    drafts: HashMap<(UserId, DraftId), SavedDraft>,
    posts: HashMap<(UserId, PostId), ScheduledPost>,
    connections: HashMap<(UserId, PlatformId), Connection>,
    usage: HashMap<(UserId, PlanTier), UsageCounters>,
    writes: Vec<WriteRecord>,
    fail_writes: bool,
}

/// Document store backed by hash maps
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    state: Mutex<MemoryState>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(128);
        Self {
            state: Mutex::new(MemoryState::default()),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following write fail with a storage error
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Every write attempted so far, including failed ones
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Number of stored scheduled/posted records across all users
    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    /// Begin a write: log it and honour the failure switch
    fn begin_write(&self, operation: &'static str, mode: WriteMode) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.writes.push(WriteRecord { operation, mode });
        if state.fail_writes {
            return Err(CrosspostError::Storage(format!(
                "{} failed: store unavailable",
                operation
            )));
        }
        Ok(state)
    }

    fn publish(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save_draft(&self, user: &UserId, draft: &SavedDraft, mode: WriteMode) -> Result<()> {
        {
            let mut state = self.begin_write("save_draft", mode)?;
            state
                .drafts
                .insert((user.clone(), draft.id.clone()), draft.clone());
        }
        self.publish(StoreChange::DraftSaved {
            user: user.clone(),
            id: draft.id.clone(),
        });
        Ok(())
    }

    async fn load_draft(&self, user: &UserId, id: &DraftId) -> Result<Option<SavedDraft>> {
        Ok(self.lock().drafts.get(&(user.clone(), id.clone())).cloned())
    }

    async fn list_drafts(&self, user: &UserId) -> Result<Vec<SavedDraft>> {
        let mut drafts: Vec<SavedDraft> = self
            .lock()
            .drafts
            .iter()
            .filter(|((u, _), _)| u == user)
            .map(|(_, d)| d.clone())
            .collect();
        drafts.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(drafts)
    }

    async fn delete_draft(&self, user: &UserId, id: &DraftId, mode: WriteMode) -> Result<()> {
        {
            let mut state = self.begin_write("delete_draft", mode)?;
            state.drafts.remove(&(user.clone(), id.clone()));
        }
        self.publish(StoreChange::DraftDeleted {
            user: user.clone(),
            id: id.clone(),
        });
        Ok(())
    }

    async fn upsert_post(&self, post: &ScheduledPost, mode: WriteMode) -> Result<()> {
        {
            let mut state = self.begin_write("upsert_post", mode)?;
            state
                .posts
                .insert((post.user_id.clone(), post.id.clone()), post.clone());
        }
        self.publish(StoreChange::PostUpserted {
            user: post.user_id.clone(),
            id: post.id.clone(),
        });
        Ok(())
    }

    async fn get_post(&self, user: &UserId, id: &PostId) -> Result<Option<ScheduledPost>> {
        Ok(self.lock().posts.get(&(user.clone(), id.clone())).cloned())
    }

    async fn list_posts(&self, user: &UserId) -> Result<Vec<ScheduledPost>> {
        let mut posts: Vec<ScheduledPost> = self
            .lock()
            .posts
            .iter()
            .filter(|((u, _), _)| u == user)
            .map(|(_, p)| p.clone())
            .collect();
        posts.sort_by(|a, b| a.scheduled_time.cmp(&b.scheduled_time));
        Ok(posts)
    }

    async fn delete_post(&self, user: &UserId, id: &PostId, mode: WriteMode) -> Result<()> {
        {
            let mut state = self.begin_write("delete_post", mode)?;
            state.posts.remove(&(user.clone(), id.clone()));
        }
        self.publish(StoreChange::PostDeleted {
            user: user.clone(),
            id: id.clone(),
        });
        Ok(())
    }

    async fn put_connection(
        &self,
        user: &UserId,
        connection: &Connection,
        mode: WriteMode,
    ) -> Result<()> {
        {
            let mut state = self.begin_write("put_connection", mode)?;
            state.connections.insert(
                (user.clone(), connection.platform_id.clone()),
                connection.clone(),
            );
        }
        self.publish(StoreChange::ConnectionChanged {
            user: user.clone(),
            connection: connection.clone(),
        });
        Ok(())
    }

    async fn connections(&self, user: &UserId) -> Result<Vec<Connection>> {
        let mut connections: Vec<Connection> = self
            .lock()
            .connections
            .iter()
            .filter(|((u, _), _)| u == user)
            .map(|(_, c)| c.clone())
            .collect();
        connections.sort_by(|a, b| a.platform_id.cmp(&b.platform_id));
        Ok(connections)
    }

    async fn usage(&self, user: &UserId, tier: &PlanTier) -> Result<UsageCounters> {
        Ok(self
            .lock()
            .usage
            .get(&(user.clone(), tier.clone()))
            .copied()
            .unwrap_or_default())
    }

    async fn increment_usage(
        &self,
        user: &UserId,
        tier: &PlanTier,
        counter: UsageCounter,
        mode: WriteMode,
    ) -> Result<UsageCounters> {
        let counters = {
            let mut state = self.begin_write("increment_usage", mode)?;
            let entry = state
                .usage
                .entry((user.clone(), tier.clone()))
                .or_default();
            entry.increment(counter);
            *entry
        };
        self.publish(StoreChange::UsageChanged {
            user: user.clone(),
            tier: tier.clone(),
            counters,
        });
        Ok(counters)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
