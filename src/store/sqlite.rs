//! SQLite document store
//!
//! Records are stored as JSON bodies keyed by `(user_id, id)`; the few fields
//! used for ordering live in their own columns.

use super::{DocumentStore, StoreChange, WriteMode};
use crate::config::StorageConfig;
use crate::model::{
    Connection as PlatformConnection, PlanTier, SavedDraft, ScheduledPost, UsageCounter,
    UsageCounters,
};
use crate::platform::{DraftId, PostId, UserId};
use crate::{CrosspostError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Document store backed by a local SQLite database
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl std::fmt::Debug for SqliteDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDocumentStore").finish_non_exhaustive()
    }
}

impl SqliteDocumentStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Opening document store");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::open(&config.path)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let (changes, _) = broadcast::channel(128);
        let store = Self {
            conn: Mutex::new(conn),
            changes,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS drafts (
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (user_id, id)
            );

            CREATE TABLE IF NOT EXISTS posts (
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                status TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (user_id, id)
            );

            CREATE TABLE IF NOT EXISTS connections (
                user_id TEXT NOT NULL,
                platform_id TEXT NOT NULL,
                connected INTEGER NOT NULL,
                connected_at TEXT,
                PRIMARY KEY (user_id, platform_id)
            );

            CREATE TABLE IF NOT EXISTS usage (
                user_id TEXT NOT NULL,
                tier TEXT NOT NULL,
                monthly_post_count INTEGER NOT NULL DEFAULT 0,
                scheduled_posts_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, tier)
            );

            CREATE INDEX IF NOT EXISTS idx_posts_user_time ON posts(user_id, scheduled_time);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }

    fn read_usage(conn: &Connection, user: &UserId, tier: &PlanTier) -> Result<UsageCounters> {
        let counters = conn
            .query_row(
                "SELECT monthly_post_count, scheduled_posts_count FROM usage
                 WHERE user_id = ?1 AND tier = ?2",
                params![user.as_str(), tier.as_str()],
                |row| {
                    Ok(UsageCounters {
                        monthly_post_count: row.get(0)?,
                        scheduled_posts_count: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(counters.unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn save_draft(&self, user: &UserId, draft: &SavedDraft, mode: WriteMode) -> Result<()> {
        tracing::debug!(draft = %draft.id, mode = mode.as_str(), "Saving draft");
        let body = serde_json::to_string(draft)?;
        self.lock().execute(
            "INSERT OR REPLACE INTO drafts (user_id, id, saved_at, body) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.as_str(),
                draft.id.as_str(),
                draft.saved_at.to_rfc3339(),
                body
            ],
        )?;
        self.publish(StoreChange::DraftSaved {
            user: user.clone(),
            id: draft.id.clone(),
        });
        Ok(())
    }

    async fn load_draft(&self, user: &UserId, id: &DraftId) -> Result<Option<SavedDraft>> {
        let body: Option<String> = self
            .lock()
            .query_row(
                "SELECT body FROM drafts WHERE user_id = ?1 AND id = ?2",
                params![user.as_str(), id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    async fn list_drafts(&self, user: &UserId) -> Result<Vec<SavedDraft>> {
        let bodies = {
            let conn = self.lock();
            let mut stmt = conn
                .prepare("SELECT body FROM drafts WHERE user_id = ?1 ORDER BY saved_at DESC")?;
            let rows = stmt.query_map(params![user.as_str()], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(CrosspostError::from))
            .collect()
    }

    async fn delete_draft(&self, user: &UserId, id: &DraftId, mode: WriteMode) -> Result<()> {
        tracing::debug!(draft = %id, mode = mode.as_str(), "Deleting draft");
        self.lock().execute(
            "DELETE FROM drafts WHERE user_id = ?1 AND id = ?2",
            params![user.as_str(), id.as_str()],
        )?;
        self.publish(StoreChange::DraftDeleted {
            user: user.clone(),
            id: id.clone(),
        });
        Ok(())
    }

    async fn upsert_post(&self, post: &ScheduledPost, mode: WriteMode) -> Result<()> {
        tracing::debug!(post = %post.id, mode = mode.as_str(), "Writing post record");
        let body = serde_json::to_string(post)?;
        self.lock().execute(
            "INSERT OR REPLACE INTO posts (user_id, id, status, scheduled_time, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                post.user_id.as_str(),
                post.id.as_str(),
                post.status.as_str(),
                post.scheduled_time.to_rfc3339(),
                body
            ],
        )?;
        self.publish(StoreChange::PostUpserted {
            user: post.user_id.clone(),
            id: post.id.clone(),
        });
        Ok(())
    }

    async fn get_post(&self, user: &UserId, id: &PostId) -> Result<Option<ScheduledPost>> {
        let body: Option<String> = self
            .lock()
            .query_row(
                "SELECT body FROM posts WHERE user_id = ?1 AND id = ?2",
                params![user.as_str(), id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    async fn list_posts(&self, user: &UserId) -> Result<Vec<ScheduledPost>> {
        let bodies = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT body FROM posts WHERE user_id = ?1 ORDER BY scheduled_time ASC",
            )?;
            let rows = stmt.query_map(params![user.as_str()], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(CrosspostError::from))
            .collect()
    }

    async fn delete_post(&self, user: &UserId, id: &PostId, mode: WriteMode) -> Result<()> {
        tracing::debug!(post = %id, mode = mode.as_str(), "Deleting post record");
        self.lock().execute(
            "DELETE FROM posts WHERE user_id = ?1 AND id = ?2",
            params![user.as_str(), id.as_str()],
        )?;
        self.publish(StoreChange::PostDeleted {
            user: user.clone(),
            id: id.clone(),
        });
        Ok(())
    }

    async fn put_connection(
        &self,
        user: &UserId,
        connection: &PlatformConnection,
        mode: WriteMode,
    ) -> Result<()> {
        tracing::debug!(
            platform = %connection.platform_id,
            connected = connection.connected,
            mode = mode.as_str(),
            "Writing connection"
        );
        self.lock().execute(
            "INSERT OR REPLACE INTO connections (user_id, platform_id, connected, connected_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.as_str(),
                connection.platform_id.as_str(),
                connection.connected,
                connection.connected_at.map(|t| t.to_rfc3339())
            ],
        )?;
        self.publish(StoreChange::ConnectionChanged {
            user: user.clone(),
            connection: connection.clone(),
        });
        Ok(())
    }

    async fn connections(&self, user: &UserId) -> Result<Vec<PlatformConnection>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT platform_id, connected, connected_at FROM connections
             WHERE user_id = ?1 ORDER BY platform_id",
        )?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut connections = Vec::new();
        for row in rows {
            let (platform, connected, connected_at) = row?;
            connections.push(PlatformConnection {
                platform_id: platform.into(),
                connected,
                connected_at: connected_at
                    .and_then(|t| chrono::DateTime::parse_from_rfc3339(&t).ok())
                    .map(|t| t.with_timezone(&chrono::Utc)),
            });
        }
        Ok(connections)
    }

    async fn usage(&self, user: &UserId, tier: &PlanTier) -> Result<UsageCounters> {
        Self::read_usage(&self.lock(), user, tier)
    }

    async fn increment_usage(
        &self,
        user: &UserId,
        tier: &PlanTier,
        counter: UsageCounter,
        mode: WriteMode,
    ) -> Result<UsageCounters> {
        tracing::debug!(counter = counter.column(), mode = mode.as_str(), "Incrementing usage");
        let counters = {
            let conn = self.lock();
            conn.execute(
                "INSERT OR IGNORE INTO usage (user_id, tier) VALUES (?1, ?2)",
                params![user.as_str(), tier.as_str()],
            )?;
            // Column names come from a closed enum
            conn.execute(
                &format!(
                    "UPDATE usage SET {col} = {col} + 1 WHERE user_id = ?1 AND tier = ?2",
                    col = counter.column()
                ),
                params![user.as_str(), tier.as_str()],
            )?;
            Self::read_usage(&conn, user, tier)?
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
