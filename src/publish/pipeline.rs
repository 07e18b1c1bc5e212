//! Publication Pipeline
//!
//! `post_now` fans the draft out to each selected platform, one at a time.
//! A failing platform never stops the others. Quotas and content checks run
//! before any network call. The audit record and usage counter written after a
//! successful post are best-effort; the record written by `schedule` is critical.

use super::quota::{QuotaGate, UsageLedger};
use super::report::{PlatformFailure, PublishReport};
use crate::clients::{PublishRequest, PublisherRegistry, RequestContext};
use crate::connection::ConnectionStore;
use crate::draft::DraftOrchestrator;
use crate::error::QuotaKind;
use crate::events::{ComposerEvent, EventBus};
use crate::metrics;
use crate::model::{PostStatus, ScheduledPost, UsageCounter, UsageCounters};
use crate::platform::{PlatformCatalog, PlatformId, PostId, UserId};
use crate::store::{self, DocumentStore, StoreChange, WriteMode};
use crate::{CrosspostError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collaborators and settings for a [`PublicationPipeline`]
pub struct PublicationPipelineParts {
    pub user: UserId,
    pub draft: DraftOrchestrator,
    pub connections: ConnectionStore,
    pub publishers: PublisherRegistry,
    pub store: Arc<dyn DocumentStore>,
    pub bus: EventBus,
    pub quota: QuotaGate,
    /// Offset applied to `schedule(date, time)` inputs
    pub time_zone: FixedOffset,
}

/// Publishes and schedules the draft for one user
#[derive(Clone)]
pub struct PublicationPipeline {
    user: UserId,
    draft: DraftOrchestrator,
    connections: ConnectionStore,
    publishers: PublisherRegistry,
    store: Arc<dyn DocumentStore>,
    bus: EventBus,
    quota: QuotaGate,
    ledger: UsageLedger,
    time_zone: FixedOffset,
}

impl std::fmt::Debug for PublicationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicationPipeline")
            .field("user", &self.user)
            .field("publishers", &self.publishers)
            .field("quota", &self.quota)
            .field("usage", &self.ledger.get())
            .finish_non_exhaustive()
    }
}

/// Parse `YYYY-MM-DD` and `HH:MM` in the given offset
pub fn parse_schedule_time(date: &str, time: &str, zone: &FixedOffset) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| CrosspostError::Validation(format!("Invalid date {:?}: {}", date, e)))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|e| CrosspostError::Validation(format!("Invalid time {:?}: {}", time, e)))?;

    zone.from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| CrosspostError::Validation("Ambiguous local time".to_string()))
}

impl PublicationPipeline {
    pub fn new(parts: PublicationPipelineParts) -> Self {
        Self {
            user: parts.user,
            draft: parts.draft,
            connections: parts.connections,
            publishers: parts.publishers,
            store: parts.store,
            bus: parts.bus,
            quota: parts.quota,
            ledger: UsageLedger::default(),
            time_zone: parts.time_zone,
        }
    }

    fn catalog(&self) -> &PlatformCatalog {
        self.draft.catalog()
    }

    /// Cached usage counters
    pub fn usage(&self) -> UsageCounters {
        self.ledger.get()
    }

    /// Reload the usage counters from the document store
    pub async fn refresh_usage(&self) -> Result<UsageCounters> {
        let counters = self.store.usage(&self.user, self.quota.tier()).await?;
        self.ledger.set(counters);
        Ok(counters)
    }

    /// Apply usage changes from the document store as they happen
    ///
    /// Counters committed elsewhere (another session, an assistant action)
    /// reach the quota gate without waiting for a refresh.
    pub fn spawn_usage_sync(&self) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        let ledger = self.ledger.clone();
        let user = self.user.clone();
        let tier = self.quota.tier().clone();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(StoreChange::UsageChanged {
                        user: changed,
                        tier: changed_tier,
                        counters,
                    }) if changed == user && changed_tier == tier => {
                        debug!(
                            monthly = counters.monthly_post_count,
                            scheduled = counters.scheduled_posts_count,
                            "Usage updated from store"
                        );
                        ledger.set(counters);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Usage sync lagged");
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        })
    }

    /// Scheduled and posted records, by scheduled time
    pub async fn list_posts(&self) -> Result<Vec<ScheduledPost>> {
        self.store.list_posts(&self.user).await
    }

    fn require_publishable(&self, platforms: &[(PlatformId, String)]) -> Result<()> {
        if self.draft.selected_platforms().is_empty() {
            return Err(CrosspostError::Validation(
                "Select at least one platform".to_string(),
            ));
        }
        if platforms.is_empty() {
            return Err(CrosspostError::Validation(
                "Write something for at least one selected platform".to_string(),
            ));
        }
        Ok(())
    }

    fn reject(&self, err: CrosspostError) -> CrosspostError {
        self.bus.error(err.to_string());
        err
    }

    /// Publish the draft to every selected platform now
    ///
    /// Errors only for local rejections (validation, quota), before any network
    /// call. Otherwise returns the per-platform report; the draft is cleared
    /// when at least one platform accepted the post.
    pub async fn post_now(&self) -> Result<PublishReport> {
        let snapshot = self.draft.snapshot();
        let targets = snapshot.publishable();

        self.require_publishable(&targets)
            .map_err(|e| self.reject(e))?;
        self.quota
            .check(&self.ledger.get(), QuotaKind::MonthlyPosts)
            .map_err(|e| self.reject(e))?;

        let mut report = PublishReport {
            skipped: snapshot
                .selected_platforms
                .iter()
                .filter(|p| !targets.iter().any(|(t, _)| t == *p))
                .cloned()
                .collect(),
            ..Default::default()
        };

        let ctx = RequestContext::new(self.user.clone());
        info!(
            correlation_id = %ctx.correlation_id,
            platforms = targets.len(),
            "Publishing"
        );

        for (platform, content) in &targets {
            match self.dispatch(platform, content, &snapshot.attachment, &ctx).await {
                Ok(remote_id) => {
                    metrics::record_dispatch(platform.as_str(), true);
                    debug!(platform = %platform, remote_id = ?remote_id, "Published");
                    if let Some(id) = remote_id {
                        report.post_ids.insert(platform.clone(), id);
                    }
                    report.succeeded.push(platform.clone());
                }
                Err(e) => {
                    metrics::record_dispatch(platform.as_str(), false);
                    warn!(
                        platform = %platform,
                        correlation_id = %ctx.correlation_id,
                        error = %e,
                        "Publish failed"
                    );
                    report.failed.push(PlatformFailure {
                        platform: platform.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Publish finished"
        );

        if !report.is_success() {
            self.bus.error(format!(
                "Failed to post to {}",
                self.catalog().display_names(&report.failed_platforms())
            ));
            return Ok(report);
        }

        let mut record = ScheduledPost::from_snapshot(
            self.user.clone(),
            &snapshot,
            &report.succeeded,
            Utc::now(),
            PostStatus::Posted,
        );
        record.platform_post_ids = report.post_ids.clone();

        let written = store::settle(
            WriteMode::BestEffort,
            "post record",
            self.store.upsert_post(&record, WriteMode::BestEffort).await,
        )?;
        if written.is_some() {
            report.record_id = Some(record.id.clone());
        }

        self.bump_usage(UsageCounter::MonthlyPosts).await?;

        self.draft.clear();
        self.bus.emit(ComposerEvent::DraftCleared);
        self.bus.success(format!(
            "Posted to {}",
            self.catalog().display_names(&report.succeeded)
        ));
        if !report.failed.is_empty() {
            let details = report
                .failed
                .iter()
                .map(|f| format!("{}: {}", self.catalog().display_name(&f.platform), f.message))
                .collect::<Vec<_>>()
                .join("; ");
            self.bus.error(format!("Some platforms failed. {}", details));
        }

        Ok(report)
    }

    async fn dispatch(
        &self,
        platform: &PlatformId,
        content: &str,
        image: &Option<crate::model::Attachment>,
        ctx: &RequestContext,
    ) -> Result<Option<String>> {
        if !self.connections.is_connected(platform) {
            return Err(CrosspostError::Publish {
                platform: platform.clone(),
                message: "not connected".to_string(),
            });
        }
        let adapter = self
            .publishers
            .get(platform)
            .ok_or_else(|| CrosspostError::Publish {
                platform: platform.clone(),
                message: "no publisher registered".to_string(),
            })?;

        let request = PublishRequest {
            content: content.to_string(),
            image: image.clone(),
            user_id: self.user.clone(),
        };
        let receipt = adapter.publish(&request, ctx).await?;
        Ok(receipt.remote_id)
    }

    /// Bump a usage counter locally and in the store (best-effort)
    async fn bump_usage(&self, counter: UsageCounter) -> Result<()> {
        self.ledger.increment(counter);
        let stored = store::settle(
            WriteMode::BestEffort,
            "usage counter",
            self.store
                .increment_usage(&self.user, self.quota.tier(), counter, WriteMode::BestEffort)
                .await,
        )?;
        if let Some(counters) = stored {
            self.ledger.set(counters);
        }
        Ok(())
    }

    /// Schedule the draft for `date` (`YYYY-MM-DD`) at `time` (`HH:MM`)
    pub async fn schedule(&self, date: &str, time: &str) -> Result<ScheduledPost> {
        let targets = self.draft.publishable();
        self.require_publishable(&targets)
            .map_err(|e| self.reject(e))?;

        let when = parse_schedule_time(date, time, &self.time_zone).map_err(|e| self.reject(e))?;
        self.schedule_at(when).await
    }

    /// Schedule the draft for an absolute time
    pub async fn schedule_at(&self, when: DateTime<Utc>) -> Result<ScheduledPost> {
        let snapshot = self.draft.snapshot();
        let targets = snapshot.publishable();
        self.require_publishable(&targets)
            .map_err(|e| self.reject(e))?;

        if when <= Utc::now() {
            return Err(self.reject(CrosspostError::Validation(
                "Scheduled time must be in the future".to_string(),
            )));
        }
        self.quota
            .check(&self.ledger.get(), QuotaKind::ScheduledPosts)
            .map_err(|e| self.reject(e))?;

        let platforms: Vec<PlatformId> = targets.into_iter().map(|(p, _)| p).collect();
        let record = ScheduledPost::from_snapshot(
            self.user.clone(),
            &snapshot,
            &platforms,
            when,
            PostStatus::Pending,
        );

        if let Err(e) = self.store.upsert_post(&record, WriteMode::Critical).await {
            warn!(error = %e, "Could not save scheduled post");
            self.bus.error("Couldn't schedule the post. Please try again.");
            return Err(e);
        }
        info!(post = %record.id, scheduled_time = %when, "Post scheduled");

        self.bump_usage(UsageCounter::ScheduledPosts).await?;

        self.draft.clear();
        self.bus.emit(ComposerEvent::DraftCleared);
        self.bus.success(format!(
            "Scheduled for {} on {}",
            when.with_timezone(&self.time_zone).format("%Y-%m-%d %H:%M"),
            self.catalog().display_names(&platforms)
        ));
        Ok(record)
    }

    /// Delete a record, first removing published copies where possible
    ///
    /// Remote deletes are best-effort; the local record is removed regardless.
    pub async fn delete_post(&self, id: &PostId) -> Result<()> {
        let post = self
            .store
            .get_post(&self.user, id)
            .await?
            .ok_or_else(|| CrosspostError::NotFound(format!("Post {}", id)))?;

        if post.status == PostStatus::Posted {
            let ctx = RequestContext::new(self.user.clone());
            for (platform, remote_id) in &post.platform_post_ids {
                let Some(adapter) = self.publishers.get(platform) else {
                    continue;
                };
                if !adapter.supports_delete() {
                    debug!(platform = %platform, "Remote delete unsupported; skipping");
                    continue;
                }
                if let Err(e) = adapter.delete(remote_id, &ctx).await {
                    warn!(
                        platform = %platform,
                        correlation_id = %ctx.correlation_id,
                        error = %e,
                        "Remote delete failed; removing local record anyway"
                    );
                }
            }
        }

        self.store
            .delete_post(&self.user, id, WriteMode::Critical)
            .await?;
        self.bus.success("Post deleted");
        Ok(())
    }

    /// Remove one platform from a record; the last platform removes the record
    pub async fn delete_platform(&self, id: &PostId, platform: &PlatformId) -> Result<()> {
        let mut post = self
            .store
            .get_post(&self.user, id)
            .await?
            .ok_or_else(|| CrosspostError::NotFound(format!("Post {}", id)))?;

        if !post.platforms.contains(platform) {
            return Err(CrosspostError::NotFound(format!(
                "Post {} has no {} entry",
                id, platform
            )));
        }

        if post.remove_platform(platform) {
            self.store
                .delete_post(&self.user, id, WriteMode::Critical)
                .await?;
        } else {
            self.store.upsert_post(&post, WriteMode::Critical).await?;
        }
        self.bus.success(format!(
            "Removed {} from the post",
            self.catalog().display_name(platform)
        ));
        Ok(())
    }
}
