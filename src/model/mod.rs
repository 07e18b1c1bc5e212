//! Core data model
//!
//! - **Draft**: the in-progress composition ([`DraftSnapshot`], [`Attachment`], [`SavedDraft`])
//! - **ScheduledPost**: a draft frozen for delayed or completed publication
//! - **Connection**: connected/disconnected status per platform
//! - **ChatTurn**: one message of the assistant conversation
//! - **UsageCounters**: plan-tier quota bookkeeping

mod chat;
mod connection;
mod draft;
mod post;
mod usage;

pub use chat::{ActionResult, AssistantAction, ChatRole, ChatTurn, HistoryEntry};
pub use connection::Connection;
pub use draft::{Attachment, DraftSnapshot, SavedDraft};
pub use post::{PostStatus, ScheduledPost};
pub use usage::{PlanTier, UsageCounter, UsageCounters};
