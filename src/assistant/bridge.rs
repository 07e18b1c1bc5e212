//! AI Assistant Bridge
//!
//! Sends chat turns with the draft as context and applies the typed outcome:
//! suggestions land in the draft, and completed post/schedule actions clear it
//! and resync usage counters.

use super::protocol::{AssistantOutcome, ChatRequest};
use super::topic::PlatformSelection;
use crate::clients::{AssistantService, RequestContext};
use crate::connection::ConnectionStore;
use crate::draft::DraftOrchestrator;
use crate::events::{ComposerEvent, EventBus};
use crate::metrics;
use crate::model::{ActionResult, Attachment, ChatTurn, DraftSnapshot, HistoryEntry};
use crate::platform::{PlatformId, UserId};
use crate::publish::PublicationPipeline;
use crate::{CrosspostError, Result};
use chrono::FixedOffset;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Assistant turn appended when the service cannot be reached
pub const UNREACHABLE_REPLY: &str =
    "Sorry, I could not reach the AI service. Please try again in a moment.";

/// Result of one chat exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// The assistant answered and its outcome was applied
    Answered {
        turn: ChatTurn,
        outcome: AssistantOutcome,
    },
    /// Transport failure; `turn` is the apology appended to the history
    Unreachable { turn: ChatTurn },
}

impl Exchange {
    pub fn turn(&self) -> &ChatTurn {
        match self {
            Exchange::Answered { turn, .. } | Exchange::Unreachable { turn } => turn,
        }
    }

    pub fn outcome(&self) -> Option<&AssistantOutcome> {
        match self {
            Exchange::Answered { outcome, .. } => Some(outcome),
            Exchange::Unreachable { .. } => None,
        }
    }
}

/// Collaborators and settings for an [`AssistantBridge`]
pub struct AssistantBridgeParts {
    pub user: UserId,
    pub service: Arc<dyn AssistantService>,
    pub draft: DraftOrchestrator,
    pub connections: ConnectionStore,
    pub bus: EventBus,
    pub image_cooldown: Duration,
    /// Offset used when showing scheduled times
    pub time_zone: FixedOffset,
}

#[derive(Default)]
struct Session {
    turns: Vec<ChatTurn>,
    last_image_request: Option<Instant>,
}

/// Handle to the assistant conversation of one composer session
#[derive(Clone)]
pub struct AssistantBridge {
    user: UserId,
    service: Arc<dyn AssistantService>,
    draft: DraftOrchestrator,
    connections: ConnectionStore,
    bus: EventBus,
    image_cooldown: Duration,
    time_zone: FixedOffset,
    pipeline: Option<PublicationPipeline>,
    session: Arc<Mutex<Session>>,
}

impl std::fmt::Debug for AssistantBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantBridge")
            .field("user", &self.user)
            .field("turns", &self.session().turns.len())
            .finish_non_exhaustive()
    }
}

impl AssistantBridge {
    pub fn new(parts: AssistantBridgeParts) -> Self {
        Self {
            user: parts.user,
            service: parts.service,
            draft: parts.draft,
            connections: parts.connections,
            bus: parts.bus,
            image_cooldown: parts.image_cooldown,
            time_zone: parts.time_zone,
            pipeline: None,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// Refresh this pipeline's usage counters after assistant post/schedule actions
    pub fn with_pipeline(mut self, pipeline: PublicationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, turn: ChatTurn) {
        self.session().turns.push(turn);
    }

    /// Chat history of this session, oldest first
    pub fn history(&self) -> Vec<ChatTurn> {
        self.session().turns.clone()
    }

    /// Forget the conversation
    pub fn end_session(&self) {
        let mut session = self.session();
        session.turns.clear();
        session.last_image_request = None;
    }

    /// Send one user message and apply the assistant's answer
    ///
    /// Never fails: transport errors append an apology turn instead.
    pub async fn send(&self, message: &str) -> Exchange {
        let snapshot = self.draft.snapshot();
        self.send_with(message, snapshot.selected_platforms.clone(), snapshot)
            .await
    }

    async fn send_with(
        &self,
        message: &str,
        selected_platforms: Vec<PlatformId>,
        snapshot: DraftSnapshot,
    ) -> Exchange {
        let history: Vec<HistoryEntry> = self.session().turns.iter().map(HistoryEntry::from).collect();
        self.push(ChatTurn::user(message));

        let request = ChatRequest {
            message: message.to_string(),
            current_content: snapshot.platform_content,
            history,
            selected_platforms,
            connected_platforms: self.connections.connected_platforms(),
            image: snapshot.attachment,
        };

        let ctx = RequestContext::new(self.user.clone());
        let response = match self.service.chat(&request, &ctx).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    error = %e,
                    "Assistant request failed"
                );
                metrics::record_assistant_turn("unreachable");
                let turn = ChatTurn::assistant(UNREACHABLE_REPLY);
                self.push(turn.clone());
                return Exchange::Unreachable { turn };
            }
        };

        let outcome = response.outcome();
        let turn = response.to_turn();
        self.push(turn.clone());

        debug!(outcome = outcome.kind(), "Assistant answered");
        metrics::record_assistant_turn(outcome.kind());
        self.apply(&outcome);
        if matches!(
            outcome,
            AssistantOutcome::Posted(_) | AssistantOutcome::Scheduled(_)
        ) {
            self.sync_usage().await;
        }

        Exchange::Answered { turn, outcome }
    }

    fn apply(&self, outcome: &AssistantOutcome) {
        match outcome {
            AssistantOutcome::Posted(result) => {
                self.clear_draft();
                self.bus.success(self.posted_message(result));
            }
            AssistantOutcome::Scheduled(result) => {
                self.clear_draft();
                self.bus.success(self.scheduled_message(result));
            }
            AssistantOutcome::PlatformSuggestions(suggestions) => {
                self.draft.merge_suggestions(suggestions);
            }
            AssistantOutcome::Suggestion(text) => match self.draft.apply_suggestion(text) {
                Some(platform) => debug!(platform = %platform, "Applied suggestion"),
                None => debug!("No target platform; suggestion kept in chat only"),
            },
            AssistantOutcome::ReplyOnly => {}
        }
    }

    /// Pull counters the assistant's action committed outside this session
    async fn sync_usage(&self) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        if let Err(e) = pipeline.refresh_usage().await {
            warn!(error = %e, "Could not refresh usage after assistant action");
        }
    }

        fn clear_draft(&self) {
        self.draft.clear();
        self.bus.emit(ComposerEvent::DraftCleared);
    }

    fn posted_message(&self, result: &ActionResult) -> String {
        if result.platforms.is_empty() {
            "Posted successfully".to_string()
        } else {
            format!(
                "Posted to {}",
                self.draft.catalog().display_names(&result.platforms)
            )
        }
    }

    fn scheduled_message(&self, result: &ActionResult) -> String {
        let when = result
            .scheduled_time
            .map(|t| {
                t.with_timezone(&self.time_zone)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_else(|| "later".to_string());
        if result.platforms.is_empty() {
            format!("Scheduled for {}", when)
        } else {
            format!(
                "Scheduled for {} on {}",
                when,
                self.draft.catalog().display_names(&result.platforms)
            )
        }
    }

    /// Checklist of connected platforms for a trending topic
    pub fn begin_topic(&self, topic: impl Into<String>) -> PlatformSelection {
        PlatformSelection::new(topic, self.connections.connected_platforms())
    }

    /// Start a fresh draft on the checked platforms and ask for content
    pub async fn generate_for_topic(&self, selection: &PlatformSelection) -> Result<Exchange> {
        let platforms = selection.checked();
        if platforms.is_empty() {
            return Err(CrosspostError::Validation(
                "Select at least one platform".to_string(),
            ));
        }

        info!(topic = selection.topic(), platforms = platforms.len(), "Generating from topic");
        self.draft.load_from(DraftSnapshot {
            selected_platforms: platforms.clone(),
            ..Default::default()
        });

        let prompt = format!(
            "Write a post about \"{}\" for {}",
            selection.topic(),
            self.draft.catalog().display_names(&platforms)
        );
        let snapshot = self.draft.snapshot();
        Ok(self.send_with(&prompt, platforms, snapshot).await)
    }

    /// Generate an image and attach it to the draft
    ///
    /// Requests within the cooldown are rejected with the seconds left.
    pub async fn generate_image(&self, prompt: &str) -> Result<Attachment> {
        {
            let mut session = self.session();
            let now = Instant::now();
            if let Some(last) = session.last_image_request {
                let elapsed = now.duration_since(last);
                if elapsed < self.image_cooldown {
                    let remaining = self.image_cooldown - elapsed;
                    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                    return Err(CrosspostError::Cooldown(secs));
                }
            }
            session.last_image_request = Some(now);
        }

        let ctx = RequestContext::new(self.user.clone());
        match self.service.generate_image(prompt, &ctx).await {
            Ok(image) => {
                self.draft.set_attachment(image.clone());
                self.push(ChatTurn::assistant("Here's your image. It's attached to the draft."));
                Ok(image)
            }
            Err(e) => {
                warn!(correlation_id = %ctx.correlation_id, error = %e, "Image generation failed");
                self.push(ChatTurn::assistant(format!(
                    "Sorry, I couldn't generate that image: {}",
                    e
                )));
                Err(e)
            }
        }
    }
}
