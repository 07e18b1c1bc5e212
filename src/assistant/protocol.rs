//! Wire shapes of the assistant chat protocol and the typed outcome they resolve to

use crate::model::{
    ActionResult, AssistantAction, Attachment, ChatRole, ChatTurn, HistoryEntry,
};
use crate::platform::PlatformId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One chat turn sent to the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub current_content: BTreeMap<PlatformId, String>,
    pub history: Vec<HistoryEntry>,
    pub selected_platforms: Vec<PlatformId>,
    pub connected_platforms: Vec<PlatformId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Attachment>,
}

/// Raw assistant response; fields are present in loosely combined shapes
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default, alias = "message", alias = "response")]
    pub reply: String,
    #[serde(default)]
    pub suggested_content: Option<String>,
    #[serde(default)]
    pub suggested_platform_content: Option<IndexMap<PlatformId, String>>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub action_result: Option<ActionResult>,
}

/// What one assistant turn means for the composer
///
/// Resolved once at the bridge boundary so nothing downstream inspects
/// optional fields to guess the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantOutcome {
    /// The assistant already published through the pipeline
    Posted(ActionResult),
    /// The assistant already scheduled through the pipeline
    Scheduled(ActionResult),
    /// Per-platform content to merge into the draft, in response order
    PlatformSuggestions(IndexMap<PlatformId, String>),
    /// Single content for the active platform
    Suggestion(String),
    /// Conversation only
    ReplyOnly,
}

impl AssistantOutcome {
    /// Label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AssistantOutcome::Posted(_) => "posted",
            AssistantOutcome::Scheduled(_) => "scheduled",
            AssistantOutcome::PlatformSuggestions(_) => "platform_suggestions",
            AssistantOutcome::Suggestion(_) => "suggestion",
            AssistantOutcome::ReplyOnly => "reply_only",
        }
    }
}

fn parse_action(action: Option<&str>) -> Option<AssistantAction> {
    match action.map(|a| a.trim().to_lowercase()).as_deref() {
        Some("post") => Some(AssistantAction::Post),
        Some("schedule") => Some(AssistantAction::Schedule),
        _ => None,
    }
}

impl ChatResponse {
    /// Resolve the loosely-typed response, in priority order:
    /// post action, schedule action, per-platform content, single content, reply only
    pub fn outcome(&self) -> AssistantOutcome {
        match parse_action(self.action.as_deref()) {
            Some(AssistantAction::Post) => {
                return AssistantOutcome::Posted(self.action_result.clone().unwrap_or_default())
            }
            Some(AssistantAction::Schedule) => {
                return AssistantOutcome::Scheduled(self.action_result.clone().unwrap_or_default())
            }
            None => {}
        }

        if let Some(map) = self.suggested_platform_content.as_ref().filter(|m| !m.is_empty()) {
            return AssistantOutcome::PlatformSuggestions(map.clone());
        }

        match self.suggested_content.as_deref() {
            Some(text) if !text.trim().is_empty() => AssistantOutcome::Suggestion(text.to_string()),
            _ => AssistantOutcome::ReplyOnly,
        }
    }

    /// The history entry recorded for this response
    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn {
            role: ChatRole::Assistant,
            content: self.reply.clone(),
            suggested_content: self.suggested_content.clone(),
            suggested_platform_content: self.suggested_platform_content.clone(),
            action: parse_action(self.action.as_deref()),
            action_result: self.action_result.clone(),
        }
    }
}
