//! AI Assistant Bridge
//!
//! Sends chat turns to the assistant collaborator and applies what comes back.
//! Responses are resolved into an [`AssistantOutcome`] at the boundary; the
//! bridge then either merges suggestions into the draft or reports an action
//! the assistant already executed.

mod bridge;
pub mod protocol;
mod topic;

pub use bridge::{AssistantBridge, AssistantBridgeParts, Exchange, UNREACHABLE_REPLY};
pub use protocol::{AssistantOutcome, ChatRequest, ChatResponse};
pub use topic::PlatformSelection;
