//! Crosspost - Composer Orchestration Engine
//!
//! Crosspost lets a user compose one post and fan it out to many independent
//! publishing platforms, optionally assisted by a conversational AI that can
//! suggest content or publish on the user's behalf. The crate is the
//! orchestration core; rendering and the collaborators' internals live
//! elsewhere.
//!
//! # Architecture
//!
//! - **connection**: Connection Store and the external-auth handshake (popup + message/poll race)
//! - **draft**: Per-platform content, tone and active-tab state
//! - **assistant**: AI Assistant Bridge (chat turns, suggestions, actions, images)
//! - **publish**: Publication Pipeline (fan-out, scheduling, quotas, partial failure)
//! - **guard**: Unsaved-Content Guard for navigation
//! - **composer**: Wires the components for one user session
//! - **clients**: Identity, publish and assistant collaborators (HTTP)
//! - **store**: Document store (in-memory, SQLite) with critical/best-effort writes
//! - **events**: Typed event bus for connection changes and notifications
//! - **config**: YAML configuration

// Core modules
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod platform;
pub mod store;

// Collaborators
pub mod clients;

// Engine components
pub mod assistant;
pub mod composer;
pub mod connection;
pub mod draft;
pub mod guard;
pub mod publish;

#[cfg(test)]
mod testing;

// Re-exports
pub use composer::{Collaborators, ComposerSession};
pub use error::{CrosspostError, Result};
