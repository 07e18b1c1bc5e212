//! Event bus for engine-to-presentation signalling
//!
//! Components publish typed [`ComposerEvent`]s; any interested view (a
//! connection grid, a toast area) subscribes. Nothing in the engine keeps
//! global flags for cross-component coordination.

use crate::connection::HandshakeState;
use crate::platform::PlatformId;
use tokio::sync::broadcast;

/// Default event channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A non-modal toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Events emitted by engine components
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerEvent {
    /// A platform's handshake state changed
    ConnectionChanged {
        platform: PlatformId,
        state: HandshakeState,
    },

    /// The draft was cleared after a publish, schedule, discard or assistant action
    DraftCleared,

    /// Show a toast
    Notify(Notification),
}

/// Broadcast channel shared by all components of a session
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ComposerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ComposerEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is fine
    pub fn emit(&self, event: ComposerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(ComposerEvent::Notify(Notification::new(level, message)));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// Collect every event currently buffered in a receiver
pub fn drain(rx: &mut broadcast::Receiver<ComposerEvent>) -> Vec<ComposerEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event receiver lagged");
            }
            Err(_) => break,
        }
    }
    events
}

/// Only the notifications among a list of events
pub fn notifications(events: &[ComposerEvent]) -> Vec<&Notification> {
    events
        .iter()
        .filter_map(|e| match e {
            ComposerEvent::Notify(n) => Some(n),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.success("nobody listening");
    }

    #[test]
    fn test_subscribe_and_drain() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.success("Posted");
        bus.emit(ComposerEvent::DraftCleared);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        let toasts = notifications(&events);
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, NotificationLevel::Success);
        assert!(drain(&mut rx).is_empty());
    }
}
