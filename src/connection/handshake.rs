//! Handshake state machine and the generation-tagged registry
//!
//! Each platform has at most one live handshake. Every `begin` hands out a new
//! generation; a completion signal carrying an older generation cannot touch a
//! newer handshake, and a handshake leaves `Connecting` exactly once.

use super::window::AuthWindow;
use crate::platform::PlatformId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Why a handshake failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The detached auth context could not be opened
    PopupBlocked,
    /// The auth context was closed before any completion message arrived
    ManualCancel,
    /// The identity provider reported an error
    RemoteError(String),
    /// No authorization URL could be obtained
    AuthorizationUnavailable,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::PopupBlocked => "popup_blocked",
            FailureReason::ManualCancel => "manual_cancel",
            FailureReason::RemoteError(_) => "remote_error",
            FailureReason::AuthorizationUnavailable => "authorization_unavailable",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::PopupBlocked => write!(f, "the sign-in window was blocked"),
            FailureReason::ManualCancel => write!(f, "the sign-in window was closed"),
            FailureReason::RemoteError(message) => write!(f, "{}", message),
            FailureReason::AuthorizationUnavailable => {
                write!(f, "the sign-in link could not be obtained")
            }
        }
    }
}

/// Per-platform handshake state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Cancelled,
    Failed(FailureReason),
}

impl HandshakeState {
    /// Connected, Cancelled and Failed are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::Connected | HandshakeState::Cancelled | HandshakeState::Failed(_)
        )
    }

    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeState::Idle => "idle",
            HandshakeState::Connecting => "connecting",
            HandshakeState::Connected => "connected",
            HandshakeState::Cancelled => "cancelled",
            HandshakeState::Failed(reason) => reason.as_str(),
        }
    }
}

/// A handshake that just left `Connecting`
pub(crate) struct Resolution {
    pub generation: u64,
    pub window: Option<Arc<dyn AuthWindow>>,
}

struct Entry {
    generation: u64,
    state: HandshakeState,
    window: Option<Arc<dyn AuthWindow>>,
}

/// Live handshakes keyed by platform
#[derive(Default)]
pub(crate) struct HandshakeRegistry {
    entries: HashMap<PlatformId, Entry>,
    next_generation: u64,
}

impl HandshakeRegistry {
    pub fn state(&self, platform: &PlatformId) -> HandshakeState {
        self.entries
            .get(platform)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// Start a handshake; `None` if one is already connecting
    pub fn begin(&mut self, platform: &PlatformId) -> Option<u64> {
        if self.state(platform) == HandshakeState::Connecting {
            return None;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            platform.clone(),
            Entry {
                generation,
                state: HandshakeState::Connecting,
                window: None,
            },
        );
        Some(generation)
    }

    /// Attach the opened auth window; false if that generation is no longer connecting
    pub fn attach_window(
        &mut self,
        platform: &PlatformId,
        generation: u64,
        window: Arc<dyn AuthWindow>,
    ) -> bool {
        match self.entries.get_mut(platform) {
            Some(entry)
                if entry.generation == generation && entry.state == HandshakeState::Connecting =>
            {
                entry.window = Some(window);
                true
            }
            _ => false,
        }
    }

    /// Whether `generation` is still the live, connecting handshake
    pub fn is_live(&self, platform: &PlatformId, generation: u64) -> bool {
        self.entries.get(platform).is_some_and(|e| {
            e.generation == generation && e.state == HandshakeState::Connecting
        })
    }

    /// Move a connecting handshake to a terminal state, exactly once
    ///
    /// `generation: None` targets whatever handshake is live (completion
    /// messages carry no generation). Returns `None` when nothing was resolved.
    pub fn resolve(
        &mut self,
        platform: &PlatformId,
        generation: Option<u64>,
        outcome: HandshakeState,
    ) -> Option<Resolution> {
        let entry = self.entries.get_mut(platform)?;
        if entry.state != HandshakeState::Connecting {
            return None;
        }
        if generation.is_some_and(|g| g != entry.generation) {
            return None;
        }

        entry.state = outcome;
        Some(Resolution {
            generation: entry.generation,
            window: entry.window.take(),
        })
    }

    /// Forget a platform's handshake so it reads as `Idle`
    pub fn reset(&mut self, platform: &PlatformId) {
        self.entries.remove(platform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb() -> PlatformId {
        PlatformId::new("facebook")
    }

    #[test]
    fn test_begin_refuses_while_connecting() {
        let mut registry = HandshakeRegistry::default();
        assert!(registry.begin(&fb()).is_some());
        assert!(registry.begin(&fb()).is_none());
        assert_eq!(registry.state(&fb()), HandshakeState::Connecting);
    }

    #[test]
    fn test_resolve_once() {
        let mut registry = HandshakeRegistry::default();
        let generation = registry.begin(&fb()).unwrap();

        assert!(registry
            .resolve(&fb(), None, HandshakeState::Connected)
            .is_some());
        assert!(registry
            .resolve(
                &fb(),
                Some(generation),
                HandshakeState::Failed(FailureReason::ManualCancel)
            )
            .is_none());
        assert_eq!(registry.state(&fb()), HandshakeState::Connected);
    }

    #[test]
    fn test_stale_generation_cannot_resolve_newer_handshake() {
        let mut registry = HandshakeRegistry::default();
        let first = registry.begin(&fb()).unwrap();
        registry.resolve(&fb(), Some(first), HandshakeState::Cancelled);

        let second = registry.begin(&fb()).unwrap();
        assert_ne!(first, second);
        assert!(registry
            .resolve(&fb(), Some(first), HandshakeState::Connected)
            .is_none());
        assert!(registry.is_live(&fb(), second));
        assert!(!registry.is_live(&fb(), first));
    }

    #[test]
    fn test_failure_labels() {
        let state = HandshakeState::Failed(FailureReason::RemoteError("denied".into()));
        assert_eq!(state.as_str(), "remote_error");
        assert!(state.is_terminal());
        assert!(!HandshakeState::Connecting.is_terminal());
        assert_eq!(HandshakeState::default(), HandshakeState::Idle);
    }
}
