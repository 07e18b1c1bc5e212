//! Unsaved-Content Guard
//!
//! Intercepts navigation away from the composer while the draft holds
//! content or an attachment. The guard only remembers where the user wanted
//! to go; it never saves on its own.

use crate::draft::DraftOrchestrator;
use crate::events::{ComposerEvent, EventBus};
use crate::model::SavedDraft;
use crate::platform::UserId;
use crate::store::{DocumentStore, WriteMode};
use crate::{CrosspostError, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// What the host should do with a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Navigate now
    Proceed(String),
    /// Show the save/discard prompt; the destination is held until resolved
    Prompt { destination: String },
}

/// Guards navigation while the draft is dirty
#[derive(Clone)]
pub struct UnsavedContentGuard {
    user: UserId,
    composer_route: Arc<str>,
    draft: DraftOrchestrator,
    store: Arc<dyn DocumentStore>,
    bus: EventBus,
    pending: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for UnsavedContentGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsavedContentGuard")
            .field("user", &self.user)
            .field("composer_route", &self.composer_route)
            .field("pending", &self.pending_destination())
            .finish_non_exhaustive()
    }
}

impl UnsavedContentGuard {
    pub fn new(
        user: UserId,
        composer_route: impl Into<String>,
        draft: DraftOrchestrator,
        store: Arc<dyn DocumentStore>,
        bus: EventBus,
    ) -> Self {
        Self {
            user,
            composer_route: Arc::from(composer_route.into()),
            draft,
            store,
            bus,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_dirty(&self) -> bool {
        self.draft.is_dirty()
    }

    /// Destination waiting on the prompt, if any
    pub fn pending_destination(&self) -> Option<String> {
        self.pending().clone()
    }

    pub fn request_navigation(&self, destination: &str) -> NavigationDecision {
        if destination == &*self.composer_route || !self.draft.is_dirty() {
            return NavigationDecision::Proceed(destination.to_string());
        }

        debug!(destination, "Navigation deferred; draft has unsaved content");
        *self.pending() = Some(destination.to_string());
        NavigationDecision::Prompt {
            destination: destination.to_string(),
        }
    }

    fn take_pending(&self) -> Result<String> {
        self.pending()
            .take()
            .ok_or_else(|| CrosspostError::Validation("No navigation is pending".to_string()))
    }

    /// Save the draft, then release the pending destination
    ///
    /// A failed save keeps the prompt open and the draft untouched.
    pub async fn save_and_proceed(&self) -> Result<String> {
        if self.pending_destination().is_none() {
            return Err(CrosspostError::Validation(
                "No navigation is pending".to_string(),
            ));
        }

        let saved = SavedDraft::new(self.draft.snapshot());
        if let Err(e) = self
            .store
            .save_draft(&self.user, &saved, WriteMode::Critical)
            .await
        {
            warn!(error = %e, "Could not save draft");
            self.bus.error("Couldn't save your draft. Please try again.");
            return Err(e);
        }

        info!(draft = %saved.id, "Draft saved before navigation");
        self.bus.success("Draft saved");
        self.take_pending()
    }

    /// Drop the draft, then release the pending destination
    pub fn discard_and_proceed(&self) -> Result<String> {
        let destination = self.take_pending()?;
        self.draft.clear();
        self.bus.emit(ComposerEvent::DraftCleared);
        Ok(destination)
    }

    /// Close the prompt and stay in the composer
    pub fn cancel(&self) -> Option<String> {
        self.pending().take()
    }
}
