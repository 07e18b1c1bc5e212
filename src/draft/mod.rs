//! Draft Orchestrator
//!
//! Holds the in-progress composition: per-platform content and tone, the
//! selected platforms and which one the editor shows, and the shared image.
//!
//! Content and tone are keyed independently of the selection, so a platform
//! can be deselected and reselected without losing what was written for it.
//! The active platform is always a member of the selection when the selection
//! is non-empty; the assistant merge may focus an unselected platform only
//! while nothing is selected, and the next toggle normalises it back.

use crate::model::{Attachment, DraftSnapshot};
use crate::platform::{PlatformCatalog, PlatformId, ToneId};
use crate::{CrosspostError, Result};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct DraftState {
    content: BTreeMap<PlatformId, String>,
    tone: BTreeMap<PlatformId, ToneId>,
    /// Selection order; the last element is the most recently selected
    selected: Vec<PlatformId>,
    active: Option<PlatformId>,
    attachment: Option<Attachment>,
}

impl DraftState {
    fn is_selected(&self, platform: &PlatformId) -> bool {
        self.selected.contains(platform)
    }

    fn normalize_active(&mut self) {
        if self.selected.is_empty() {
            self.active = None;
        } else if !self
            .active
            .as_ref()
            .is_some_and(|a| self.selected.contains(a))
        {
            self.active = self.selected.last().cloned();
        }
    }

    fn has_any_content(&self) -> bool {
        self.content.values().any(|c| !c.trim().is_empty())
    }
}

/// Shared handle to the draft being composed
#[derive(Debug, Clone)]
pub struct DraftOrchestrator {
    state: Arc<RwLock<DraftState>>,
    catalog: Arc<PlatformCatalog>,
}

impl Default for DraftOrchestrator {
    fn default() -> Self {
        Self::new(PlatformCatalog::builtin())
    }
}

impl DraftOrchestrator {
    /// Empty draft using `catalog` for default tones
    pub fn new(catalog: PlatformCatalog) -> Self {
        Self {
            state: Arc::new(RwLock::new(DraftState::default())),
            catalog: Arc::new(catalog),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DraftState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DraftState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn catalog(&self) -> &PlatformCatalog {
        &self.catalog
    }

    /// Select or deselect a platform
    ///
    /// Selecting assigns the default tone the first time and makes the platform
    /// active. Deselecting the active platform moves focus to the most recently
    /// selected remaining platform, or clears it.
    pub fn toggle_platform(&self, platform: &PlatformId) {
        let mut state = self.write();

        if state.is_selected(platform) {
            state.selected.retain(|p| p != platform);
            debug!(platform = %platform, "Platform deselected");
        } else {
            state.selected.push(platform.clone());
            let tone = self.catalog.default_tone(platform);
            state.tone.entry(platform.clone()).or_insert(tone);
            state.active = Some(platform.clone());
            debug!(platform = %platform, "Platform selected");
        }

        state.normalize_active();
    }

    /// Replace a platform's content; the platform need not be selected
    pub fn set_content(&self, platform: &PlatformId, text: impl Into<String>) {
        self.write().content.insert(platform.clone(), text.into());
    }

    pub fn content_for(&self, platform: &PlatformId) -> Option<String> {
        self.read().content.get(platform).cloned()
    }

    pub fn set_tone(&self, platform: &PlatformId, tone: ToneId) {
        self.write().tone.insert(platform.clone(), tone);
    }

    pub fn tone_for(&self, platform: &PlatformId) -> Option<ToneId> {
        self.read().tone.get(platform).cloned()
    }

    /// Show a selected platform in the editor
    pub fn set_active_platform(&self, platform: &PlatformId) -> Result<()> {
        let mut state = self.write();
        if !state.is_selected(platform) {
            return Err(CrosspostError::Validation(format!(
                "Platform {} is not selected",
                platform
            )));
        }
        state.active = Some(platform.clone());
        Ok(())
    }

    pub fn active_platform(&self) -> Option<PlatformId> {
        self.read().active.clone()
    }

    pub fn selected_platforms(&self) -> Vec<PlatformId> {
        self.read().selected.clone()
    }

    pub fn set_attachment(&self, attachment: Attachment) {
        self.write().attachment = Some(attachment);
    }

    pub fn clear_attachment(&self) {
        self.write().attachment = None;
    }

    pub fn attachment(&self) -> Option<Attachment> {
        self.read().attachment.clone()
    }

    /// Any platform has non-blank content
    pub fn has_any_content(&self) -> bool {
        self.read().has_any_content()
    }

    /// Content or an attachment would be lost by navigating away
    pub fn is_dirty(&self) -> bool {
        let state = self.read();
        state.has_any_content() || state.attachment.is_some()
    }

    /// Atomically replace the whole draft
    pub fn load_from(&self, snapshot: DraftSnapshot) {
        let mut selected: Vec<PlatformId> = Vec::with_capacity(snapshot.selected_platforms.len());
        for platform in snapshot.selected_platforms {
            if !selected.contains(&platform) {
                selected.push(platform);
            }
        }

        let mut tone = snapshot.platform_tone;
        for platform in &selected {
            tone.entry(platform.clone())
                .or_insert_with(|| self.catalog.default_tone(platform));
        }

        let mut state = self.write();
        *state = DraftState {
            content: snapshot.platform_content,
            tone,
            active: selected.first().cloned(),
            selected,
            attachment: snapshot.attachment,
        };
        debug!(selected = state.selected.len(), "Draft loaded");
    }

    /// Reset to an empty draft
    pub fn clear(&self) {
        *self.write() = DraftState::default();
    }

    /// Frozen copy of the current draft
    pub fn snapshot(&self) -> DraftSnapshot {
        let state = self.read();
        DraftSnapshot {
            platform_content: state.content.clone(),
            platform_tone: state.tone.clone(),
            selected_platforms: state.selected.clone(),
            attachment: state.attachment.clone(),
        }
    }

    /// Merge per-platform suggestions without touching the selection
    ///
    /// Missing tones get the platform default. With no active platform the
    /// first suggested platform becomes active.
    pub fn merge_suggestions(&self, suggestions: &IndexMap<PlatformId, String>) {
        let mut state = self.write();
        for (platform, text) in suggestions {
            state.content.insert(platform.clone(), text.clone());
            let tone = self.catalog.default_tone(platform);
            state.tone.entry(platform.clone()).or_insert(tone);
        }
        if state.active.is_none() {
            state.active = suggestions.keys().next().cloned();
        }
    }

    /// Write one suggestion to the sole selected platform, else the active one
    ///
    /// Returns the platform written, or `None` when there was nowhere to put it.
    pub fn apply_suggestion(&self, text: &str) -> Option<PlatformId> {
        let mut state = self.write();
        let target = match state.selected.as_slice() {
            [only] => Some(only.clone()),
            _ => state.active.clone(),
        }?;
        state.content.insert(target.clone(), text.to_string());
        Some(target)
    }

    /// Selected platforms with non-blank content, in selection order
    pub fn publishable(&self) -> Vec<(PlatformId, String)> {
        self.snapshot().publishable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn p(id: &str) -> PlatformId {
        PlatformId::new(id)
    }

    fn assert_active_invariant(draft: &DraftOrchestrator) {
        let selected = draft.selected_platforms();
        match draft.active_platform() {
            None => assert!(selected.is_empty()),
            Some(active) => assert!(selected.contains(&active)),
        }
    }

    #[test]
    fn test_toggle_assigns_default_tone_once() {
        let draft = DraftOrchestrator::default();
        draft.toggle_platform(&p("linkedin"));
        assert_eq!(draft.tone_for(&p("linkedin")), Some(ToneId::new("professional")));
        assert_eq!(draft.active_platform(), Some(p("linkedin")));

        draft.set_tone(&p("linkedin"), ToneId::new("witty"));
        draft.toggle_platform(&p("linkedin"));
        draft.toggle_platform(&p("linkedin"));
        assert_eq!(draft.tone_for(&p("linkedin")), Some(ToneId::new("witty")));
    }

    #[test]
    fn test_deselect_active_falls_back_to_most_recent() {
        let draft = DraftOrchestrator::default();
        draft.toggle_platform(&p("linkedin"));
        draft.toggle_platform(&p("twitter"));
        draft.toggle_platform(&p("facebook"));
        draft.set_active_platform(&p("facebook")).unwrap();

        draft.toggle_platform(&p("facebook"));
        assert_eq!(draft.active_platform(), Some(p("twitter")));

        draft.toggle_platform(&p("linkedin"));
        assert_eq!(draft.active_platform(), Some(p("twitter")));

        draft.toggle_platform(&p("twitter"));
        assert_eq!(draft.active_platform(), None);
    }

    #[test]
    fn test_random_toggle_sequences_keep_active_in_selection() {
        let platforms = [p("linkedin"), p("twitter"), p("facebook"), p("threads")];
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let draft = DraftOrchestrator::default();
            for _ in 0..40 {
                let platform = &platforms[rng.gen_range(0..platforms.len())];
                draft.toggle_platform(platform);
                assert_active_invariant(&draft);
            }
        }
    }

    #[test]
    fn test_content_survives_deselect_reselect() {
        let draft = DraftOrchestrator::default();
        draft.toggle_platform(&p("twitter"));
        draft.set_content(&p("twitter"), "Launch day!");

        draft.toggle_platform(&p("twitter"));
        assert!(draft.publishable().is_empty());
        draft.toggle_platform(&p("twitter"));

        assert_eq!(draft.content_for(&p("twitter")).as_deref(), Some("Launch day!"));
    }

    #[test]
    fn test_set_active_requires_selection() {
        let draft = DraftOrchestrator::default();
        assert!(draft.set_active_platform(&p("linkedin")).is_err());
    }

    #[test]
    fn test_merge_with_empty_selection_focuses_first_key() {
        let draft = DraftOrchestrator::default();
        let mut suggestions = IndexMap::new();
        suggestions.insert(p("linkedin"), "A".to_string());
        suggestions.insert(p("twitter"), "B".to_string());

        draft.merge_suggestions(&suggestions);

        assert_eq!(draft.active_platform(), Some(p("linkedin")));
        assert!(draft.selected_platforms().is_empty());
        assert_eq!(draft.content_for(&p("twitter")).as_deref(), Some("B"));
        assert_eq!(draft.tone_for(&p("twitter")), Some(ToneId::new("casual")));

        // The next toggle brings focus back into the selection
        draft.toggle_platform(&p("twitter"));
        draft.toggle_platform(&p("twitter"));
        assert_eq!(draft.active_platform(), None);
    }

    #[test]
    fn test_apply_suggestion_targets() {
        let draft = DraftOrchestrator::default();
        assert_eq!(draft.apply_suggestion("orphan"), None);

        draft.toggle_platform(&p("linkedin"));
        assert_eq!(draft.apply_suggestion("one"), Some(p("linkedin")));

        draft.toggle_platform(&p("twitter"));
        draft.set_active_platform(&p("linkedin")).unwrap();
        assert_eq!(draft.apply_suggestion("two"), Some(p("linkedin")));
        assert_eq!(draft.content_for(&p("twitter")), None);
    }

    #[test]
    fn test_dirty_tracks_content_and_attachment() {
        let draft = DraftOrchestrator::default();
        assert!(!draft.is_dirty());

        draft.set_content(&p("linkedin"), "   ");
        assert!(!draft.is_dirty());

        draft.set_attachment(Attachment::from_bytes(b"img", "image/png"));
        assert!(draft.is_dirty());
        assert!(!draft.has_any_content());

        draft.clear();
        assert!(!draft.is_dirty());
        assert_eq!(draft.snapshot(), DraftSnapshot::default());
    }

    #[test]
    fn test_load_from_replaces_everything() {
        let draft = DraftOrchestrator::default();
        draft.toggle_platform(&p("facebook"));
        draft.set_content(&p("facebook"), "old");

        let snapshot = DraftSnapshot::seeded(&[p("twitter"), p("linkedin"), p("twitter")], "new");
        draft.load_from(snapshot);

        assert_eq!(draft.selected_platforms(), vec![p("twitter"), p("linkedin")]);
        assert_eq!(draft.active_platform(), Some(p("twitter")));
        assert_eq!(draft.content_for(&p("facebook")), None);
        assert_eq!(draft.tone_for(&p("linkedin")), Some(ToneId::new("professional")));
    }

    #[test]
    fn test_publishable_skips_blank_and_keeps_order() {
        let draft = DraftOrchestrator::default();
        for id in ["twitter", "linkedin", "facebook"] {
            draft.toggle_platform(&p(id));
        }
        draft.set_content(&p("twitter"), "t");
        draft.set_content(&p("linkedin"), " ");
        draft.set_content(&p("facebook"), "f");

        let ids: Vec<_> = draft.publishable().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![p("twitter"), p("facebook")]);
    }
}
