//! Platform checklist shown before generating a post from a trending topic

use crate::platform::PlatformId;

/// Connected platforms offered for a topic, all checked initially
///
/// Dropping the selection is how the user cancels; nothing is mutated until
/// [`AssistantBridge::generate_for_topic`](super::AssistantBridge::generate_for_topic).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSelection {
    topic: String,
    options: Vec<(PlatformId, bool)>,
}

impl PlatformSelection {
    pub fn new(topic: impl Into<String>, connected: Vec<PlatformId>) -> Self {
        Self {
            topic: topic.into(),
            options: connected.into_iter().map(|p| (p, true)).collect(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Every offered platform with its checked flag
    pub fn options(&self) -> &[(PlatformId, bool)] {
        &self.options
    }

    /// Flip a platform's checkbox; unknown platforms are ignored
    pub fn toggle(&mut self, platform: &PlatformId) {
        if let Some((_, checked)) = self.options.iter_mut().find(|(p, _)| p == platform) {
            *checked = !*checked;
        }
    }

    pub fn checked(&self) -> Vec<PlatformId> {
        self.options
            .iter()
            .filter(|(_, checked)| *checked)
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Generation needs at least one checked platform
    pub fn can_confirm(&self) -> bool {
        self.options.iter().any(|(_, checked)| *checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_connected_start_checked() {
        let selection = PlatformSelection::new(
            "AI regulation",
            vec![PlatformId::new("linkedin"), PlatformId::new("twitter")],
        );
        assert_eq!(selection.checked().len(), 2);
        assert!(selection.can_confirm());
    }

    #[test]
    fn test_unchecking_everything_blocks_confirm() {
        let mut selection = PlatformSelection::new("topic", vec![PlatformId::new("linkedin")]);
        selection.toggle(&PlatformId::new("linkedin"));
        selection.toggle(&PlatformId::new("pinterest"));
        assert!(selection.checked().is_empty());
        assert!(!selection.can_confirm());
    }
}
