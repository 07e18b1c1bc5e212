//! Type-safe ID wrappers

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new id from a string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// One external publishing destination (e.g. "linkedin", "twitter")
    ///
    /// Ids are normalised to lowercase so store keys and wire payloads agree.
    PlatformId
);

string_id!(
    /// A named style parameter applied when refining a platform's content
    ToneId
);

string_id!(
    /// The user owning drafts, posts, connections and usage counters
    UserId
);

string_id!(
    /// Storage key of a saved draft
    DraftId
);

string_id!(
    /// Storage key of a scheduled or posted record
    PostId
);

impl PlatformId {
    /// Create a platform id, normalising case and surrounding whitespace
    pub fn normalized(id: &str) -> Self {
        Self(id.trim().to_lowercase())
    }
}

impl DraftId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl PostId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Opaque identifier attached to outgoing requests for cross-service tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    /// Generate a new correlation id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_id_normalized() {
        assert_eq!(PlatformId::normalized(" LinkedIn "), PlatformId::new("linkedin"));
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&PlatformId::new("twitter")).unwrap();
        assert_eq!(json, "\"twitter\"");

        let tone: ToneId = serde_json::from_str("\"casual\"").unwrap();
        assert_eq!(tone.as_str(), "casual");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(PostId::generate(), PostId::generate());
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }
}
