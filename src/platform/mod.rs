//! Platform identifiers and catalog
//!
//! Newtype ids used across the engine, plus the table of known platforms with
//! their display names, default tones and publish-response conventions.

mod catalog;
mod ids;

pub use catalog::{PlatformCatalog, PlatformInfo, FALLBACK_TONE};
pub use ids::{CorrelationId, DraftId, PlatformId, PostId, ToneId, UserId};
