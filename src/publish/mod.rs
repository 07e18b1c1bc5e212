//! Publication Pipeline
//!
//! Immediate fan-out publishing, scheduling, plan-tier quotas and
//! post-record maintenance.

mod pipeline;
mod quota;
mod report;

pub use pipeline::{parse_schedule_time, PublicationPipeline, PublicationPipelineParts};
pub use quota::{QuotaGate, UsageLedger};
pub use report::{PlatformFailure, PublishReport};
