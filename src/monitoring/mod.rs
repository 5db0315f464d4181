//! Run Monitoring
//!
//! - [`ExecutionTimeline`]: step start/finish events and per-step timings

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, StepTiming, TimelineEvent};
