//! Shared types for Pulse components.
//!
//! Everything that crosses a wire (HTTP, live channel, webhooks) or is
//! shared between the aggregation and chat paths lives here.

pub mod error;
pub mod event;
pub mod intent;
pub mod rpc;
pub mod snapshot;
pub mod status;
pub mod thresholds;

pub use error::{PulseError, PulseResult};
pub use event::{AffectedEntities, Event, EventDetail, EventKind, Severity};
pub use intent::{Intent, IntentKind};
pub use snapshot::{
    AnalysisNote, ComponentReport, DetailedAnalysis, Domain, HealthSnapshot, Insight, InsightKind,
    ItemDetail, ItemRecord, SnapshotSource,
};
pub use rpc::{ChatReply, LiveMessage};
pub use status::{OverallHealth, Status};
pub use thresholds::{MetricKind, Threshold, ThresholdSet};

/// Version string, single source of truth.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
