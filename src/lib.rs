// ===============================
// src/lib.rs
// ===============================
pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod feed;
pub mod loader;
pub mod metrics;
pub mod stats;
pub mod telemetry;
pub mod window;

pub use aggregator::{AggregateError, LoadOutcome, ReloadOutcome, ReloadSource, StartupAggregator};
pub use classifier::{
    classify_all, consecutive_strength, priority_level, priority_score, volume_status,
    ClassifiedAlert, ConsecutiveStrength, PriorityLevel, VolumeStatus,
};
pub use domain::{Alert, AlertKind, StartupSnapshot};
pub use feed::{FeedClient, FeedError, FeedResponse, FeedSource, HttpFeedSource};
pub use loader::{DataLoader, LoaderState, LoaderView};
pub use telemetry::{RecordingTelemetry, Telemetry, TelemetryEvent, TracingTelemetry};
pub use window::{filter_recent, Timestamped};
