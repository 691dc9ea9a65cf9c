// ===============================
// src/telemetry.rs
// ===============================
//
// Observability hook handed to the aggregator. Each event has a stable name
// and a flat list of structured fields; sinks decide what to do with them.
//
// - TracingTelemetry   : tracing record + Prometheus counters (production)
// - RecordingTelemetry : keeps events in memory (tests, diagnostics)
//
use std::sync::Mutex;

use tracing::{info, warn};

use crate::feed::FeedKind;
use crate::metrics::{
    ALERTS_REJECTED, FEED_FAILURES, LOADS, LOAD_LATENCY_MS, PUBLISHES, RELOAD_FAILURES,
    SNAPSHOT_ALERTS, SNAPSHOT_GENERATION, STALE_DISCARDED,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// A feed failed and its default was substituted.
    FeedDefaulted { feed: FeedKind, reason: String },
    /// A single alert record was dropped at the feed boundary.
    AlertRejected { feed: FeedKind, reason: String },
    LoadCompleted { generation: u64, alerts: usize, watchlist: usize, favorites: usize, elapsed_ms: u64 },
    LoadFailed { generation: u64, reason: String },
    ReloadServerFailed { generation: u64, reason: String },
    ReloadFallbackFailed { generation: u64, reason: String },
    SnapshotPublished { generation: u64, source: &'static str, alerts: usize },
    StaleResponseDiscarded { generation: u64, latest: u64 },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::FeedDefaulted { .. } => "feed_defaulted",
            TelemetryEvent::AlertRejected { .. } => "alert_rejected",
            TelemetryEvent::LoadCompleted { .. } => "load_completed",
            TelemetryEvent::LoadFailed { .. } => "load_failed",
            TelemetryEvent::ReloadServerFailed { .. } => "reload_server_failed",
            TelemetryEvent::ReloadFallbackFailed { .. } => "reload_fallback_failed",
            TelemetryEvent::SnapshotPublished { .. } => "snapshot_published",
            TelemetryEvent::StaleResponseDiscarded { .. } => "stale_response_discarded",
        }
    }

    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            TelemetryEvent::FeedDefaulted { feed, reason }
            | TelemetryEvent::AlertRejected { feed, reason } => {
                vec![("feed", feed.as_str().to_string()), ("reason", reason.clone())]
            }
            TelemetryEvent::LoadCompleted { generation, alerts, watchlist, favorites, elapsed_ms } => vec![
                ("generation", generation.to_string()),
                ("alerts", alerts.to_string()),
                ("watchlist", watchlist.to_string()),
                ("favorites", favorites.to_string()),
                ("elapsed_ms", elapsed_ms.to_string()),
            ],
            TelemetryEvent::LoadFailed { generation, reason }
            | TelemetryEvent::ReloadServerFailed { generation, reason }
            | TelemetryEvent::ReloadFallbackFailed { generation, reason } => {
                vec![("generation", generation.to_string()), ("reason", reason.clone())]
            }
            TelemetryEvent::SnapshotPublished { generation, source, alerts } => vec![
                ("generation", generation.to_string()),
                ("source", source.to_string()),
                ("alerts", alerts.to_string()),
            ],
            TelemetryEvent::StaleResponseDiscarded { generation, latest } => {
                vec![("generation", generation.to_string()), ("latest", latest.to_string())]
            }
        }
    }
}

pub trait Telemetry: Send + Sync {
    fn record(&self, event: &TelemetryEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        let name = event.name();
        match event {
            TelemetryEvent::FeedDefaulted { feed, reason } => {
                FEED_FAILURES.with_label_values(&[feed.as_str()]).inc();
                warn!(event = name, feed = feed.as_str(), %reason, "feed defaulted");
            }
            TelemetryEvent::AlertRejected { feed, reason } => {
                ALERTS_REJECTED.with_label_values(&[feed.as_str()]).inc();
                warn!(event = name, feed = feed.as_str(), %reason, "alert rejected");
            }
            TelemetryEvent::LoadCompleted { generation, alerts, watchlist, favorites, elapsed_ms } => {
                LOADS.with_label_values(&["ok"]).inc();
                LOAD_LATENCY_MS.observe(*elapsed_ms as f64);
                info!(event = name, generation, alerts, watchlist, favorites, elapsed_ms, "load completed");
            }
            TelemetryEvent::LoadFailed { generation, reason } => {
                LOADS.with_label_values(&["failed"]).inc();
                tracing::error!(event = name, generation, %reason, "load failed");
            }
            TelemetryEvent::ReloadServerFailed { generation, reason } => {
                RELOAD_FAILURES.with_label_values(&["server"]).inc();
                warn!(event = name, generation, %reason, "server reload failed, falling back to load");
            }
            TelemetryEvent::ReloadFallbackFailed { generation, reason } => {
                RELOAD_FAILURES.with_label_values(&["fallback"]).inc();
                tracing::error!(event = name, generation, %reason, "reload fallback failed, keeping previous snapshot");
            }
            TelemetryEvent::SnapshotPublished { generation, source, alerts } => {
                PUBLISHES.with_label_values(&[*source]).inc();
                SNAPSHOT_GENERATION.set(*generation as i64);
                SNAPSHOT_ALERTS.set(*alerts as i64);
                info!(event = name, generation, source, alerts, "snapshot published");
            }
            TelemetryEvent::StaleResponseDiscarded { generation, latest } => {
                STALE_DISCARDED.inc();
                warn!(event = name, generation, latest, "stale response discarded");
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(TelemetryEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl Telemetry for RecordingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
