// ===============================
// src/aggregator.rs
// ===============================
//
// Startup aggregation:
// - load   : four feeds fetched concurrently (join, not fail-fast), each
//            replaced by its default on failure, merged into one snapshot
// - reload : server-side recomputation first, full `load` as fallback
//
// Publication goes through a watch channel (one writer, many readers). Every
// load/reload takes a generation; a result is published only while its
// generation is still the latest issued, so stale in-flight responses from
// overlapping requests are dropped instead of overwriting newer state.
//
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join4;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::{Alert, AlertDecodeError, StartupSnapshot};
use crate::feed::{FeedClient, FeedError, FeedKind, FeedSource};
use crate::telemetry::{Telemetry, TelemetryEvent};
use crate::window::filter_recent;

#[derive(Debug, Error)]
pub enum AggregateError {
    /// None of the four feeds produced any response.
    #[error("all startup feeds unreachable (alerts: {alerts}; watchlist: {watchlist}; favorites: {favorites}; settings: {settings})")]
    AllFeedsUnreachable {
        alerts: FeedError,
        watchlist: FeedError,
        favorites: FeedError,
        settings: FeedError,
    },
}

/// Where the snapshot returned by `reload` came from.
#[derive(Debug)]
pub enum ReloadSource {
    Server,
    Fallback,
    /// Fallback load failed; the previously published snapshot is returned.
    Retained(AggregateError),
}

impl ReloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadSource::Server => "server",
            ReloadSource::Fallback => "fallback",
            ReloadSource::Retained(_) => "retained",
        }
    }
}

#[derive(Debug)]
pub struct ReloadOutcome {
    pub snapshot: Arc<StartupSnapshot>,
    pub source: ReloadSource,
    pub generation: u64,
    /// False when a newer request was issued before this one resolved,
    /// or when the previous snapshot was retained.
    pub published: bool,
}

/// Result of a successful `load`, tagged with its generation.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub snapshot: Arc<StartupSnapshot>,
    pub generation: u64,
    /// False when a newer request was issued before this one resolved.
    pub published: bool,
}

/// Snapshot as seen by readers, tagged with the generation that produced it.
#[derive(Debug, Clone, Default)]
pub struct Published {
    pub generation: u64,
    pub snapshot: Option<Arc<StartupSnapshot>>,
}

pub struct StartupAggregator<S> {
    client: FeedClient<S>,
    telemetry: Arc<dyn Telemetry>,
    issued: AtomicU64,
    current: watch::Sender<Published>,
}

impl<S: FeedSource> StartupAggregator<S> {
    pub fn new(client: FeedClient<S>, telemetry: Arc<dyn Telemetry>) -> Self {
        let (current, _rx) = watch::channel(Published::default());
        Self { client, telemetry, issued: AtomicU64::new(0), current }
    }

    pub fn client(&self) -> &FeedClient<S> {
        &self.client
    }

    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.current.subscribe()
    }

    /// Latest published snapshot, if any.
    pub fn current(&self) -> Option<Arc<StartupSnapshot>> {
        self.current.borrow().snapshot.clone()
    }

    pub fn latest_generation(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    fn next_generation(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, event: TelemetryEvent) {
        self.telemetry.record(&event);
    }

    fn report_rejected(&self, feed: FeedKind, rejected: Vec<AlertDecodeError>) {
        for e in rejected {
            self.emit(TelemetryEvent::AlertRejected { feed, reason: e.to_string() });
        }
    }

    /// Publish unless a newer request has been issued meanwhile.
    fn publish(&self, generation: u64, snapshot: &Arc<StartupSnapshot>, source: &'static str) -> bool {
        let mut latest = generation;
        let applied = self.current.send_if_modified(|cur| {
            latest = self.issued.load(Ordering::SeqCst);
            if generation != latest || generation <= cur.generation {
                return false;
            }
            *cur = Published { generation, snapshot: Some(Arc::clone(snapshot)) };
            true
        });
        if applied {
            self.emit(TelemetryEvent::SnapshotPublished { generation, source, alerts: snapshot.alerts.len() });
        } else {
            self.emit(TelemetryEvent::StaleResponseDiscarded { generation, latest });
        }
        applied
    }

    /// Fetch and merge the four feeds. Per-feed failures are absorbed.
    async fn gather(&self, generation: u64) -> Result<StartupSnapshot, AggregateError> {
        let started = Instant::now();
        let (alerts, watchlist, favorites, settings) = join4(
            self.client.all_alerts(),
            self.client.watchlist(),
            self.client.favorites(),
            self.client.settings(),
        )
        .await;

        let (alerts, watchlist, favorites, settings) = match (alerts, watchlist, favorites, settings) {
            (Err(a), Err(w), Err(f), Err(s))
                if a.is_transport() && w.is_transport() && f.is_transport() && s.is_transport() =>
            {
                return Err(AggregateError::AllFeedsUnreachable {
                    alerts: a,
                    watchlist: w,
                    favorites: f,
                    settings: s,
                });
            }
            settled => settled,
        };

        let alerts = match alerts {
            Ok(mut buckets) => {
                let rejected = std::mem::take(&mut buckets.rejected);
                self.report_rejected(FeedKind::AllAlerts, rejected);
                buckets.into_ordered()
            }
            Err(e) => self.defaulted(FeedKind::AllAlerts, e),
        };
        let watchlist = watchlist.unwrap_or_else(|e| self.defaulted(FeedKind::Watchlist, e));
        let favorites = favorites.unwrap_or_else(|e| self.defaulted(FeedKind::Favorites, e));
        let settings = settings.unwrap_or_else(|e| self.defaulted(FeedKind::Settings, e));

        let snapshot = StartupSnapshot {
            alerts,
            watchlist,
            favorites,
            settings,
            ..Default::default()
        };
        self.emit(TelemetryEvent::LoadCompleted {
            generation,
            alerts: snapshot.alerts.len(),
            watchlist: snapshot.watchlist.len(),
            favorites: snapshot.favorites.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        Ok(snapshot)
    }

    fn defaulted<T: Default>(&self, feed: FeedKind, err: FeedError) -> T {
        self.emit(TelemetryEvent::FeedDefaulted { feed, reason: err.to_string() });
        T::default()
    }

    /// Fetch all feeds and publish the merged snapshot.
    ///
    /// Fails only when no feed produced any response at all.
    pub async fn load(&self) -> Result<Arc<StartupSnapshot>, AggregateError> {
        self.load_tracked().await.map(|o| o.snapshot)
    }

    /// `load`, also reporting whether the result was the one published.
    pub async fn load_tracked(&self) -> Result<LoadOutcome, AggregateError> {
        let generation = self.next_generation();
        match self.gather(generation).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let published = self.publish(generation, &snapshot, "load");
                Ok(LoadOutcome { snapshot, generation, published })
            }
            Err(e) => {
                self.emit(TelemetryEvent::LoadFailed { generation, reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Server-side reload, falling back to `load` semantics. Never fails:
    /// when the fallback itself fails the previous snapshot is kept and
    /// returned (an empty one if nothing was ever published).
    pub async fn reload(&self) -> ReloadOutcome {
        let generation = self.next_generation();

        match self.client.reload_snapshot().await {
            Ok(server) => {
                self.report_rejected(FeedKind::Reload, server.rejected);
                let snapshot = Arc::new(server.snapshot);
                let published = self.publish(generation, &snapshot, "server");
                return ReloadOutcome { snapshot, source: ReloadSource::Server, generation, published };
            }
            Err(e) => {
                self.emit(TelemetryEvent::ReloadServerFailed { generation, reason: e.to_string() });
            }
        }

        match self.gather(generation).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let published = self.publish(generation, &snapshot, "fallback");
                ReloadOutcome { snapshot, source: ReloadSource::Fallback, generation, published }
            }
            Err(e) => {
                self.emit(TelemetryEvent::ReloadFallbackFailed { generation, reason: e.to_string() });
                let snapshot = self.current().unwrap_or_default();
                ReloadOutcome { snapshot, source: ReloadSource::Retained(e), generation, published: false }
            }
        }
    }

    /// Related alerts for `symbol` still inside the window. Fetch failures
    /// yield an empty list.
    pub async fn related_recent(&self, symbol: &str, limit: u32, window_ms: i64, now_ms: i64) -> Vec<Alert> {
        match self.client.related_alerts(symbol, limit, window_hours(window_ms)).await {
            Ok(decoded) => {
                self.report_rejected(FeedKind::Related, decoded.rejected);
                filter_recent(&decoded.alerts, window_ms, now_ms)
            }
            Err(e) => {
                self.emit(TelemetryEvent::FeedDefaulted { feed: FeedKind::Related, reason: e.to_string() });
                Vec::new()
            }
        }
    }
}

const HOUR_MS: i64 = 3_600_000;

/// Server-side lookback covering the whole window, at least one hour.
fn window_hours(window_ms: i64) -> u32 {
    let hours = window_ms.max(0).saturating_add(HOUR_MS - 1) / HOUR_MS;
    hours.clamp(1, u32::MAX as i64) as u32
}
