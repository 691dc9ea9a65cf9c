// ===============================
// src/main.rs
// ===============================
/*
 cd alertdeck
 API_BASE_URL=http://127.0.0.1:8000 WATCH_SYMBOL=BTCUSDT RELOAD_ON_START=1 cargo run

 # while it runs
 curl -s localhost:9898/metrics | egrep '^(feed_failures_total|snapshot_publishes_total)'
*/
/*
=============================================================================
Project : alertdeck: signal classification & startup aggregation core
Module  : main.rs
Version : 0.5.0
License : MIT (see LICENSE)

Summary : Fetches the dashboard backend feeds concurrently, merges them into
          one bootstrap snapshot with per-feed fallbacks, classifies alerts
          into priority levels and statuses, filters recent related alerts,
          and exposes Prometheus metrics for the load/reload lifecycle.
=============================================================================
*/
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use alertdeck::classifier::{classify_all, PriorityLevel};
use alertdeck::config;
use alertdeck::feed::{FeedClient, HttpFeedSource};
use alertdeck::loader::{DataLoader, LoaderState, LoaderView};
use alertdeck::metrics;
use alertdeck::stats::{level_histogram, AlertStats};
use alertdeck::telemetry::TracingTelemetry;
use alertdeck::window::now_ms;
use alertdeck::{StartupAggregator, StartupSnapshot};

#[tokio::main]
async fn main() -> ExitCode {
    // ---- Load config ----
    let args = match config::load() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        api = %args.api_base_url,
        timeout_ms = args.request_timeout.as_millis() as u64,
        related_window_ms = args.related_window_ms,
        related_limit = args.related_limit,
        watch_symbol = ?args.watch_symbol,
        reload_on_start = args.reload_on_start,
        "startup config"
    );

    // ---- Metrics ----
    metrics::init();
    if args.metrics_port != 0 {
        let port = args.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(port).await {
                error!(?e, port, "metrics server stopped");
            }
        });
    }

    // ---- Feeds / aggregator / loader ----
    let source = match HttpFeedSource::new(args.api_base_url.clone(), args.request_timeout) {
        Ok(s) => s,
        Err(e) => {
            error!(?e, "http client init failed");
            return ExitCode::FAILURE;
        }
    };
    let client = FeedClient::new(source, args.endpoints.clone());
    let aggregator = Arc::new(StartupAggregator::new(client, Arc::new(TracingTelemetry)));
    let loader = DataLoader::new(Arc::clone(&aggregator));

    let state = loader.request().await;
    log_state(&state, loader.view());
    if let LoaderState::Error { .. } = state {
        return ExitCode::FAILURE;
    }

    // ---- Related recent alerts ----
    if let Some(symbol) = args.watch_symbol.as_deref() {
        let recent = aggregator
            .related_recent(symbol, args.related_limit, args.related_window_ms, now_ms())
            .await;
        info!(%symbol, count = recent.len(), "related recent alerts");
        for c in classify_all(&recent) {
            info!(
                id = c.alert.id(),
                alert_type = c.alert.alert_type(),
                score = c.score,
                level = c.level.as_str(),
                strength = ?c.strength,
                status = ?c.volume_status,
                "related alert"
            );
        }
    }

    // ---- Optional explicit reload ----
    if args.reload_on_start {
        let state = loader.reload().await;
        log_state(&state, loader.view());
    }

    ExitCode::SUCCESS
}

fn log_state(state: &LoaderState, view: LoaderView) {
    match state {
        LoaderState::Ready(snapshot) => log_summary(snapshot, view),
        LoaderState::Error { reason, snapshot } => {
            error!(%reason, retained = snapshot.is_some(), view = ?view, "startup data unavailable");
        }
        other => warn!(state = other.name(), "loader did not settle"),
    }
}

fn log_summary(snapshot: &StartupSnapshot, view: LoaderView) {
    if view == LoaderView::NoData {
        info!("startup snapshot is empty: no alerts, watchlist or favorites");
        return;
    }

    let stats = AlertStats::compute(&snapshot.alerts);
    let levels = level_histogram(&snapshot.alerts);
    let level = |l: PriorityLevel| levels.get(&l).copied().unwrap_or(0);

    info!(
        alerts = stats.total_alerts,
        volume = stats.volume_alerts,
        consecutive = stats.consecutive_alerts,
        priority = stats.priority_alerts,
        watchlist = snapshot.watchlist.len(),
        favorites = snapshot.favorites.len(),
        settings = snapshot.settings.len(),
        "startup snapshot"
    );
    info!(
        critical = level(PriorityLevel::Critical),
        high = level(PriorityLevel::High),
        medium = level(PriorityLevel::Medium),
        low = level(PriorityLevel::Low),
        true_signals = stats.true_signals,
        false_signals = stats.false_signals,
        accuracy_pct = stats.accuracy_percentage,
        avg_volume_ratio = ?stats.avg_volume_ratio,
        with_imbalance = stats.alerts_with_imbalance,
        "alert summary"
    );
}
