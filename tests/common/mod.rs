// Shared fixtures for the integration tests: an in-memory backend that
// speaks the FeedSource seam, plus alert record builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use alertdeck::config::Endpoints;
use alertdeck::feed::{FeedClient, FeedError, FeedResponse, FeedSource};
use alertdeck::{RecordingTelemetry, StartupAggregator};

#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Text(u16, &'static str),
    /// No response at all (connection refused, timeout).
    Down,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub delay: Duration,
    pub reply: Reply,
}

impl From<Reply> for Step {
    fn from(reply: Reply) -> Self {
        Step { delay: Duration::ZERO, reply }
    }
}

/// Each path replays its script in order; the last step repeats forever.
#[derive(Default)]
pub struct FakeBackend {
    routes: Mutex<HashMap<String, Vec<Step>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeBackend {
    pub fn set(&self, path: &str, reply: Reply) {
        self.script(path, vec![reply.into()]);
    }

    pub fn script(&self, path: &str, steps: Vec<Step>) {
        self.routes.lock().unwrap().insert(path.to_string(), steps);
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    async fn serve(&self, path: &str) -> Result<FeedResponse, FeedError> {
        let step = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(path.to_string()).or_insert(0);
            let idx = *n;
            *n += 1;
            let routes = self.routes.lock().unwrap();
            routes
                .get(path)
                .and_then(|steps| steps.get(idx.min(steps.len().saturating_sub(1))).cloned())
        };
        let Some(step) = step else {
            return Err(FeedError::Transport(format!("no route for {path}")));
        };
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.reply {
            Reply::Json(status, body) => Ok(FeedResponse { status, body: body.to_string() }),
            Reply::Text(status, body) => Ok(FeedResponse { status, body: body.to_string() }),
            Reply::Down => Err(FeedError::Transport(format!("connection refused: {path}"))),
        }
    }
}

#[async_trait]
impl FeedSource for FakeBackend {
    async fn get(&self, path: &str, _query: &[(&str, String)]) -> Result<FeedResponse, FeedError> {
        self.serve(path).await
    }

    async fn post(&self, path: &str) -> Result<FeedResponse, FeedError> {
        self.serve(path).await
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub aggregator: Arc<StartupAggregator<Arc<FakeBackend>>>,
    pub endpoints: Endpoints,
}

impl Harness {
    pub fn new() -> Self {
        let backend = Arc::new(FakeBackend::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let endpoints = Endpoints::default();
        let client = FeedClient::new(Arc::clone(&backend), endpoints.clone());
        let aggregator = Arc::new(StartupAggregator::new(client, telemetry.clone()));
        Harness { backend, telemetry, aggregator, endpoints }
    }

    /// All four startup feeds healthy.
    pub fn healthy() -> Self {
        let h = Harness::new();
        h.backend.set(&h.endpoints.all_alerts, Reply::Json(200, all_alerts_body()));
        h.backend.set(&h.endpoints.watchlist, Reply::Json(200, watchlist_body(&["BTCUSDT", "ETHUSDT"])));
        h.backend.set(
            &h.endpoints.favorites,
            Reply::Json(200, json!({"favorites": [{"id": 1, "symbol": "BTCUSDT", "color": "#f59e0b"}]})),
        );
        h.backend.set(
            &h.endpoints.settings,
            Reply::Json(200, json!({"volume_multiplier": 2.5, "consecutive_long_count": 5})),
        );
        h
    }

    /// Concrete per-symbol alerts route.
    pub fn related_path(&self, symbol: &str) -> String {
        self.endpoints.related.replace("{symbol}", symbol)
    }

    pub fn all_down(&self) {
        for path in [
            &self.endpoints.all_alerts,
            &self.endpoints.watchlist,
            &self.endpoints.favorites,
            &self.endpoints.settings,
            &self.endpoints.reload,
        ] {
            self.backend.set(path, Reply::Down);
        }
    }
}

pub fn header(id: i64, symbol: &str, alert_type: &str) -> Value {
    json!({
        "id": id,
        "symbol": symbol,
        "alert_type": alert_type,
        "price": 100.0 + id as f64,
        "timestamp": "2025-10-16T10:00:00Z",
        "is_closed": false,
        "has_imbalance": false,
        "message": format!("{alert_type} #{id}")
    })
}

pub fn volume_alert(id: i64, symbol: &str, ratio: f64) -> Value {
    let mut v = header(id, symbol, "volume_spike");
    v["volume_ratio"] = json!(ratio);
    v["current_volume_usdt"] = json!(ratio * 10_000.0);
    v["average_volume_usdt"] = json!(10_000.0);
    v
}

pub fn consecutive_alert(id: i64, symbol: &str, count: u32) -> Value {
    let mut v = header(id, symbol, "consecutive_long");
    v["consecutive_count"] = json!(count);
    v
}

pub fn priority_alert(id: i64, symbol: &str, count: u32, ratio: Option<f64>, imbalance: bool) -> Value {
    let mut v = header(id, symbol, "priority");
    v["consecutive_count"] = json!(count);
    if let Some(r) = ratio {
        v["volume_ratio"] = json!(r);
    }
    v["has_imbalance"] = json!(imbalance);
    v
}

pub fn all_alerts_body() -> Value {
    json!({
        "volume_alerts": [volume_alert(1, "BTCUSDT", 3.2), volume_alert(2, "ETHUSDT", 5.5)],
        "consecutive_alerts": [consecutive_alert(3, "BTCUSDT", 7)],
        "priority_alerts": [priority_alert(4, "SOLUSDT", 10, Some(5.0), true)]
    })
}

pub fn watchlist_body(symbols: &[&str]) -> Value {
    let pairs: Vec<Value> = symbols.iter().map(|s| json!({"symbol": s, "is_active": true})).collect();
    json!({ "pairs": pairs })
}
