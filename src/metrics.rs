// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{error, info};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Feed health --------
pub static FEED_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("feed_failures_total", "feed calls replaced by their default (label: feed)"),
        &["feed"],
    )
    .unwrap()
});

pub static ALERTS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("alerts_rejected_total", "alert records dropped at decode (label: feed)"),
        &["feed"],
    )
    .unwrap()
});

// -------- Load / reload lifecycle --------
pub static LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("startup_loads_total", "four-feed loads (label: outcome)"),
        &["outcome"],
    )
    .unwrap()
});

pub static LOAD_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "startup_load_latency_ms",
        "Latency of the four-feed join (ms)",
    ))
    .unwrap()
});

pub static RELOAD_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reload_failures_total", "reload stages that failed (label: stage)"),
        &["stage"],
    )
    .unwrap()
});

pub static PUBLISHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snapshot_publishes_total", "snapshots published (label: source)"),
        &["source"],
    )
    .unwrap()
});

pub static STALE_DISCARDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("stale_responses_discarded_total", "responses older than the latest request").unwrap()
});

// -------- Current snapshot --------
pub static SNAPSHOT_ALERTS: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("snapshot_alerts", "alerts in the published snapshot").unwrap());

pub static SNAPSHOT_GENERATION: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("snapshot_generation", "generation of the published snapshot").unwrap());

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(FEED_FAILURES.clone())),
        REGISTRY.register(Box::new(ALERTS_REJECTED.clone())),
        REGISTRY.register(Box::new(LOADS.clone())),
        REGISTRY.register(Box::new(LOAD_LATENCY_MS.clone())),
        REGISTRY.register(Box::new(RELOAD_FAILURES.clone())),
        REGISTRY.register(Box::new(PUBLISHES.clone())),
        REGISTRY.register(Box::new(STALE_DISCARDED.clone())),
        REGISTRY.register(Box::new(SNAPSHOT_ALERTS.clone())),
        REGISTRY.register(Box::new(SNAPSHOT_GENERATION.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics), tiny HTTP 1.1 responder
async fn handle_client(mut stream: TcpStream) -> std::io::Result<()> {
    // Read a bit to consume headers (no full parse)
    let mut req_buf = [0u8; 1024];
    let _ = stream.read(&mut req_buf).await?;

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await
}

pub async fn serve_metrics(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "metrics listening on / and /metrics");

    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream).await {
                        error!(?e, "metrics client error");
                    }
                });
            }
            Err(e) => error!(?e, "metrics accept error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_metrics_are_encoded() {
        init();
        init(); // double registration is ignored
        FEED_FAILURES.with_label_values(&["watchlist"]).inc();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("feed_failures_total"));
        assert!(text.contains("feed=\"watchlist\""));
    }
}
