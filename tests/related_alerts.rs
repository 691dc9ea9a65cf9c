// Related-alert lookup: fetch by symbol, then keep what falls in the window.
//
// Run with: cargo test --test related_alerts

mod common;

use serde_json::json;

use alertdeck::window::parse_timestamp_ms;
use alertdeck::{classify_all, PriorityLevel, VolumeStatus};

use common::{consecutive_alert, priority_alert, volume_alert, Harness, Reply};

const HOUR_MS: i64 = 3_600_000;

fn base_ms() -> i64 {
    parse_timestamp_ms("2025-10-16T10:00:00Z").unwrap()
}

#[tokio::test]
async fn keeps_only_alerts_inside_the_window() {
    let h = Harness::new();
    let mut old = volume_alert(1, "BTCUSDT", 2.5);
    old["timestamp"] = json!("2025-10-16T07:59:59Z");
    let mut edge = consecutive_alert(2, "BTCUSDT", 6);
    edge["timestamp"] = json!("2025-10-16T09:00:00Z");
    let fresh = priority_alert(3, "BTCUSDT", 10, Some(5.0), true);
    let mut garbled = volume_alert(4, "BTCUSDT", 3.0);
    garbled["timestamp"] = json!("yesterday-ish");

    h.backend.set(
        &h.related_path("BTCUSDT"),
        Reply::Json(200, json!({"alerts": [old, edge, fresh, garbled]})),
    );

    // now = 10:00 + 0, window = 1h: 09:00 is exactly on the boundary.
    let recent = h.aggregator.related_recent("BTCUSDT", 50, HOUR_MS, base_ms()).await;
    let ids: Vec<i64> = recent.iter().map(|a| a.id()).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn explicit_millisecond_field_wins_over_text() {
    let h = Harness::new();
    let mut a = volume_alert(7, "ETHUSDT", 2.1);
    a["timestamp"] = json!("2020-01-01T00:00:00Z");
    a["alert_timestamp_ms"] = json!(base_ms() - 1_000);
    h.backend.set(&h.related_path("ETHUSDT"), Reply::Json(200, json!({"alerts": [a]})));

    let recent = h.aggregator.related_recent("ETHUSDT", 10, HOUR_MS, base_ms()).await;
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn future_dated_alerts_are_kept() {
    let h = Harness::new();
    let mut a = volume_alert(8, "SOLUSDT", 4.0);
    a["timestamp"] = json!("2025-10-16T10:05:00Z");
    h.backend.set(&h.related_path("SOLUSDT"), Reply::Json(200, json!({"alerts": [a]})));

    let recent = h.aggregator.related_recent("SOLUSDT", 10, HOUR_MS, base_ms()).await;
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn fetch_failure_yields_empty_list() {
    let h = Harness::new();
    h.backend.set(&h.related_path("BTCUSDT"), Reply::Json(500, json!({"detail": "boom"})));
    assert!(h.aggregator.related_recent("BTCUSDT", 50, HOUR_MS, base_ms()).await.is_empty());

    h.backend.set(&h.related_path("BTCUSDT"), Reply::Down);
    assert!(h.aggregator.related_recent("BTCUSDT", 50, HOUR_MS, base_ms()).await.is_empty());
    assert_eq!(h.telemetry.count("feed_defaulted"), 2);
}

#[tokio::test]
async fn recent_alerts_classify_highest_first() {
    let h = Harness::new();
    let mut closed = volume_alert(11, "BTCUSDT", 2.2);
    closed["is_closed"] = json!(true);
    closed["is_true_signal"] = json!(false);
    h.backend.set(
        &h.related_path("BTCUSDT"),
        Reply::Json(
            200,
            json!({"alerts": [
                closed,
                consecutive_alert(12, "BTCUSDT", 7),
                priority_alert(13, "BTCUSDT", 10, Some(5.0), true)
            ]}),
        ),
    );

    let recent = h.aggregator.related_recent("BTCUSDT", 50, HOUR_MS, base_ms()).await;
    let ranked = classify_all(&recent);
    assert_eq!(ranked[0].alert.id(), 13);
    assert_eq!(ranked[0].level, PriorityLevel::Critical);
    assert_eq!(ranked[1].alert.id(), 12);
    assert_eq!(ranked[2].volume_status, Some(VolumeStatus::FalseSignal));
}
