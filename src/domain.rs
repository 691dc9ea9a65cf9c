// ===============================
// src/domain.rs
// ===============================
//
// Alert records as delivered by the backend, decoded into an explicit
// tagged union on `alert_type`, plus the bootstrap snapshot they live in.
//
// Records are decoded one by one at the feed boundary: an unknown
// `alert_type` or a record that breaks an invariant is rejected on its own
// and never takes the rest of its bucket down with it.
//
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::window::{parse_timestamp_ms, Timestamped};

/// Discriminants accepted on the wire.
pub const ALERT_TYPES: [&str; 5] = [
    "volume_spike",
    "preliminary_volume_spike",
    "final_volume_spike",
    "consecutive_long",
    "priority",
];

// Fields shared by every alert kind. Stored rows carry only the
// millisecond fields and may leave `message` or the amounts null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHeader {
    pub id: i64,
    pub symbol: String,
    pub price: f64,
    #[serde(default, deserialize_with = "de_timestamp", skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    /// Explicit millisecond epoch, preferred over `timestamp` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_timestamp_ms: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_timestamp", skip_serializing_if = "Option::is_none")]
    pub close_timestamp: Option<String>,
    /// Preferred over `close_timestamp` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_timestamp_ms: Option<i64>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub is_closed: bool,
    #[serde(default, deserialize_with = "de_null_default")]
    pub has_imbalance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imbalance_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candle_data: Option<Value>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub message: String,
}

impl AlertHeader {
    /// Close instant in epoch ms, if the record has one that parses.
    pub fn close_ms(&self) -> Option<i64> {
        self.close_timestamp_ms
            .or_else(|| self.close_timestamp.as_deref().and_then(parse_timestamp_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAlert {
    #[serde(flatten)]
    pub header: AlertHeader,
    pub volume_ratio: f64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub current_volume_usdt: f64,
    #[serde(default, deserialize_with = "de_null_default")]
    pub average_volume_usdt: f64,
    /// Only meaningful once `header.is_closed` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_true_signal: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsecutiveAlert {
    #[serde(flatten)]
    pub header: AlertHeader,
    pub consecutive_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityAlert {
    #[serde(flatten)]
    pub header: AlertHeader,
    pub consecutive_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_volume_usdt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_volume_usdt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert_type", rename_all = "snake_case")]
pub enum Alert {
    VolumeSpike(VolumeAlert),
    PreliminaryVolumeSpike(VolumeAlert),
    FinalVolumeSpike(VolumeAlert),
    ConsecutiveLong(ConsecutiveAlert),
    Priority(PriorityAlert),
}

/// Coarse grouping used for bucketing and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Volume,
    Consecutive,
    Priority,
}

#[derive(Debug, Error)]
pub enum AlertDecodeError {
    #[error("missing alert_type discriminant")]
    MissingKind,
    #[error("unknown alert_type `{0}`")]
    UnknownKind(String),
    #[error("malformed alert record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("alert {id}: price must be positive, got {price}")]
    InvalidPrice { id: i64, price: f64 },
    #[error("alert {id}: volume_ratio must be positive, got {ratio}")]
    InvalidVolumeRatio { id: i64, ratio: f64 },
    #[error("alert {id}: consecutive_count must be positive")]
    ZeroConsecutive { id: i64 },
    #[error("alert {id}: neither timestamp nor alert_timestamp_ms is set")]
    MissingTimestamp { id: i64 },
    #[error("alert {id}: close_timestamp precedes timestamp")]
    CloseBeforeOpen { id: i64 },
}

impl Alert {
    /// Decode a single wire record and check its invariants.
    pub fn decode(value: Value) -> Result<Alert, AlertDecodeError> {
        let kind = value
            .get("alert_type")
            .and_then(Value::as_str)
            .ok_or(AlertDecodeError::MissingKind)?;
        if !ALERT_TYPES.contains(&kind) {
            return Err(AlertDecodeError::UnknownKind(kind.to_string()));
        }
        let alert: Alert = serde_json::from_value(value)?;
        alert.validate()?;
        Ok(alert)
    }

    pub fn validate(&self) -> Result<(), AlertDecodeError> {
        let h = self.header();
        if !(h.price > 0.0) {
            return Err(AlertDecodeError::InvalidPrice { id: h.id, price: h.price });
        }
        if let Some(ratio) = self.volume_ratio() {
            if !(ratio > 0.0) {
                return Err(AlertDecodeError::InvalidVolumeRatio { id: h.id, ratio });
            }
        }
        if self.consecutive_count() == Some(0) {
            return Err(AlertDecodeError::ZeroConsecutive { id: h.id });
        }
        if h.alert_timestamp_ms.is_none() && h.timestamp.trim().is_empty() {
            return Err(AlertDecodeError::MissingTimestamp { id: h.id });
        }
        // Unparseable instants are left to the window filter.
        if let (Some(open_ms), Some(close_ms)) = (self.effective_ms(), h.close_ms()) {
            if close_ms < open_ms {
                return Err(AlertDecodeError::CloseBeforeOpen { id: h.id });
            }
        }
        Ok(())
    }

    pub fn header(&self) -> &AlertHeader {
        match self {
            Alert::VolumeSpike(v) | Alert::PreliminaryVolumeSpike(v) | Alert::FinalVolumeSpike(v) => {
                &v.header
            }
            Alert::ConsecutiveLong(c) => &c.header,
            Alert::Priority(p) => &p.header,
        }
    }

    pub fn id(&self) -> i64 {
        self.header().id
    }

    pub fn symbol(&self) -> &str {
        &self.header().symbol
    }

    pub fn kind(&self) -> AlertKind {
        match self {
            Alert::VolumeSpike(_) | Alert::PreliminaryVolumeSpike(_) | Alert::FinalVolumeSpike(_) => {
                AlertKind::Volume
            }
            Alert::ConsecutiveLong(_) => AlertKind::Consecutive,
            Alert::Priority(_) => AlertKind::Priority,
        }
    }

    /// Wire discriminant of this record.
    pub fn alert_type(&self) -> &'static str {
        match self {
            Alert::VolumeSpike(_) => "volume_spike",
            Alert::PreliminaryVolumeSpike(_) => "preliminary_volume_spike",
            Alert::FinalVolumeSpike(_) => "final_volume_spike",
            Alert::ConsecutiveLong(_) => "consecutive_long",
            Alert::Priority(_) => "priority",
        }
    }

    pub fn as_volume(&self) -> Option<&VolumeAlert> {
        match self {
            Alert::VolumeSpike(v) | Alert::PreliminaryVolumeSpike(v) | Alert::FinalVolumeSpike(v) => Some(v),
            _ => None,
        }
    }

    pub fn consecutive_count(&self) -> Option<u32> {
        match self {
            Alert::ConsecutiveLong(c) => Some(c.consecutive_count),
            Alert::Priority(p) => Some(p.consecutive_count),
            _ => None,
        }
    }

    pub fn volume_ratio(&self) -> Option<f64> {
        match self {
            Alert::VolumeSpike(v) | Alert::PreliminaryVolumeSpike(v) | Alert::FinalVolumeSpike(v) => {
                Some(v.volume_ratio)
            }
            Alert::Priority(p) => p.volume_ratio,
            Alert::ConsecutiveLong(_) => None,
        }
    }

    pub fn has_imbalance(&self) -> bool {
        self.header().has_imbalance
    }

    pub fn is_closed(&self) -> bool {
        self.header().is_closed
    }

    /// Post-close verdict of a volume alert; `None` while open or for other kinds.
    pub fn closed_verdict(&self) -> Option<bool> {
        let v = self.as_volume()?;
        if !v.header.is_closed {
            return None;
        }
        Some(v.is_true_signal.unwrap_or(false))
    }
}

impl Timestamped for Alert {
    fn explicit_ms(&self) -> Option<i64> {
        self.header().alert_timestamp_ms
    }

    fn timestamp_text(&self) -> &str {
        &self.header().timestamp
    }
}

/// Outcome of decoding a list of wire records.
#[derive(Debug, Default)]
pub struct DecodedAlerts {
    pub alerts: Vec<Alert>,
    pub rejected: Vec<AlertDecodeError>,
}

pub fn decode_alerts(values: Vec<Value>) -> DecodedAlerts {
    let mut out = DecodedAlerts::default();
    for value in values {
        match Alert::decode(value) {
            Ok(alert) => out.alerts.push(alert),
            Err(e) => out.rejected.push(e),
        }
    }
    out
}

/// The three alert buckets of the all-alerts feed.
#[derive(Debug, Default)]
pub struct AlertBuckets {
    pub volume_alerts: Vec<Alert>,
    pub consecutive_alerts: Vec<Alert>,
    pub priority_alerts: Vec<Alert>,
    pub rejected: Vec<AlertDecodeError>,
}

impl AlertBuckets {
    /// Volume, then consecutive, then priority; order within each bucket kept.
    pub fn into_ordered(self) -> Vec<Alert> {
        let mut out = self.volume_alerts;
        out.extend(self.consecutive_alerts);
        out.extend(self.priority_alerts);
        out
    }
}

/// Complete bootstrap state. Replaced wholesale, never mutated after publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupSnapshot {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default)]
    pub favorites: Vec<Value>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub trading_settings: Map<String, Value>,
    #[serde(default)]
    pub data_integrity: Map<String, Value>,
}

impl StartupSnapshot {
    /// Nothing to show: no alerts, no watched pairs, no favorites.
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty() && self.watchlist.is_empty() && self.favorites.is_empty()
    }

    pub fn alerts_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Alert> + 'a {
        self.alerts.iter().filter(move |a| a.symbol() == symbol)
    }
}

/// Watchlist symbols are a set; first occurrence wins, blanks dropped.
pub fn dedup_symbols<I: IntoIterator<Item = String>>(symbols: I) -> Vec<String> {
    let mut seen = ahash::AHashSet::new();
    symbols
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

// ---- timestamp helpers: accept text or integer epoch ----

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
    Float(f64),
}

impl RawTimestamp {
    fn into_text(self) -> String {
        match self {
            RawTimestamp::Text(s) => s,
            RawTimestamp::Millis(ms) => ms.to_string(),
            RawTimestamp::Float(ms) => (ms as i64).to_string(),
        }
    }
}

// Null reads as absent; `validate` decides whether that is acceptable.
fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Option::<RawTimestamp>::deserialize(d).map(|o| o.map(RawTimestamp::into_text).unwrap_or_default())
}

fn de_opt_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<RawTimestamp>::deserialize(d).map(|o| o.map(RawTimestamp::into_text))
}

fn de_null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn volume_json(id: i64) -> Value {
        json!({
            "id": id,
            "symbol": "BTCUSDT",
            "alert_type": "volume_spike",
            "price": 64000.5,
            "timestamp": "2026-10-16T10:00:00Z",
            "is_closed": true,
            "is_true_signal": true,
            "has_imbalance": false,
            "message": "volume x3.4",
            "volume_ratio": 3.4,
            "current_volume_usdt": 340000,
            "average_volume_usdt": 100000,
            "status": "closed"
        })
    }

    #[test]
    fn decodes_volume_alert_and_ignores_extra_fields() {
        let alert = Alert::decode(volume_json(7)).unwrap();
        assert_eq!(alert.kind(), AlertKind::Volume);
        assert_eq!(alert.alert_type(), "volume_spike");
        assert_eq!(alert.id(), 7);
        assert_eq!(alert.volume_ratio(), Some(3.4));
        assert_eq!(alert.closed_verdict(), Some(true));
        assert_eq!(alert.as_volume().unwrap().current_volume_usdt, 340000.0);
    }

    #[test]
    fn decodes_integer_timestamps_as_text() {
        let alert = Alert::decode(json!({
            "id": 1, "symbol": "ETHUSDT", "alert_type": "consecutive_long",
            "price": 2500, "timestamp": 1_760_608_800_000i64,
            "close_timestamp": 1_760_608_860_000i64, "consecutive_count": 6
        }))
        .unwrap();
        assert_eq!(alert.header().timestamp, "1760608800000");
        assert_eq!(alert.header().close_timestamp.as_deref(), Some("1760608860000"));
        assert_eq!(alert.consecutive_count(), Some(6));
        assert!(!alert.has_imbalance());
    }

    #[test]
    fn unknown_or_missing_discriminant_fails_closed() {
        let mut v = volume_json(1);
        v["alert_type"] = json!("mystery");
        assert!(matches!(Alert::decode(v), Err(AlertDecodeError::UnknownKind(k)) if k == "mystery"));

        let mut v = volume_json(1);
        v.as_object_mut().unwrap().remove("alert_type");
        assert!(matches!(Alert::decode(v), Err(AlertDecodeError::MissingKind)));
    }

    #[test]
    fn invariant_violations_are_rejected() {
        let mut v = volume_json(2);
        v["price"] = json!(0);
        assert!(matches!(Alert::decode(v), Err(AlertDecodeError::InvalidPrice { id: 2, .. })));

        let mut v = volume_json(3);
        v["close_timestamp"] = json!("2026-10-16T09:59:00Z");
        assert!(matches!(Alert::decode(v), Err(AlertDecodeError::CloseBeforeOpen { id: 3 })));

        let zero = json!({
            "id": 4, "symbol": "SOLUSDT", "alert_type": "priority", "price": 150.0,
            "timestamp": "2026-10-16T10:00:00Z", "consecutive_count": 0
        });
        assert!(matches!(Alert::decode(zero), Err(AlertDecodeError::ZeroConsecutive { id: 4 })));
    }

    // Shape of a stored alert row: ms instants only, nullable text/amounts.
    fn stored_row(id: i64) -> Value {
        json!({
            "id": id,
            "symbol": "BTCUSDT",
            "alert_type": "volume_spike",
            "price": 64000.5,
            "volume_ratio": 2.8,
            "current_volume_usdt": null,
            "average_volume_usdt": null,
            "consecutive_count": null,
            "alert_timestamp_ms": 1_760_608_800_000i64,
            "close_timestamp_ms": null,
            "is_closed": false,
            "is_true_signal": null,
            "has_imbalance": false,
            "message": null,
            "status": "pending",
            "created_at": "2025-10-16T10:00:01"
        })
    }

    #[test]
    fn stored_row_without_text_timestamp_decodes() {
        let alert = Alert::decode(stored_row(21)).unwrap();
        assert_eq!(alert.header().timestamp, "");
        assert_eq!(alert.effective_ms(), Some(1_760_608_800_000));
        assert_eq!(alert.header().message, "");
        let v = alert.as_volume().unwrap();
        assert_eq!(v.current_volume_usdt, 0.0);
        assert_eq!(v.average_volume_usdt, 0.0);
    }

    #[test]
    fn record_without_any_instant_is_rejected() {
        let mut v = stored_row(22);
        v.as_object_mut().unwrap().remove("alert_timestamp_ms");
        assert!(matches!(Alert::decode(v), Err(AlertDecodeError::MissingTimestamp { id: 22 })));

        let mut v = stored_row(23);
        v["alert_timestamp_ms"] = Value::Null;
        v["timestamp"] = Value::Null;
        assert!(matches!(Alert::decode(v), Err(AlertDecodeError::MissingTimestamp { id: 23 })));
    }

    #[test]
    fn close_ms_is_checked_against_open() {
        let mut v = stored_row(24);
        v["is_closed"] = json!(true);
        v["close_timestamp_ms"] = json!(1_760_608_799_000i64);
        assert!(matches!(Alert::decode(v), Err(AlertDecodeError::CloseBeforeOpen { id: 24 })));

        let mut v = stored_row(25);
        v["is_closed"] = json!(true);
        v["is_true_signal"] = json!(true);
        v["close_timestamp_ms"] = json!(1_760_608_860_000i64);
        let alert = Alert::decode(v).unwrap();
        assert_eq!(alert.header().close_ms(), Some(1_760_608_860_000));
        assert_eq!(alert.closed_verdict(), Some(true));
    }

    #[test]
    fn decode_alerts_keeps_good_records() {
        let mut bad = volume_json(9);
        bad["alert_type"] = json!("nope");
        let decoded = decode_alerts(vec![volume_json(1), bad, volume_json(2)]);
        assert_eq!(decoded.alerts.iter().map(Alert::id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(decoded.rejected.len(), 1);
    }

    #[test]
    fn serialized_alert_keeps_its_discriminant() {
        let alert = Alert::decode(volume_json(5)).unwrap();
        let v = serde_json::to_value(&alert).unwrap();
        assert_eq!(v["alert_type"], "volume_spike");
        assert_eq!(v["symbol"], "BTCUSDT");
    }

    #[test]
    fn open_volume_alert_has_no_verdict() {
        let mut v = volume_json(6);
        v["is_closed"] = json!(false);
        let alert = Alert::decode(v).unwrap();
        assert_eq!(alert.closed_verdict(), None);
    }

    #[test]
    fn dedup_symbols_keeps_first_occurrence() {
        let out = dedup_symbols(vec!["BTCUSDT".into(), " ".into(), "ETHUSDT".into(), "BTCUSDT".into()]);
        assert_eq!(out, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
    }
}
