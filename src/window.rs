// ===============================
// src/window.rs
// ===============================
//
// Rolling time-window filter over anything carrying an event instant.
// Pure: callers pass `now_ms` explicitly, nothing here reads the clock
// except `now_ms()` itself.
//
use chrono::{DateTime, NaiveDateTime, Utc};

/// A record with an event instant.
pub trait Timestamped {
    /// Millisecond epoch supplied directly by the record shape, if any.
    fn explicit_ms(&self) -> Option<i64> {
        None
    }

    fn timestamp_text(&self) -> &str;

    /// Explicit field first, then the parsed text. `None` if neither works.
    fn effective_ms(&self) -> Option<i64> {
        self.explicit_ms()
            .or_else(|| parse_timestamp_ms(self.timestamp_text()))
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse RFC 3339, naive UTC date-times, or a bare integer millisecond epoch.
pub fn parse_timestamp_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<i64>().ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Inclusion predicate: `now - ts <= window`. Future instants are kept;
/// unparseable ones are not.
pub fn is_recent<T: Timestamped + ?Sized>(item: &T, window_ms: i64, now_ms: i64) -> bool {
    match item.effective_ms() {
        Some(ts) => now_ms.saturating_sub(ts) <= window_ms,
        None => false,
    }
}

/// Subsequence of `items` inside the window, order preserved.
pub fn filter_recent<T: Timestamped + Clone>(items: &[T], window_ms: i64, now_ms: i64) -> Vec<T> {
    items
        .iter()
        .filter(|item| is_recent(*item, window_ms, now_ms))
        .cloned()
        .collect()
}
