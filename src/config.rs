// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : alertdeck: signal classification & startup aggregation core
Module  : config.rs
Version : 0.5.0
License : MIT (see LICENSE)

Summary : Fetches the dashboard backend feeds concurrently, merges them into
          one bootstrap snapshot with per-feed fallbacks, classifies alerts
          into priority levels and statuses, filters recent related alerts,
          and exposes Prometheus metrics for the load/reload lifecycle.
=============================================================================
*/
use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid API_BASE_URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Backend routes, relative to the base URL. `{symbol}` in `related` is
/// replaced with the url-encoded symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub all_alerts: String,
    pub watchlist: String,
    pub favorites: String,
    pub settings: String,
    pub reload: String,
    pub related: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            all_alerts: "/api/alerts/all".to_string(),
            watchlist: "/api/watchlist".to_string(),
            favorites: "/api/favorites".to_string(),
            settings: "/api/settings".to_string(),
            reload: "/api/startup/data/reload".to_string(),
            related: "/api/alerts/symbol/{symbol}".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Args {
    // backend
    pub api_base_url: Url,
    pub request_timeout: Duration,
    pub endpoints: Endpoints,

    // related-alerts window
    pub related_window_ms: i64,
    pub related_limit: u32,
    pub watch_symbol: Option<String>,

    // runtime
    pub metrics_port: u16, // 0 = disabled
    pub log_filter: String,
    pub reload_on_start: bool,
}

impl Args {
    /// Build from any key lookup (environment in production, a map in tests).
    pub fn from_lookup<F>(get: F) -> Result<Args, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = get("API_BASE_URL").unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
        let api_base_url = Url::parse(api_base_url.trim())?;

        let request_timeout_ms: u64 = parse_or("REQUEST_TIMEOUT_MS", get("REQUEST_TIMEOUT_MS"), 10_000)?;
        let related_window_ms: i64 = parse_or("RELATED_WINDOW_MS", get("RELATED_WINDOW_MS"), 3_600_000)?;
        let related_limit: u32 = parse_or("RELATED_LIMIT", get("RELATED_LIMIT"), 50)?;
        let metrics_port: u16 = parse_or("METRICS_PORT", get("METRICS_PORT"), 9898)?;

        let watch_symbol = get("WATCH_SYMBOL")
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty());

        let log_filter = get("LOG_FILTER").unwrap_or_else(|| "info".to_string());

        let reload_on_start = matches!(
            get("RELOAD_ON_START").unwrap_or_default().trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );

        Ok(Args {
            api_base_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
            endpoints: Endpoints::default(),
            related_window_ms,
            related_limit,
            watch_symbol,
            metrics_port,
            log_filter,
            reload_on_start,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

pub fn load() -> Result<Args, ConfigError> {
    // .env is optional
    let _ = dotenv();
    Args::from_lookup(|k| env::var(k).ok())
}
