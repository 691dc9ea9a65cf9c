// ===============================
// src/feed.rs
// ===============================
//
// Upstream feeds of the dashboard backend:
// - FeedSource     : transport seam (GET/POST -> status + body)
// - HttpFeedSource : reqwest implementation against the backend base URL
// - FeedClient     : typed calls per feed, decoding bodies at the boundary
//
// A transport failure is `Err`. Any HTTP response is `Ok`, whatever its
// status; `FeedClient` turns non-success into `FeedError::Status`.
//
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::Endpoints;
use crate::domain::{decode_alerts, dedup_symbols, AlertBuckets, AlertDecodeError, DecodedAlerts, StartupSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    AllAlerts,
    Watchlist,
    Favorites,
    Settings,
    Reload,
    Related,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::AllAlerts => "all_alerts",
            FeedKind::Watchlist => "watchlist",
            FeedKind::Favorites => "favorites",
            FeedKind::Settings => "settings",
            FeedKind::Reload => "reload",
            FeedKind::Related => "related",
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FeedError {
    /// No response was obtained at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Transport(_) | FeedError::Url(_))
    }
}

#[derive(Debug, Clone)]
pub struct FeedResponse {
    pub status: u16,
    pub body: String,
}

impl FeedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<FeedResponse, FeedError>;

    async fn post(&self, path: &str) -> Result<FeedResponse, FeedError>;
}

#[async_trait]
impl<T: FeedSource + ?Sized> FeedSource for Arc<T> {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<FeedResponse, FeedError> {
        (**self).get(path, query).await
    }

    async fn post(&self, path: &str) -> Result<FeedResponse, FeedError> {
        (**self).post(path).await
    }
}

pub struct HttpFeedSource {
    http: reqwest::Client,
    base: Url,
}

impl HttpFeedSource {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(Self { http, base })
    }

    async fn finish(rsp: reqwest::Response) -> Result<FeedResponse, FeedError> {
        let status = rsp.status().as_u16();
        let body = rsp
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(FeedResponse { status, body })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<FeedResponse, FeedError> {
        let url = self.base.join(path)?;
        let rsp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Self::finish(rsp).await
    }

    async fn post(&self, path: &str) -> Result<FeedResponse, FeedError> {
        let url = self.base.join(path)?;
        let rsp = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Self::finish(rsp).await
    }
}

// ---- wire bodies ----

#[derive(Debug, Deserialize)]
struct AllAlertsBody {
    #[serde(default)]
    volume_alerts: Vec<Value>,
    #[serde(default)]
    consecutive_alerts: Vec<Value>,
    #[serde(default)]
    priority_alerts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PairEntry {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct WatchlistBody {
    pairs: Vec<PairEntry>,
}

#[derive(Debug, Deserialize)]
struct FavoritesBody {
    favorites: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    alerts: Vec<Value>,
    #[serde(default)]
    watchlist: Vec<String>,
    #[serde(default)]
    favorites: Vec<Value>,
    #[serde(default)]
    settings: Map<String, Value>,
    #[serde(default)]
    trading_settings: Map<String, Value>,
    #[serde(default)]
    data_integrity: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ReloadBody {
    data: RawSnapshot,
}

#[derive(Debug, Deserialize)]
struct RelatedBody {
    alerts: Vec<Value>,
}

/// Snapshot returned by the server-side reload, with its rejected records.
#[derive(Debug)]
pub struct ServerSnapshot {
    pub snapshot: StartupSnapshot,
    pub rejected: Vec<AlertDecodeError>,
}

pub struct FeedClient<S> {
    source: S,
    endpoints: Endpoints,
}

impl<S: FeedSource> FeedClient<S> {
    pub fn new(source: S, endpoints: Endpoints) -> Self {
        Self { source, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn checked(rsp: FeedResponse) -> Result<String, FeedError> {
        if rsp.is_success() {
            Ok(rsp.body)
        } else {
            Err(FeedError::Status { status: rsp.status, body: rsp.body })
        }
    }

    async fn get_body(&self, path: &str, query: &[(&str, String)]) -> Result<String, FeedError> {
        let rsp = self.source.get(path, query).await?;
        Self::checked(rsp)
    }

    pub async fn all_alerts(&self) -> Result<AlertBuckets, FeedError> {
        let body = self.get_body(&self.endpoints.all_alerts, &[]).await?;
        let raw: AllAlertsBody = serde_json::from_str(&body)?;

        let volume = decode_alerts(raw.volume_alerts);
        let consecutive = decode_alerts(raw.consecutive_alerts);
        let priority = decode_alerts(raw.priority_alerts);

        let mut rejected = volume.rejected;
        rejected.extend(consecutive.rejected);
        rejected.extend(priority.rejected);

        Ok(AlertBuckets {
            volume_alerts: volume.alerts,
            consecutive_alerts: consecutive.alerts,
            priority_alerts: priority.alerts,
            rejected,
        })
    }

    pub async fn watchlist(&self) -> Result<Vec<String>, FeedError> {
        let body = self.get_body(&self.endpoints.watchlist, &[]).await?;
        let raw: WatchlistBody = serde_json::from_str(&body)?;
        Ok(dedup_symbols(raw.pairs.into_iter().map(|p| p.symbol)))
    }

    pub async fn favorites(&self) -> Result<Vec<Value>, FeedError> {
        let body = self.get_body(&self.endpoints.favorites, &[]).await?;
        let raw: FavoritesBody = serde_json::from_str(&body)?;
        Ok(raw.favorites)
    }

    /// Opaque flat mapping; anything but a JSON object is malformed.
    pub async fn settings(&self) -> Result<Map<String, Value>, FeedError> {
        let body = self.get_body(&self.endpoints.settings, &[]).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn reload_snapshot(&self) -> Result<ServerSnapshot, FeedError> {
        let rsp = self.source.post(&self.endpoints.reload).await?;
        let body = Self::checked(rsp)?;
        let raw: ReloadBody = serde_json::from_str(&body)?;
        let data = raw.data;
        let decoded = decode_alerts(data.alerts);
        Ok(ServerSnapshot {
            snapshot: StartupSnapshot {
                alerts: decoded.alerts,
                watchlist: dedup_symbols(data.watchlist),
                favorites: data.favorites,
                settings: data.settings,
                trading_settings: data.trading_settings,
                data_integrity: data.data_integrity,
            },
            rejected: decoded.rejected,
        })
    }

    /// Alerts for one symbol over the last `hours`, at most `limit` of them.
    pub async fn related_alerts(&self, symbol: &str, limit: u32, hours: u32) -> Result<DecodedAlerts, FeedError> {
        let encoded: String = url::form_urlencoded::byte_serialize(symbol.as_bytes()).collect();
        let path = self.endpoints.related.replace("{symbol}", &encoded);
        let query = [("hours", hours.to_string()), ("limit", limit.to_string())];
        let body = self.get_body(&path, &query).await?;
        let raw: RelatedBody = serde_json::from_str(&body)?;
        Ok(decode_alerts(raw.alerts))
    }
}
