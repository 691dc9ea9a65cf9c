// ===============================
// src/loader.rs
// ===============================
//
// Lifecycle exposed to the UI layer:
//
//   idle --request--> loading --resolved--> ready
//                        |                    |
//                        +----failed----> error
//   ready/error --reload--> loading
//
// No retries happen here; every new attempt is caller-initiated.
//
use std::sync::Arc;

use tokio::sync::watch;

use crate::aggregator::{ReloadSource, StartupAggregator};
use crate::domain::StartupSnapshot;
use crate::feed::FeedSource;

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderState {
    Idle,
    /// `previous` is the snapshot shown before this attempt, if any.
    Loading { previous: Option<Arc<StartupSnapshot>> },
    Ready(Arc<StartupSnapshot>),
    /// `snapshot` is the last good snapshot retained across the failure.
    Error { reason: String, snapshot: Option<Arc<StartupSnapshot>> },
}

#[derive(Debug, Clone)]
pub enum LoaderEvent {
    Request,
    Reload,
    Resolved(Arc<StartupSnapshot>),
    Failed(String),
}

impl LoaderState {
    /// Next state, or `None` when the event is not valid here.
    pub fn transition(&self, event: LoaderEvent) -> Option<LoaderState> {
        match (self, event) {
            (LoaderState::Idle, LoaderEvent::Request) => Some(LoaderState::Loading { previous: None }),
            (LoaderState::Ready(s), LoaderEvent::Reload) => {
                Some(LoaderState::Loading { previous: Some(Arc::clone(s)) })
            }
            (LoaderState::Error { snapshot, .. }, LoaderEvent::Reload) => {
                Some(LoaderState::Loading { previous: snapshot.clone() })
            }
            (LoaderState::Loading { .. }, LoaderEvent::Resolved(s)) => Some(LoaderState::Ready(s)),
            (LoaderState::Loading { previous }, LoaderEvent::Failed(reason)) => {
                Some(LoaderState::Error { reason, snapshot: previous.clone() })
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoaderState::Idle => "idle",
            LoaderState::Loading { .. } => "loading",
            LoaderState::Ready(_) => "ready",
            LoaderState::Error { .. } => "error",
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<StartupSnapshot>> {
        match self {
            LoaderState::Ready(s) => Some(s),
            LoaderState::Loading { previous } => previous.as_ref(),
            LoaderState::Error { snapshot, .. } => snapshot.as_ref(),
            LoaderState::Idle => None,
        }
    }
}

/// What the UI should render for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderView {
    Idle,
    Progress,
    Retry,
    /// Ready, but the snapshot has nothing to show.
    NoData,
    Content,
}

impl From<&LoaderState> for LoaderView {
    fn from(state: &LoaderState) -> Self {
        match state {
            LoaderState::Idle => LoaderView::Idle,
            LoaderState::Loading { .. } => LoaderView::Progress,
            LoaderState::Error { .. } => LoaderView::Retry,
            LoaderState::Ready(s) if s.is_empty() => LoaderView::NoData,
            LoaderState::Ready(_) => LoaderView::Content,
        }
    }
}

pub struct DataLoader<S> {
    aggregator: Arc<StartupAggregator<S>>,
    state: watch::Sender<LoaderState>,
}

impl<S: FeedSource> DataLoader<S> {
    pub fn new(aggregator: Arc<StartupAggregator<S>>) -> Self {
        let (state, _rx) = watch::channel(LoaderState::Idle);
        Self { aggregator, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<LoaderState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LoaderState {
        self.state.borrow().clone()
    }

    pub fn view(&self) -> LoaderView {
        LoaderView::from(&*self.state.borrow())
    }

    pub fn aggregator(&self) -> &Arc<StartupAggregator<S>> {
        &self.aggregator
    }

    fn apply(&self, event: LoaderEvent) -> bool {
        self.state.send_if_modified(|cur| match cur.transition(event) {
            Some(next) => {
                tracing::debug!(from = cur.name(), to = next.name(), "loader transition");
                *cur = next;
                true
            }
            None => false,
        })
    }

    /// Snapshot to show once our own request resolved. A result the
    /// aggregator discarded as stale gives way to the published one.
    fn adopt(&self, snapshot: Arc<StartupSnapshot>, published: bool) -> Arc<StartupSnapshot> {
        if published {
            return snapshot;
        }
        match self.aggregator.current() {
            Some(current) => {
                tracing::debug!("own result superseded, adopting published snapshot");
                current
            }
            // Nothing newer has landed yet; ours is still the freshest data.
            None => snapshot,
        }
    }

    /// First load. Outside `idle` this is a no-op returning the current state.
    pub async fn request(&self) -> LoaderState {
        if !self.apply(LoaderEvent::Request) {
            return self.state();
        }
        match self.aggregator.load_tracked().await {
            Ok(outcome) => {
                let snapshot = self.adopt(outcome.snapshot, outcome.published);
                self.apply(LoaderEvent::Resolved(snapshot))
            }
            Err(e) => self.apply(LoaderEvent::Failed(e.to_string())),
        };
        self.state()
    }

    /// Explicit reload from `ready` or `error`; a no-op elsewhere.
    pub async fn reload(&self) -> LoaderState {
        if !self.apply(LoaderEvent::Reload) {
            return self.state();
        }
        let outcome = self.aggregator.reload().await;
        match outcome.source {
            ReloadSource::Retained(e) => self.apply(LoaderEvent::Failed(e.to_string())),
            ReloadSource::Server | ReloadSource::Fallback => {
                let snapshot = self.adopt(outcome.snapshot, outcome.published);
                self.apply(LoaderEvent::Resolved(snapshot))
            }
        };
        self.state()
    }
}
