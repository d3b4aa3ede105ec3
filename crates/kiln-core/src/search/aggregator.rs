//! Concurrent fan-out over search backends.
//!
//! States: `Idle -> Searching -> {Completed, Cancelled}`. Results merge as
//! each backend finishes. A failing backend contributes nothing. After
//! cancellation, late answers are discarded and merged results stay visible.

use std::sync::{Arc, Mutex, PoisonError};

use kiln_schema::SearchResult;
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;

use super::{MergedResults, SearchBackend, SearchError};

/// Lifecycle of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Searching,
    Completed,
    Cancelled,
}

impl SearchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Point-in-time view of a search.
#[derive(Debug, Clone)]
pub struct SearchSnapshot {
    pub query: String,
    pub phase: SearchPhase,
    /// Merged results so far, ordered by `group:name`.
    pub results: Vec<SearchResult>,
    /// Backends still running.
    pub pending: usize,
}

#[derive(Debug)]
struct State {
    query: String,
    phase: SearchPhase,
    merged: MergedResults,
    pending: usize,
}

impl State {
    fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            query: self.query.clone(),
            phase: self.phase,
            results: self.merged.results(),
            pending: self.pending,
        }
    }
}

/// Handle on one running search.
#[derive(Debug, Clone)]
pub struct SearchSession {
    cancel: CancellationToken,
    state: Arc<Mutex<State>>,
    updates: Arc<watch::Sender<SearchSnapshot>>,
}

impl SearchSession {
    fn new(query: &str, backends: usize) -> Self {
        let state = State {
            query: query.to_string(),
            phase: if backends == 0 {
                SearchPhase::Completed
            } else {
                SearchPhase::Searching
            },
            merged: MergedResults::new(),
            pending: backends,
        };
        let (tx, _) = watch::channel(state.snapshot());
        Self {
            cancel: CancellationToken::new(),
            state: Arc::new(Mutex::new(state)),
            updates: Arc::new(tx),
        }
    }

    fn idle() -> Self {
        let session = Self::new("", 0);
        session.with_state(|s| s.phase = SearchPhase::Idle);
        session
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut state);
        self.updates.send_replace(state.snapshot());
        out
    }

    /// Fold one backend's answer in, unless the search was cancelled.
    fn complete(&self, label: &str, outcome: Result<Vec<SearchResult>, SearchError>) {
        self.with_state(|s| {
            if s.phase != SearchPhase::Searching {
                tracing::debug!("Discarding late answer from {label}");
                return;
            }
            match outcome {
                Ok(results) => {
                    tracing::debug!("{label} answered {} candidates", results.len());
                    s.merged.merge(results);
                }
                Err(SearchError::Cancelled) => {}
                Err(e) => tracing::warn!("Search backend {label} failed: {e}"),
            }
            s.pending = s.pending.saturating_sub(1);
            if s.pending == 0 {
                s.phase = SearchPhase::Completed;
                tracing::info!("Search '{}' completed with {} results", s.query, s.merged.len());
            }
        });
    }

    /// Stop the search. Merged results remain available.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.with_state(|s| {
            if s.phase == SearchPhase::Searching {
                s.phase = SearchPhase::Cancelled;
                tracing::info!("Search '{}' cancelled", s.query);
            }
        });
    }

    pub fn phase(&self) -> SearchPhase {
        self.snapshot().phase
    }

    pub fn results(&self) -> Vec<SearchResult> {
        self.snapshot().results
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.updates.borrow().clone()
    }

    /// Receiver notified after every merge and state change.
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.updates.subscribe()
    }

    /// Wait until the search completes or is cancelled.
    pub async fn wait(&self) -> SearchSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| s.phase.is_terminal()).await {
            Ok(snapshot) => snapshot.clone(),
            // Sender lives in `self`, so this only happens on teardown.
            Err(_) => self.snapshot(),
        }
    }
}

/// Fans queries out to every backend over a bounded worker pool.
#[derive(Debug)]
pub struct SearchAggregator {
    backends: Vec<Arc<dyn SearchBackend>>,
    workers: Arc<Semaphore>,
    current: Mutex<SearchSession>,
}

impl SearchAggregator {
    /// Aggregator running at most `workers` backend queries at once.
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>, workers: usize) -> Self {
        Self {
            backends,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            current: Mutex::new(SearchSession::idle()),
        }
    }

    /// Start a search, cancelling the previous one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn search(&self, query: &str) -> SearchSession {
        let session = SearchSession::new(query, self.backends.len());
        let previous = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, session.clone())
        };
        previous.cancel();
        tracing::info!("Searching '{query}' across {} backends", self.backends.len());

        for backend in &self.backends {
            let backend = backend.clone();
            let workers = self.workers.clone();
            let session = session.clone();
            let query = query.to_string();
            tokio::spawn(async move {
                let outcome = tokio::select! {
                    permit = workers.acquire_owned() => match permit {
                        Ok(_permit) if !session.cancel.is_cancelled() => {
                            backend.search(&query, &session.cancel).await
                        }
                        Ok(_) => Err(SearchError::Cancelled),
                        Err(_) => Err(SearchError::Io(std::io::Error::other("worker pool closed"))),
                    },
                    () = session.cancel.cancelled() => Err(SearchError::Cancelled),
                };
                session.complete(backend.label(), outcome);
            });
        }
        session
    }

    /// Cancel the current search.
    pub fn cancel(&self) {
        self.session().cancel();
    }

    /// The current (or last) search.
    pub fn session(&self) -> SearchSession {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn phase(&self) -> SearchPhase {
        self.session().phase()
    }

    pub fn results(&self) -> Vec<SearchResult> {
        self.session().results()
    }
}
