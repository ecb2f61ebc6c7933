use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::PreviousEntryData;
use crate::suggestions::normalize_payload;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    /// Holds the default entries as a placeholder until the fetch settles.
    Loading(PreviousEntryData),
    Ready(PreviousEntryData),
}

impl LoadState {
    pub fn entries(&self) -> &PreviousEntryData {
        match self {
            LoadState::Loading(entries) | LoadState::Ready(entries) => entries,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading(_))
    }
}

/// One-shot loader for autocomplete suggestions.
///
/// Consumers watch the receiver returned by [`SuggestionLoader::new`]. The
/// state moves from `Loading` to `Ready` exactly once: `load` consumes the
/// loader. A failed or malformed fetch still ends in `Ready`, with defaults.
pub struct SuggestionLoader {
    state: watch::Sender<LoadState>,
}

impl SuggestionLoader {
    pub fn new() -> (Self, watch::Receiver<LoadState>) {
        let (state, receiver) = watch::channel(LoadState::Loading(PreviousEntryData::default()));
        (Self { state }, receiver)
    }

    /// Returns `None` when every receiver was dropped before the fetch
    /// settled; the result is then discarded instead of applied.
    pub async fn load<F, E>(self, fetch: F) -> Option<PreviousEntryData>
    where
        F: Future<Output = Result<Value, E>>,
        E: Display,
    {
        let entries = match fetch.await {
            Ok(payload) => normalize_payload(&payload),
            Err(err) => {
                warn!(error = %err, "failed to load previous entries, using defaults");
                PreviousEntryData::default()
            }
        };

        if self.state.is_closed() {
            debug!("suggestion consumer went away before load finished, discarding");
            return None;
        }
        self.state.send_replace(LoadState::Ready(entries.clone()));
        Some(entries)
    }
}

/// Keeps only the newest of overlapping loads for one consumer.
///
/// Every call to [`LatestOnly::run`] takes a new generation up front; a load
/// that finishes after a newer one was started yields `None`.
#[derive(Debug, Clone, Default)]
pub struct LatestOnly {
    generation: Arc<AtomicU64>,
}

#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl LoadTicket {
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }
}

impl LatestOnly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            generation,
            latest: Arc::clone(&self.generation),
        }
    }

    pub fn run<F, T>(&self, load: F) -> impl Future<Output = Option<T>> + use<F, T>
    where
        F: Future<Output = T>,
    {
        let ticket = self.begin();
        async move {
            let value = load.await;
            if ticket.is_current() {
                Some(value)
            } else {
                debug!(generation = ticket.generation, "load superseded, dropping result");
                None
            }
        }
    }
}
