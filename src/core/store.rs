//! Observable holder of the latest rate fetch outcome.

use crate::core::currency::{CurrencyCode, RateFetcher, RateSnapshot};
use crate::core::error::FetchError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Outcome of the most recent refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Loaded(RateSnapshot),
    Failed(FetchError),
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn snapshot(&self) -> Option<&RateSnapshot> {
        match self {
            FetchState::Loaded(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(FetchError::user_message)
    }
}

/// Holds the state of the rate pipeline and publishes every transition.
///
/// State is only written by [`RateStore::refresh`]. Observers get read-only
/// [`watch::Receiver`]s from [`RateStore::subscribe`]; each transition is
/// published on the task that drives the refresh.
///
/// Overlapping refreshes are ordered by the time they were issued: a refresh
/// that completes after a newer one has started drops its outcome, so a slow
/// reply for an old base currency can't replace the current one.
pub struct RateStore {
    fetcher: Arc<dyn RateFetcher>,
    state: watch::Sender<FetchState>,
    latest_ticket: AtomicU64,
}

impl RateStore {
    pub fn new(fetcher: Arc<dyn RateFetcher>) -> Self {
        let (state, _) = watch::channel(FetchState::Idle);
        RateStore {
            fetcher,
            state,
            latest_ticket: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn snapshot(&self) -> Option<RateSnapshot> {
        self.state.borrow().snapshot().cloned()
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.borrow().error_message()
    }

    /// Fetches rates for `base` and publishes the outcome.
    ///
    /// The returned future is cancel safe. Dropping it before the fetch
    /// finishes puts the store back to [`FetchState::Idle`], unless a newer
    /// refresh has started since, in which case that one owns the state.
    #[instrument(name = "RateRefresh", skip(self), fields(base = %base))]
    pub async fn refresh(&self, base: &CurrencyCode) {
        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(FetchState::Loading);
        let mut pending = PendingRefresh {
            store: self,
            ticket,
            settled: false,
        };

        let outcome = self.fetcher.fetch(base).await;
        pending.settled = true;

        let next = match outcome {
            Ok(snapshot) => {
                info!(rates = snapshot.rates.len(), "Rates loaded");
                FetchState::Loaded(snapshot)
            }
            Err(err) => {
                warn!(error = %err, "Rate refresh failed");
                FetchState::Failed(err)
            }
        };
        if !self.publish(ticket, next) {
            debug!(ticket, "Discarding superseded rate response");
        }
    }

    /// Replaces the state only while `ticket` is the latest one issued.
    ///
    /// The ticket is compared under the channel's write lock, and a new
    /// refresh takes its ticket before it publishes `Loading`, so an outcome
    /// published here can't land on top of a newer request.
    fn publish(&self, ticket: u64, next: FetchState) -> bool {
        self.state.send_if_modified(|state| {
            if self.latest_ticket.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *state = next;
            true
        })
    }
}

/// Settles a refresh whose future was dropped mid-fetch.
struct PendingRefresh<'a> {
    store: &'a RateStore,
    ticket: u64,
    settled: bool,
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        if !self.settled && self.store.publish(self.ticket, FetchState::Idle) {
            debug!(ticket = self.ticket, "Rate refresh cancelled");
        }
    }
}
