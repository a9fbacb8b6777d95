use dashmap::DashMap;
use log::debug;
use tokio::sync::mpsc;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::source::DataSource;
use super::state::{FetchError, FetchState};

type SubscriberMap<T> = Arc<DashMap<u64, mpsc::UnboundedSender<FetchState<T>>>>;

/// Single source of truth for the result of the last fetch
///
/// Wraps one [`DataSource`] and tracks the latest value, error, and loading
/// flag. Every state change is broadcast to all subscribers in the order it
/// occurred; no change is skipped or coalesced.
pub struct ObservableStore<S: DataSource> {
    /// The injected retrieval operation
    source: Arc<S>,

    /// The current observable snapshot
    state: Arc<Mutex<FetchState<S::Output>>>,

    /// Registered subscribers, keyed by subscription id
    subscribers: SubscriberMap<S::Output>,

    /// Next subscription id to hand out
    next_subscriber_id: Arc<AtomicU64>,
}

impl<S: DataSource> Clone for ObservableStore<S> {
    fn clone(&self) -> Self {
        ObservableStore {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            subscribers: Arc::clone(&self.subscribers),
            next_subscriber_id: Arc::clone(&self.next_subscriber_id),
        }
    }
}

impl<S: DataSource> ObservableStore<S> {
    /// Creates a new observable store in the initial empty state
    ///
    /// # Arguments
    ///
    /// * `source` - The data source queried on each `get_data` call
    ///
    /// # Returns
    ///
    /// A new ObservableStore instance
    pub fn new(source: S) -> Self {
        ObservableStore {
            source: Arc::new(source),
            state: Arc::new(Mutex::new(FetchState::empty())),
            subscribers: Arc::new(DashMap::new()),
            next_subscriber_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Gets the current snapshot without fetching
    pub fn state(&self) -> FetchState<S::Output> {
        self.state.lock().unwrap().clone()
    }

    /// Fetches a fresh value and folds the outcome into the observable state
    ///
    /// While the fetch is pending the state keeps the previous data with
    /// `is_loading: true`. On success the data is replaced; on failure the
    /// previous data is retained and the error is captured. Failures are
    /// never propagated as an `Err` — callers branch on `state.error`.
    ///
    /// # Arguments
    ///
    /// * `args` - The arguments passed through to the data source
    ///
    /// # Returns
    ///
    /// The updated observable state
    pub async fn get_data(&self, args: &S::Args) -> FetchState<S::Output> {
        self.fetch_gated(args, || true)
            .await
            .expect("admission always passes, so the commit is never suppressed")
    }

    /// Fetches a fresh value, committing state only while `admit` holds
    ///
    /// The admission check is evaluated under the state lock immediately
    /// before the loading transition and again before the completion commit.
    /// A suppressed commit updates nothing, emits nothing, and returns `None`;
    /// the in-flight fetch itself is never cancelled.
    pub(crate) async fn fetch_gated<F>(
        &self,
        args: &S::Args,
        admit: F,
    ) -> Option<FetchState<S::Output>>
    where
        F: Fn() -> bool + Send,
    {
        {
            let mut state = self.state.lock().unwrap();
            if !admit() {
                return None;
            }
            state.error = None;
            state.is_loading = true;
            self.publish(&state);
        }

        let outcome = self.source.fetch(args).await;

        let mut state = self.state.lock().unwrap();
        if !admit() {
            debug!("fetch completed after invalidation, discarding result");
            return None;
        }
        match outcome {
            Ok(value) => {
                state.data = Some(value);
                state.error = None;
            }
            Err(err) => {
                state.error = Some(FetchError::new(&err));
            }
        }
        state.is_loading = false;
        self.publish(&state);
        Some(state.clone())
    }

    /// Discards the memoized data and error and returns to the empty state
    ///
    /// Subscribers are notified synchronously.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        *state = FetchState::empty();
        self.publish(&state);
    }

    /// Subscribes to state changes
    ///
    /// The current state is delivered immediately, followed by every
    /// subsequent change in the order it occurred. Dropping the returned
    /// subscription deregisters it.
    ///
    /// # Returns
    ///
    /// A new Subscription instance
    pub fn subscribe(&self) -> Subscription<S::Output> {
        let (tx, rx) = mpsc::unbounded_channel();

        // hold the state lock so no change lands between the snapshot
        // delivery and the registration
        let state = self.state.lock().unwrap();
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let _ = tx.send(state.clone());
        self.subscribers.insert(id, tx);

        Subscription {
            id,
            rx,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Gets the number of live subscribers
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Sends a snapshot to every subscriber, dropping closed ones
    ///
    /// Callers must hold the state lock so snapshots arrive in commit order.
    fn publish(&self, state: &FetchState<S::Output>) {
        self.subscribers
            .retain(|_, tx| tx.send(state.clone()).is_ok());
    }
}

/// A live subscription to an [`ObservableStore`]
///
/// Receives every state change in order. Deregisters itself on drop.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<FetchState<T>>,
    subscribers: SubscriberMap<T>,
}

impl<T> Subscription<T> {
    /// Waits for the next state change
    ///
    /// # Returns
    ///
    /// The next state, or None if the store was dropped
    pub async fn recv(&mut self) -> Option<FetchState<T>> {
        self.rx.recv().await
    }

    /// Gets the next state change without waiting
    pub fn try_recv(&mut self) -> Option<FetchState<T>> {
        self.rx.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.subscribers.remove(&self.id);
    }
}
