use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::observable::{ObservableStore, Subscription};
use super::source::DataSource;
use super::state::FetchState;
use super::visibility::VisibilitySignal;

/// Mutable lifecycle state, guarded by one mutex
///
/// The generation token and resume arguments must be read and written
/// together: a continuation's token check and a concurrent token increment
/// must never interleave.
struct PollControl<A> {
    /// Generation token; any increment invalidates all scheduled continuations
    current_poll_id: u64,

    /// The last `start` arguments, retained while ACTIVE or PAUSED
    resume_args: Option<A>,

    /// The visibility listener task, running while ACTIVE or PAUSED
    visibility_listener: Option<JoinHandle<()>>,
}

/// Drives repeated fetches through an [`ObservableStore`] on a fixed cadence
///
/// Polling pauses while the page is hidden and resumes when it becomes
/// visible again. A fetch error is terminal: the store stops itself and waits
/// for an explicit `start` to resume. In-flight fetches are never cancelled;
/// the generation token only discards their effect on state and scheduling.
pub struct PollingStore<S: DataSource> {
    /// The wrapped observable store
    store: ObservableStore<S>,

    /// Delay between a successful fetch and the next one
    fetch_interval: Duration,

    /// The externally supplied page-visibility collaborator
    visibility: VisibilitySignal,

    /// Lifecycle state shared with spawned continuations
    control: Arc<Mutex<PollControl<S::Args>>>,
}

impl<S: DataSource> Clone for PollingStore<S> {
    fn clone(&self) -> Self {
        PollingStore {
            store: self.store.clone(),
            fetch_interval: self.fetch_interval,
            visibility: self.visibility.clone(),
            control: Arc::clone(&self.control),
        }
    }
}

impl<S: DataSource> PollingStore<S> {
    /// Creates a new polling store in the STOPPED state
    ///
    /// # Arguments
    ///
    /// * `source` - The data source queried on each cycle
    /// * `fetch_interval` - Delay between a successful fetch and the next
    /// * `visibility` - The page-visibility signal to pause and resume on
    ///
    /// # Returns
    ///
    /// A new PollingStore instance
    pub fn new(source: S, fetch_interval: Duration, visibility: VisibilitySignal) -> Self {
        PollingStore {
            store: ObservableStore::new(source),
            fetch_interval,
            visibility,
            control: Arc::new(Mutex::new(PollControl {
                current_poll_id: 0,
                resume_args: None,
                visibility_listener: None,
            })),
        }
    }

    /// Starts (or restarts) polling with the given arguments
    ///
    /// Safe to call from any state: the token increment retires whatever
    /// cycle was running and a fresh one begins immediately. The visibility
    /// listener is registered idempotently.
    ///
    /// # Arguments
    ///
    /// * `args` - The arguments threaded through every fetch of this cycle
    pub fn start(&self, args: S::Args) {
        let mut control = self.control.lock().unwrap();
        self.arm(&mut control, args);
    }

    /// Re-arms polling under the control lock: fresh token, fresh cycle
    ///
    /// The visibility receiver is acquired and marked seen here, while the
    /// lock is held, so a transition landing before the listener task first
    /// polls is still observed rather than swallowed.
    fn arm(&self, control: &mut PollControl<S::Args>, args: S::Args) {
        control.current_poll_id += 1;
        control.resume_args = Some(args.clone());
        if control.visibility_listener.is_none() {
            let mut changes = self.visibility.changes();
            // transitions before registration are not events for this store
            changes.borrow_and_update();
            control.visibility_listener =
                Some(tokio::spawn(self.clone().listen_for_visibility(changes)));
        }

        let poll_id = control.current_poll_id;
        debug!("starting poll cycle {}", poll_id);
        tokio::spawn(self.clone().run_cycle(poll_id, args));
    }

    /// Stops polling and releases the visibility listener
    ///
    /// Guarantees no further state emissions, even if a fetch is in flight
    /// at this moment and resolves later.
    pub fn stop(&self) {
        let mut control = self.control.lock().unwrap();
        control.current_poll_id += 1;
        control.resume_args = None;
        if let Some(listener) = control.visibility_listener.take() {
            listener.abort();
        }
        debug!("polling stopped");
    }

    /// Stops polling and clears the underlying observable state
    pub fn reset(&self) {
        self.stop();
        self.store.reset();
    }

    /// Subscribes to state changes
    ///
    /// Every underlying state change is forwarded unchanged; see
    /// [`ObservableStore::subscribe`] for the delivery contract.
    pub fn subscribe(&self) -> Subscription<S::Output> {
        self.store.subscribe()
    }

    /// Gets the current snapshot without fetching
    pub fn state(&self) -> FetchState<S::Output> {
        self.store.state()
    }

    /// Gets the configured fetch interval
    pub fn fetch_interval(&self) -> Duration {
        self.fetch_interval
    }

    /// One fetch-then-wait loop, valid while `poll_id` stays current
    async fn run_cycle(self, poll_id: u64, args: S::Args) {
        loop {
            if !self.is_current(poll_id) {
                debug!("poll cycle {} is stale, dropping it", poll_id);
                return;
            }

            let committed = self
                .store
                .fetch_gated(&args, || self.is_current(poll_id))
                .await;
            let state = match committed {
                Some(state) => state,
                // a stop or pause invalidated the cycle mid-fetch
                None => return,
            };

            if let Some(err) = &state.error {
                warn!("polling halted: {}", err);
                self.stop();
                return;
            }

            tokio::time::sleep(self.fetch_interval).await;
        }
    }

    /// Reacts to visibility transitions while the store is ACTIVE or PAUSED
    ///
    /// The receiver is handed over by [`PollingStore::arm`] with the
    /// registration-time value already marked seen.
    async fn listen_for_visibility(self, mut changes: watch::Receiver<bool>) {
        loop {
            if changes.changed().await.is_err() {
                return;
            }
            let hidden = *changes.borrow_and_update();
            if hidden {
                self.pause();
            } else {
                self.resume();
            }
        }
    }

    /// Suspends the running cycle without forgetting how to restart it
    fn pause(&self) {
        let mut control = self.control.lock().unwrap();
        if control.resume_args.is_some() {
            control.current_poll_id += 1;
            debug!("page hidden, polling paused");
        }
    }

    /// Restarts polling with the retained arguments, if any
    ///
    /// The check and the re-arm happen in one critical section: a `stop`
    /// cannot land between them and be undone by a stale resume.
    fn resume(&self) {
        let mut control = self.control.lock().unwrap();
        if let Some(args) = control.resume_args.clone() {
            debug!("page visible, polling resumed");
            self.arm(&mut control, args);
        }
    }

    /// Checks a captured token against the current generation
    fn is_current(&self, poll_id: u64) -> bool {
        self.control.lock().unwrap().current_poll_id == poll_id
    }
}
