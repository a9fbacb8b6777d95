// A visibility-aware polling data store for blockchain front-end services
//
// Repeatedly fetches data from an injected asynchronous source on a fixed
// interval, exposes the latest result (or error) to subscribers, and pauses
// while the host page is hidden — without leaking timers, double-fetching,
// or racing stale requests against fresh ones.

pub mod store;

pub use store::{
    visibility_channel, DataSource, FetchError, FetchState, FnSource, ObservableStore,
    PollingStore, Subscription, VisibilityHandle, VisibilitySignal,
};
