// Polling data store module
//
// This module contains the core store implementation including:
// - Observable fetch state and error types
// - Data source trait and closure adapter
// - Page-visibility signal
// - Observable data store
// - Visibility-aware polling data store

pub mod observable;
pub mod polling;
pub mod source;
pub mod state;
pub mod visibility;

// Re-export main components for easier access
pub use observable::{ObservableStore, Subscription};
pub use polling::PollingStore;
pub use source::{DataSource, FnSource};
pub use state::{FetchError, FetchState};
pub use visibility::{visibility_channel, VisibilityHandle, VisibilitySignal};
