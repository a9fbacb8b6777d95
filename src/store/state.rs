use serde::Serialize;
use thiserror::Error;

/// Error captured into the observable state when a fetch fails
///
/// The store broadcasts state snapshots to many subscribers, so the error is
/// flattened to its display chain rather than carrying the source error itself.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("fetch failed: {0}")]
pub struct FetchError(String);

impl FetchError {
    /// Creates a fetch error from the underlying source error
    ///
    /// # Arguments
    ///
    /// * `err` - The error returned by the data source
    ///
    /// # Returns
    ///
    /// A cloneable FetchError carrying the full error chain
    pub fn new(err: &anyhow::Error) -> Self {
        FetchError(format!("{:#}", err))
    }

    /// Gets the flattened error message
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// The result of the last fetch, as observed by subscribers
///
/// At most one of `data`/`error` is populated once a fetch has completed.
/// Both are `None` only before the first fetch or after a reset.
/// `is_loading` is true only while a fetch is outstanding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchState<T> {
    /// The most recently fetched value, retained across a failed refresh
    pub data: Option<T>,

    /// The error from the last fetch, cleared when a new fetch begins
    pub error: Option<FetchError>,

    /// Whether a fetch is currently outstanding
    pub is_loading: bool,
}

impl<T> FetchState<T> {
    /// Creates the initial empty state
    ///
    /// # Returns
    ///
    /// A state with no data, no error, and no fetch outstanding
    pub fn empty() -> Self {
        FetchState {
            data: None,
            error: None,
            is_loading: false,
        }
    }

    /// Checks whether the last fetch failed
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        FetchState::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state() {
        let state: FetchState<u64> = FetchState::empty();

        assert_eq!(state.data, None);
        assert_eq!(state.error, None);
        assert!(!state.is_loading);
        assert!(!state.has_error());
    }

    #[test]
    fn test_default_is_empty() {
        let state: FetchState<String> = FetchState::default();
        assert_eq!(state, FetchState::empty());
    }

    #[test]
    fn test_fetch_error_message() {
        let err = anyhow::anyhow!("connection refused").context("tip query failed");
        let fetch_err = FetchError::new(&err);

        assert_eq!(fetch_err.message(), "tip query failed: connection refused");
        assert_eq!(
            fetch_err.to_string(),
            "fetch failed: tip query failed: connection refused"
        );
    }

    #[test]
    fn test_state_serializes() {
        let state = FetchState {
            data: Some(42u64),
            error: None,
            is_loading: false,
        };

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"data":42,"error":null,"is_loading":false}"#);
    }
}
