use tokio::sync::watch;

/// Creates a linked visibility handle and signal
///
/// The host keeps the [`VisibilityHandle`] and flips it as its page (or
/// window, or session) becomes hidden and visible again; stores watch the
/// [`VisibilitySignal`] side.
///
/// # Arguments
///
/// * `initially_hidden` - Whether the page starts out hidden
///
/// # Returns
///
/// The host-side handle and the store-side signal
pub fn visibility_channel(initially_hidden: bool) -> (VisibilityHandle, VisibilitySignal) {
    let (tx, rx) = watch::channel(initially_hidden);
    (VisibilityHandle { tx }, VisibilitySignal { rx })
}

/// Host-side sender for page-visibility transitions
#[derive(Debug)]
pub struct VisibilityHandle {
    tx: watch::Sender<bool>,
}

impl VisibilityHandle {
    /// Records a visibility transition
    ///
    /// Redundant updates (setting the flag to its current value) do not
    /// notify watchers.
    ///
    /// # Arguments
    ///
    /// * `hidden` - true if the page just became hidden, false if visible
    pub fn set_hidden(&self, hidden: bool) {
        self.tx.send_if_modified(|current| {
            if *current != hidden {
                *current = hidden;
                true
            } else {
                false
            }
        });
    }
}

/// Store-side view of the page-visibility state
#[derive(Debug, Clone)]
pub struct VisibilitySignal {
    rx: watch::Receiver<bool>,
}

impl VisibilitySignal {
    /// Checks whether the page is currently hidden
    pub fn is_hidden(&self) -> bool {
        *self.rx.borrow()
    }

    /// Gets a receiver that wakes on every subsequent visibility transition
    pub(crate) fn changes(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}
