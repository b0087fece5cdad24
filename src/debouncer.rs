//! Debounced layout persistence.
//!
//! Drag and resize events arrive in bursts. Each event replaces the pending
//! snapshot and re-arms a single timer; only when the timer expires without
//! being replaced is the snapshot written to storage. There is never more
//! than one pending save.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::DashboardError;
use crate::storage::WidgetStorage;
use crate::types::{Rectangle, Widget};

/// Default settling window before a layout is saved (1 second)
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Called with the widgets storage reports as updated after a save.
pub type SaveListener = Arc<dyn Fn(&[Widget]) + Send + Sync>;

#[derive(Default)]
struct PendingState {
    /// Bumped on every schedule/cancel; a timer only fires for its own generation
    generation: u64,
    snapshot: Option<Vec<Rectangle>>,
    timer: Option<JoinHandle<()>>,
    /// Timers that already took their snapshot and are mid-save
    in_flight: Vec<JoinHandle<()>>,
}

impl PendingState {
    /// Detach the armed timer. One that is still waiting is aborted; one
    /// whose save has started is kept in `in_flight`.
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            if self.snapshot.is_some() {
                timer.abort();
            } else {
                self.in_flight.retain(|h| !h.is_finished());
                self.in_flight.push(timer);
            }
        }
    }
}

pub struct PersistenceDebouncer {
    storage: Arc<dyn WidgetStorage>,
    window: Duration,
    state: Arc<Mutex<PendingState>>,
    listener: Arc<Mutex<Option<SaveListener>>>,
}

impl PersistenceDebouncer {
    pub fn new(storage: Arc<dyn WidgetStorage>, window: Duration) -> Self {
        Self {
            storage,
            window,
            state: Arc::new(Mutex::new(PendingState::default())),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Register the callback that receives saved widgets.
    pub fn set_listener(&self, listener: SaveListener) {
        *self.listener.lock() = Some(listener);
    }

    /// Replace the pending snapshot and restart the settling timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, layout: Vec<Rectangle>) {
        let mut state = self.state.lock();
        state.disarm();

        state.generation += 1;
        let generation = state.generation;
        state.snapshot = Some(layout);

        let shared = Arc::clone(&self.state);
        let storage = Arc::clone(&self.storage);
        let listener = Arc::clone(&self.listener);
        let window = self.window;

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;

            let snapshot = {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.snapshot.take()
            };

            if let Some(snapshot) = snapshot {
                persist(storage.as_ref(), &listener, snapshot).await;
            }
        }));

        log::debug!(
            "Debouncer: save scheduled in {}ms (generation {})",
            window.as_millis(),
            generation
        );
    }

    /// Save the pending snapshot now instead of waiting for the timer.
    /// Returns once every save already under way has finished too.
    pub async fn flush(&self) {
        let (snapshot, in_flight) = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.disarm();
            (state.snapshot.take(), std::mem::take(&mut state.in_flight))
        };

        // Older saves land first so the newest snapshot wins.
        for handle in in_flight {
            let _ = handle.await;
        }

        if let Some(snapshot) = snapshot {
            log::debug!("Debouncer: flushing pending layout");
            persist(self.storage.as_ref(), &self.listener, snapshot).await;
        }
    }

    /// Drop the pending snapshot and its timer.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if state.snapshot.is_some() {
            log::debug!("Debouncer: pending save cancelled");
        }
        state.disarm();
        state.snapshot = None;
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().snapshot.is_some()
    }
}

impl Drop for PersistenceDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn persist(
    storage: &dyn WidgetStorage,
    listener: &Mutex<Option<SaveListener>>,
    snapshot: Vec<Rectangle>,
) {
    if snapshot.is_empty() {
        log::debug!("Debouncer: empty layout, nothing to save");
        return;
    }

    match storage.save_layout(&snapshot).await {
        Ok(updated) => {
            log::debug!(
                "Debouncer: saved layout of {} widgets ({} updated)",
                snapshot.len(),
                updated.len()
            );
            let listener = listener.lock().clone();
            if let Some(listener) = listener {
                listener(&updated);
            }
        }
        Err(e) => {
            // Live layout stays as is; the next change or a reload heals it.
            log::warn!("Debouncer: {}", DashboardError::LayoutSaveFailed(e));
        }
    }
}
