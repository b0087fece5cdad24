//! Live layout vs persisted layout.
//!
//! The live layout is what the user currently sees after dragging and
//! resizing. It lives in a plain cell outside any change-notification
//! path: reading it never schedules work, and only `on_layout_changed`
//! writes it. That separation keeps "render emits layout event" and
//! "layout event triggers render" from feeding each other.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::debouncer::PersistenceDebouncer;
use crate::grid;
use crate::types::{Rectangle, Widget};

pub struct LayoutReconciler {
    live: Mutex<Vec<Rectangle>>,
    debouncer: Arc<PersistenceDebouncer>,
}

impl LayoutReconciler {
    pub fn new(debouncer: Arc<PersistenceDebouncer>) -> Self {
        Self {
            live: Mutex::new(Vec::new()),
            debouncer,
        }
    }

    /// Committed live layout, in the order the grid reported it.
    pub fn live_layout(&self) -> Vec<Rectangle> {
        self.live.lock().clone()
    }

    /// Where to draw `widget`: its live rectangle if the user has moved
    /// anything this session, otherwise its persisted rectangle raised to
    /// the grid minimums and fitted to the current column count.
    pub fn effective_rectangle(&self, widget: &Widget, columns: u32) -> Rectangle {
        let key = widget.key();
        if let Some(rect) = self.live.lock().iter().find(|r| r.i == key) {
            return rect.clone();
        }
        grid::clamp_rectangle(&grid::normalize(&widget.layout), columns).with_key(key)
    }

    /// Single mutation point for grid events. Replaces the whole live
    /// layout and hands the same snapshot to the debouncer.
    pub fn on_layout_changed(&self, layout: Vec<Rectangle>) {
        *self.live.lock() = layout.clone();
        self.debouncer.schedule(layout);
    }

    /// Effective rectangles for every widget, i.e. the grid as the user
    /// currently sees it. New widgets are placed against this.
    pub fn visible_layout(&self, widgets: &[Widget], columns: u32) -> Vec<Rectangle> {
        widgets
            .iter()
            .map(|w| self.effective_rectangle(w, columns))
            .collect()
    }

    /// Drop one widget's live rectangle. Must run before the registry
    /// forgets the widget.
    pub fn remove(&self, key: &str) {
        self.live.lock().retain(|r| r.i != key);
    }

    pub fn clear(&self) {
        self.live.lock().clear();
        self.debouncer.cancel();
    }

    pub fn debouncer(&self) -> &Arc<PersistenceDebouncer> {
        &self.debouncer
    }
}
