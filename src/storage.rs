//! Widget storage collaborator.
//!
//! The engine never persists anything itself; every durable change goes
//! through [`WidgetStorage`]. [`MemoryStorage`] is an in-process
//! implementation with the same semantics as the widget API server.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::error::StorageError;
use crate::grid;
use crate::types::{Rectangle, Widget, WidgetId, WidgetPatch, WidgetSpec};

/// Maximum widget name length accepted by storage.
pub const MAX_NAME_LEN: usize = 100;

#[async_trait]
pub trait WidgetStorage: Send + Sync {
    async fn list(&self) -> Result<Vec<Widget>, StorageError>;

    async fn create(&self, spec: WidgetSpec) -> Result<Widget, StorageError>;

    async fn update(&self, id: WidgetId, patch: WidgetPatch) -> Result<Widget, StorageError>;

    async fn delete(&self, id: WidgetId) -> Result<(), StorageError>;

    async fn delete_all(&self) -> Result<(), StorageError>;

    /// Replace the stored layout wholesale. Returns the widgets whose
    /// layout was updated.
    async fn save_layout(&self, layouts: &[Rectangle]) -> Result<Vec<Widget>, StorageError>;
}

/// Trim and validate a widget name the way storage does.
pub fn validate_name(name: &str) -> Result<String, StorageError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StorageError::Invalid(
            "name cannot be empty or whitespace".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(StorageError::Invalid(format!(
            "name longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Default)]
struct MemoryState {
    widgets: Vec<Widget>,
    next_id: WidgetId,
    /// When set, every call fails with `Unavailable`
    offline: bool,
}

/// In-process widget storage.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
    layout_saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed storage with existing widgets; ids continue after the largest.
    pub fn with_widgets(widgets: Vec<Widget>) -> Self {
        let next_id = widgets.iter().map(|w| w.id).max().unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState {
                widgets,
                next_id,
                offline: false,
            }),
            layout_saves: AtomicUsize::new(0),
        }
    }

    /// Simulate an unreachable server.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Number of successful `save_layout` calls.
    pub fn layout_saves(&self) -> usize {
        self.layout_saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<Widget> {
        self.state.lock().widgets.clone()
    }

    fn check_online(state: &MemoryState) -> Result<(), StorageError> {
        if state.offline {
            Err(StorageError::Unavailable("storage offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WidgetStorage for MemoryStorage {
    async fn list(&self) -> Result<Vec<Widget>, StorageError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.widgets.clone())
    }

    async fn create(&self, spec: WidgetSpec) -> Result<Widget, StorageError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        let name = validate_name(&spec.name)?;
        if spec.layout.w == 0 || spec.layout.h == 0 {
            return Err(StorageError::Invalid(
                "layout width and height must be at least 1".to_string(),
            ));
        }

        state.next_id += 1;
        let id = state.next_id;
        let widget = Widget {
            id,
            name,
            kind: spec.kind,
            config: spec.config,
            layout: spec.layout.with_key(grid::widget_key(id)),
            created_at: Utc::now(),
            updated_at: None,
        };
        state.widgets.push(widget.clone());
        Ok(widget)
    }

    async fn update(&self, id: WidgetId, patch: WidgetPatch) -> Result<Widget, StorageError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let widget = state
            .widgets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(StorageError::NotFound(id))?;

        if let Some(name) = name {
            widget.name = name;
        }
        if let Some(kind) = patch.kind {
            widget.kind = kind;
        }
        widget.updated_at = Some(Utc::now());
        Ok(widget.clone())
    }

    async fn delete(&self, id: WidgetId) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        let before = state.widgets.len();
        state.widgets.retain(|w| w.id != id);
        if state.widgets.len() == before {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        state.widgets.clear();
        Ok(())
    }

    async fn save_layout(&self, layouts: &[Rectangle]) -> Result<Vec<Widget>, StorageError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        if layouts.is_empty() {
            return Err(StorageError::Invalid(
                "layouts list cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let mut updated = Vec::new();
        for rect in layouts {
            // Keys that are not widget ids, and ids that no longer exist,
            // are skipped rather than rejected.
            let Some(id) = grid::parse_widget_key(&rect.i) else {
                continue;
            };
            if let Some(widget) = state.widgets.iter_mut().find(|w| w.id == id) {
                widget.layout = rect.clone();
                widget.updated_at = Some(now);
                updated.push(widget.clone());
            }
        }

        self.layout_saves.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }
}
