//! In-memory widget collection backed by the storage collaborator.
//!
//! Widget mutations are remote-then-local: nothing changes locally unless
//! storage accepted the request. Layout changes do not go through here;
//! they are local-first via the reconciler.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{DashboardError, StorageError};
use crate::packer;
use crate::reconciler::LayoutReconciler;
use crate::storage::{self, WidgetStorage};
use crate::types::{Widget, WidgetConfig, WidgetId, WidgetKind, WidgetPatch, WidgetSpec};

/// Size of a newly added widget, in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSize {
    pub w: u32,
    pub h: u32,
}

impl Default for DefaultSize {
    fn default() -> Self {
        Self { w: 3, h: 3 }
    }
}

pub struct WidgetRegistry {
    widgets: Mutex<Vec<Widget>>,
    storage: Arc<dyn WidgetStorage>,
    reconciler: Arc<LayoutReconciler>,
    default_size: DefaultSize,
}

impl WidgetRegistry {
    pub fn new(
        storage: Arc<dyn WidgetStorage>,
        reconciler: Arc<LayoutReconciler>,
        default_size: DefaultSize,
    ) -> Self {
        Self {
            widgets: Mutex::new(Vec::new()),
            storage,
            reconciler,
            default_size,
        }
    }

    /// Replace the local collection with what storage holds.
    pub async fn load(&self) -> Result<Vec<Widget>, StorageError> {
        let widgets = self.storage.list().await?;
        log::info!("Registry: loaded {} widgets", widgets.len());
        *self.widgets.lock() = widgets.clone();
        Ok(widgets)
    }

    pub fn widgets(&self) -> Vec<Widget> {
        self.widgets.lock().clone()
    }

    pub fn get(&self, id: WidgetId) -> Option<Widget> {
        self.widgets.lock().iter().find(|w| w.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.widgets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a widget placed after the last one the user can see.
    pub async fn add(
        &self,
        name: &str,
        kind: WidgetKind,
        config: WidgetConfig,
        columns: u32,
    ) -> Result<Widget, DashboardError> {
        let name = storage::validate_name(name).map_err(DashboardError::CreationFailed)?;

        let visible = self.reconciler.visible_layout(&self.widgets(), columns);
        let layout = packer::place(&visible, self.default_size.w, self.default_size.h, columns);

        let spec = WidgetSpec {
            name,
            kind,
            config,
            layout,
        };
        let created = match self.storage.create(spec).await {
            Ok(widget) => widget,
            Err(e) => {
                let err = DashboardError::CreationFailed(e);
                log::warn!("Registry: {}", err);
                return Err(err);
            }
        };

        log::info!(
            "Registry: added widget {} ({}) at ({}, {}) {}x{}",
            created.id,
            created.kind,
            created.layout.x,
            created.layout.y,
            created.layout.w,
            created.layout.h
        );
        self.widgets.lock().push(created.clone());
        Ok(created)
    }

    /// Rename and/or retype a widget. Layout is never touched.
    pub async fn edit(
        &self,
        id: WidgetId,
        name: &str,
        kind: WidgetKind,
    ) -> Result<Widget, DashboardError> {
        let name = storage::validate_name(name)
            .map_err(|source| DashboardError::UpdateFailed { id, source })?;

        let patch = WidgetPatch {
            name: Some(name),
            kind: Some(kind),
        };
        let remote = match self.storage.update(id, patch).await {
            Ok(widget) => widget,
            Err(source) => {
                let err = DashboardError::UpdateFailed { id, source };
                log::warn!("Registry: {}", err);
                return Err(err);
            }
        };

        let mut widgets = self.widgets.lock();
        match widgets.iter_mut().find(|w| w.id == id) {
            Some(local) => {
                local.name = remote.name;
                local.kind = remote.kind;
                local.updated_at = remote.updated_at.or_else(|| Some(Utc::now()));
                log::info!("Registry: edited widget {}", id);
                Ok(local.clone())
            }
            None => Ok(remote),
        }
    }

    /// Delete one widget. Ids not held locally are ignored.
    pub async fn delete(&self, id: WidgetId) -> Result<(), DashboardError> {
        let Some(widget) = self.get(id) else {
            log::debug!("Registry: delete of unknown widget {} ignored", id);
            return Ok(());
        };

        match self.storage.delete(id).await {
            Ok(()) => {}
            // Already gone remotely; finish the local half.
            Err(StorageError::NotFound(_)) => {
                log::warn!("Registry: widget {} was already deleted in storage", id);
            }
            Err(e) => {
                let err = DashboardError::DeletionFailed(e);
                log::warn!("Registry: {}", err);
                return Err(err);
            }
        }

        // Live geometry goes first so a stale rectangle cannot resurface
        // in the next placement.
        self.reconciler.remove(&widget.key());
        self.widgets.lock().retain(|w| w.id != id);
        log::info!("Registry: deleted widget {}", id);
        Ok(())
    }

    /// Delete every widget.
    pub async fn delete_all(&self) -> Result<(), DashboardError> {
        if let Err(e) = self.storage.delete_all().await {
            let err = DashboardError::DeletionFailed(e);
            log::warn!("Registry: {}", err);
            return Err(err);
        }

        self.reconciler.clear();
        let removed = {
            let mut widgets = self.widgets.lock();
            let count = widgets.len();
            widgets.clear();
            count
        };
        log::info!("Registry: deleted all {} widgets", removed);
        Ok(())
    }

    /// Record layouts storage confirmed as saved.
    pub fn apply_saved_layouts(&self, saved: &[Widget]) {
        let mut widgets = self.widgets.lock();
        for record in saved {
            if let Some(local) = widgets.iter_mut().find(|w| w.id == record.id) {
                local.layout = record.layout.clone();
                local.updated_at = record.updated_at;
            }
        }
    }
}
