//! Dashboard facade: one widget collection, one live layout, one debouncer
//! and one refresher per mounted widget.
//!
//! The presentation layer talks to this type only. It reports grid events
//! through `on_layout_changed`, reads `effective_layout` to draw, and polls
//! `widget_state` for each card.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::DashboardConfig;
use crate::debouncer::PersistenceDebouncer;
use crate::error::{DashboardError, StorageError};
use crate::feed::MarketDataSource;
use crate::grid;
use crate::reconciler::LayoutReconciler;
use crate::registry::{DefaultSize, WidgetRegistry};
use crate::scheduler::{RefreshHandle, RefreshState, RefreshWatch};
use crate::storage::WidgetStorage;
use crate::types::{Period, Rectangle, Widget, WidgetConfig, WidgetId, WidgetKind};

pub struct Dashboard {
    config: DashboardConfig,
    registry: Arc<WidgetRegistry>,
    reconciler: Arc<LayoutReconciler>,
    source: Arc<dyn MarketDataSource>,
    narrow_viewport: AtomicBool,
    refreshers: Mutex<HashMap<WidgetId, RefreshHandle>>,
}

impl Dashboard {
    pub fn new(
        config: DashboardConfig,
        storage: Arc<dyn WidgetStorage>,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        let debouncer = Arc::new(PersistenceDebouncer::new(
            Arc::clone(&storage),
            config.save_debounce(),
        ));
        let reconciler = Arc::new(LayoutReconciler::new(Arc::clone(&debouncer)));
        let registry = Arc::new(WidgetRegistry::new(
            storage,
            Arc::clone(&reconciler),
            DefaultSize {
                w: config.default_widget_width,
                h: config.default_widget_height,
            },
        ));

        // Weak so the debouncer (owned through the registry) does not keep
        // the registry alive.
        let weak: Weak<WidgetRegistry> = Arc::downgrade(&registry);
        debouncer.set_listener(Arc::new(move |saved: &[Widget]| {
            if let Some(registry) = weak.upgrade() {
                registry.apply_saved_layouts(saved);
            }
        }));

        Self {
            config,
            registry,
            reconciler,
            source,
            narrow_viewport: AtomicBool::new(false),
            refreshers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Load widgets from storage and mount a refresher for each.
    pub async fn load(&self) -> Result<Vec<Widget>, StorageError> {
        let widgets = self.registry.load().await?;
        let mut refreshers = self.refreshers.lock();
        refreshers.clear();
        for widget in &widgets {
            refreshers.insert(widget.id, self.mount(widget));
        }
        Ok(widgets)
    }

    pub fn widgets(&self) -> Vec<Widget> {
        self.registry.widgets()
    }

    pub fn widget(&self, id: WidgetId) -> Option<Widget> {
        self.registry.get(id)
    }

    /// Add a widget of `kind`. A missing or blank name falls back to the
    /// type's label.
    pub async fn add_widget(
        &self,
        name: Option<&str>,
        kind: WidgetKind,
    ) -> Result<Widget, DashboardError> {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => kind.label().to_string(),
        };
        let widget = self
            .registry
            .add(&name, kind, WidgetConfig::default(), self.columns())
            .await?;
        self.refreshers
            .lock()
            .insert(widget.id, self.mount(&widget));
        Ok(widget)
    }

    /// Rename or retype a widget. A type change remounts its refresher on
    /// the period the user had selected.
    pub async fn edit_widget(
        &self,
        id: WidgetId,
        name: &str,
        kind: WidgetKind,
    ) -> Result<Widget, DashboardError> {
        let previous = self.registry.get(id);
        let widget = self.registry.edit(id, name, kind).await?;

        // Not in the collection, so nothing is rendered or mounted for it.
        let Some(previous) = previous else {
            return Ok(widget);
        };

        if previous.kind != widget.kind {
            let period = self
                .widget_state(id)
                .map(|state| state.period)
                .unwrap_or_else(|| widget.initial_period(self.config.default_period));
            log::debug!("Dashboard: widget {} changed type, remounting on {}", id, period);
            self.refreshers
                .lock()
                .insert(widget.id, self.mount_on(&widget, period));
        }
        Ok(widget)
    }

    pub async fn delete_widget(&self, id: WidgetId) -> Result<(), DashboardError> {
        self.registry.delete(id).await?;
        self.refreshers.lock().remove(&id);
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<(), DashboardError> {
        self.registry.delete_all().await?;
        self.refreshers.lock().clear();
        Ok(())
    }

    /// Grid event: the user finished a drag or resize.
    pub fn on_layout_changed(&self, layout: Vec<Rectangle>) {
        self.reconciler.on_layout_changed(layout);
    }

    /// Every widget with the rectangle it should be drawn at.
    pub fn effective_layout(&self) -> Vec<(Widget, Rectangle)> {
        let columns = self.columns();
        self.registry
            .widgets()
            .into_iter()
            .map(|w| {
                let rect = self.reconciler.effective_rectangle(&w, columns);
                (w, rect)
            })
            .collect()
    }

    pub fn set_narrow_viewport(&self, narrow: bool) {
        let was = self.narrow_viewport.swap(narrow, Ordering::SeqCst);
        if was != narrow {
            log::debug!("Dashboard: {} columns", self.columns());
        }
    }

    pub fn columns(&self) -> u32 {
        grid::column_count_with(
            self.narrow_viewport.load(Ordering::SeqCst),
            self.config.desktop_columns,
        )
    }

    /// Manual refresh. Returns false if the widget is not mounted.
    pub fn refresh_widget(&self, id: WidgetId) -> bool {
        match self.refreshers.lock().get(&id) {
            Some(handle) => {
                handle.refresh_now();
                true
            }
            None => false,
        }
    }

    /// Switch a widget's period. Returns false if the widget is not mounted
    /// or its type has no period selector.
    pub fn set_period(&self, id: WidgetId, period: Period) -> bool {
        let selectable = self
            .registry
            .get(id)
            .is_some_and(|w| w.kind.has_period_selector());
        if !selectable {
            log::debug!("Dashboard: widget {} has no period selector", id);
            return false;
        }

        match self.refreshers.lock().get(&id) {
            Some(handle) => {
                handle.set_period(period);
                true
            }
            None => false,
        }
    }

    pub fn widget_state(&self, id: WidgetId) -> Option<RefreshState> {
        self.refreshers.lock().get(&id).map(RefreshHandle::snapshot)
    }

    pub fn watch(&self, id: WidgetId) -> Option<RefreshWatch> {
        self.refreshers.lock().get(&id).map(RefreshHandle::watch)
    }

    /// Save any pending layout and stop every refresher.
    pub async fn shutdown(&self) {
        self.reconciler.debouncer().flush().await;
        let count = {
            let mut refreshers = self.refreshers.lock();
            let count = refreshers.len();
            refreshers.clear();
            count
        };
        log::info!("Dashboard: shut down ({} refreshers stopped)", count);
    }

    fn mount(&self, widget: &Widget) -> RefreshHandle {
        self.mount_on(widget, widget.initial_period(self.config.default_period))
    }

    fn mount_on(&self, widget: &Widget, period: Period) -> RefreshHandle {
        RefreshHandle::spawn(
            widget,
            period,
            Arc::clone(&self.source),
            self.config.refresh_options(),
        )
    }
}
