//! Layout and refresh engine for a grid dashboard of gold-market widgets.
//!
//! Widgets live on a fixed-column grid. The user drags and resizes them
//! freely; layout changes are applied locally at once and saved to storage
//! after a short settling window. Each widget refreshes its own market data
//! on a countdown, independent of every other widget.

pub mod config;
pub mod dashboard;
pub mod debouncer;
pub mod error;
pub mod feed;
pub mod grid;
pub mod packer;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod types;

pub use config::{load_config, DashboardConfig};
pub use dashboard::Dashboard;
pub use error::{DashboardError, FetchError, StorageError, WidgetError};
pub use feed::{MarketDataSource, WidgetData};
pub use scheduler::{GaugeColor, RefreshState};
pub use storage::{MemoryStorage, WidgetStorage};
pub use types::{Period, Rectangle, Widget, WidgetId, WidgetKind};

/// Initialise `env_logger` with an `info` default, overridable via `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
