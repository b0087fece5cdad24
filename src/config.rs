//! Dashboard configuration (~/.goldboard/config.json).
//!
//! Every field has a default, so a missing file or a partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::debouncer::DEFAULT_DEBOUNCE_MS;
use crate::grid::DESKTOP_COLUMNS;
use crate::scheduler::{RefreshOptions, DEFAULT_INTERVAL_SECS};
use crate::types::Period;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Grid columns on desktop viewports
    #[serde(default = "default_desktop_columns")]
    pub desktop_columns: u32,
    #[serde(default = "default_widget_width")]
    pub default_widget_width: u32,
    #[serde(default = "default_widget_height")]
    pub default_widget_height: u32,
    /// Settling window before a layout change is saved
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u32,
    /// Period for widgets whose config does not name one
    #[serde(default)]
    pub default_period: Period,
}

fn default_desktop_columns() -> u32 {
    DESKTOP_COLUMNS
}

fn default_widget_width() -> u32 {
    3
}

fn default_widget_height() -> u32 {
    3
}

fn default_save_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_refresh_interval_secs() -> u32 {
    DEFAULT_INTERVAL_SECS
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            desktop_columns: default_desktop_columns(),
            default_widget_width: default_widget_width(),
            default_widget_height: default_widget_height(),
            save_debounce_ms: default_save_debounce_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
            default_period: Period::default(),
        }
    }
}

impl DashboardConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            interval_secs: self.refresh_interval_secs,
            ..RefreshOptions::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.desktop_columns == 0 {
            return Err("desktopColumns must be at least 1".to_string());
        }
        if self.default_widget_width == 0 || self.default_widget_width > self.desktop_columns {
            return Err(format!(
                "defaultWidgetWidth must be between 1 and {}",
                self.desktop_columns
            ));
        }
        if self.default_widget_height < crate::grid::MIN_HEIGHT {
            return Err(format!(
                "defaultWidgetHeight must be at least {}",
                crate::grid::MIN_HEIGHT
            ));
        }
        if self.save_debounce_ms == 0 {
            return Err("saveDebounceMs must be greater than 0".to_string());
        }
        if self.refresh_interval_secs == 0 {
            return Err("refreshIntervalSecs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Get the canonical config file path (~/.goldboard/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".goldboard").join("config.json"))
}

/// Load configuration from the canonical path, falling back to defaults
/// when no file exists.
pub fn load_config() -> Result<DashboardConfig, String> {
    load_config_from(&config_path()?)
}

/// Load and validate configuration from `path`.
pub fn load_config_from(path: &Path) -> Result<DashboardConfig, String> {
    if !path.exists() {
        log::info!("Config: {} not found, using defaults", path.display());
        return Ok(DashboardConfig::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    let config: DashboardConfig =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;

    config.validate()?;
    Ok(config)
}
