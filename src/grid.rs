//! Grid geometry: column counts, widget keys and rectangle clamping.
//!
//! Persisted rectangles may have been saved under a different column
//! count (a wider viewport in an earlier session), so every rectangle read
//! back from storage goes through [`clamp_rectangle`].

use crate::types::{Rectangle, WidgetId};

/// Column count on desktop viewports
pub const DESKTOP_COLUMNS: u32 = 6;

/// Column count on narrow viewports
pub const NARROW_COLUMNS: u32 = 1;

/// Minimum visual height of a widget, in rows
pub const MIN_HEIGHT: u32 = 2;

const KEY_PREFIX: &str = "widget_";

/// Number of grid columns for the current viewport.
pub fn column_count(is_narrow_viewport: bool) -> u32 {
    column_count_with(is_narrow_viewport, DESKTOP_COLUMNS)
}

/// Same as [`column_count`] with a configured desktop column count.
pub fn column_count_with(is_narrow_viewport: bool, desktop_columns: u32) -> u32 {
    if is_narrow_viewport {
        NARROW_COLUMNS
    } else {
        desktop_columns.max(1)
    }
}

/// Fit a rectangle into `columns`: width shrinks to the grid, then x shifts
/// left until `x + w <= columns`. `y` and `h` are preserved.
pub fn clamp_rectangle(rect: &Rectangle, columns: u32) -> Rectangle {
    let columns = columns.max(1);
    let w = rect.w.clamp(1, columns);
    let x = rect.x.min(columns - w);
    Rectangle {
        i: rect.i.clone(),
        x,
        y: rect.y,
        w,
        h: rect.h,
    }
}

/// Raise width and height to their minimums.
pub fn normalize(rect: &Rectangle) -> Rectangle {
    Rectangle {
        w: rect.w.max(1),
        h: rect.h.max(MIN_HEIGHT),
        ..rect.clone()
    }
}

/// Whether a rectangle satisfies every grid invariant for `columns`.
pub fn fits(rect: &Rectangle, columns: u32) -> bool {
    rect.w >= 1 && rect.h >= MIN_HEIGHT && rect.right() <= columns
}

/// Layout key for a widget id.
pub fn widget_key(id: WidgetId) -> String {
    format!("{}{}", KEY_PREFIX, id)
}

/// Widget id from a layout key. Accepts `widget_{n}` or a bare integer.
pub fn parse_widget_key(key: &str) -> Option<WidgetId> {
    key.strip_prefix(KEY_PREFIX).unwrap_or(key).parse().ok()
}
