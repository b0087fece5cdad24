//! Placement of newly created widgets.
//!
//! New widgets are appended to the end of the last used row and wrap to a
//! fresh row on overflow. Gaps elsewhere in the grid are not searched.

use crate::grid;
use crate::types::Rectangle;

/// Compute where a new `default_w` x `default_h` widget lands.
///
/// The returned rectangle carries an empty key; callers attach the widget
/// key once storage has assigned an id.
pub fn place(existing: &[Rectangle], default_w: u32, default_h: u32, columns: u32) -> Rectangle {
    let columns = columns.max(1);
    let w = default_w.clamp(1, columns);
    let h = default_h.max(grid::MIN_HEIGHT);

    let Some(max_bottom) = existing.iter().map(Rectangle::bottom).max() else {
        return Rectangle::new("", 0, 0, w, h);
    };

    // Rectangles ending within one row of the bottom form the last visual
    // row, even when compaction left them slightly staggered.
    let last_end_x = existing
        .iter()
        .filter(|r| r.bottom() + 1 >= max_bottom)
        .map(Rectangle::right)
        .max()
        .unwrap_or(0);

    if last_end_x + w > columns {
        return Rectangle::new("", 0, max_bottom, w, h);
    }

    Rectangle::new("", last_end_x, max_bottom.saturating_sub(h), w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u32, y: u32, w: u32, h: u32) -> Rectangle {
        Rectangle::new(format!("widget_{}{}", x, y), x, y, w, h)
    }

    fn geometry(r: &Rectangle) -> (u32, u32, u32, u32) {
        (r.x, r.y, r.w, r.h)
    }

    #[test]
    fn test_empty_grid_places_at_origin() {
        assert_eq!(geometry(&place(&[], 3, 3, 6)), (0, 0, 3, 3));
    }

    #[test]
    fn test_appends_to_half_used_row() {
        let existing = vec![rect(0, 0, 3, 3)];
        assert_eq!(geometry(&place(&existing, 3, 3, 6)), (3, 0, 3, 3));
    }

    #[test]
    fn test_full_row_wraps() {
        let existing = vec![rect(0, 0, 3, 3), rect(3, 0, 3, 3)];
        assert_eq!(geometry(&place(&existing, 3, 3, 6)), (0, 3, 3, 3));
    }

    #[test]
    fn test_staggered_last_row_is_treated_as_one_row() {
        // Bottoms at 6 and 5: both belong to the last visual row.
        let existing = vec![
            rect(0, 0, 6, 3),
            rect(0, 3, 2, 3),
            rect(2, 3, 2, 2),
        ];
        assert_eq!(geometry(&place(&existing, 2, 3, 6)), (4, 3, 2, 3));
    }

    #[test]
    fn test_rows_above_last_are_ignored() {
        let existing = vec![rect(0, 0, 5, 3), rect(0, 3, 2, 3)];
        assert_eq!(geometry(&place(&existing, 3, 3, 6)), (2, 3, 3, 3));
    }

    #[test]
    fn test_tall_widget_never_goes_above_zero() {
        let existing = vec![rect(0, 0, 2, 2)];
        assert_eq!(geometry(&place(&existing, 2, 5, 6)), (2, 0, 2, 5));
    }

    #[test]
    fn test_single_column_always_wraps() {
        let existing = vec![rect(0, 0, 1, 3)];
        assert_eq!(geometry(&place(&existing, 3, 3, 1)), (0, 3, 1, 3));
    }

    #[test]
    fn test_results_satisfy_grid_invariants_and_avoid_last_row() {
        let layouts: Vec<Vec<Rectangle>> = vec![
            vec![],
            vec![rect(0, 0, 1, 2)],
            vec![rect(0, 0, 4, 4), rect(4, 0, 2, 2)],
            vec![rect(0, 0, 2, 3), rect(2, 0, 2, 3), rect(4, 0, 2, 3)],
            vec![rect(1, 5, 3, 2), rect(0, 0, 6, 5)],
        ];
        for existing in &layouts {
            for (w, h) in [(1, 2), (2, 3), (3, 3), (6, 4), (9, 1)] {
                let placed = place(existing, w, h, 6);
                assert!(grid::fits(&placed, 6), "{:?} from {:?}", placed, existing);
                let max_bottom = existing.iter().map(Rectangle::bottom).max().unwrap_or(0);
                for other in existing.iter().filter(|r| r.bottom() + 1 >= max_bottom) {
                    assert!(!placed.overlaps(other), "{:?} overlaps {:?}", placed, other);
                }
            }
        }
    }
}
