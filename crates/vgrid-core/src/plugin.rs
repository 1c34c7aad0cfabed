//! Extension seams: cell ranges, selection models, and plugins.
//!
//! Selection models are push-based: the grid forwards clicks and keys
//! along with a small context, and the model answers with the new range
//! set when the selection changed. Plugins are registered for lifecycle
//! only; they wire themselves to grid notifications before registration.

use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;

/// A rectangular cell region, inclusive on both ends and normalized so
/// `from_* <= to_*`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub from_row: usize,
    pub from_cell: usize,
    pub to_row: usize,
    pub to_cell: usize,
}

impl CellRange {
    pub fn new(from_row: usize, from_cell: usize, to_row: usize, to_cell: usize) -> Self {
        Self {
            from_row: from_row.min(to_row),
            from_cell: from_cell.min(to_cell),
            to_row: from_row.max(to_row),
            to_cell: from_cell.max(to_cell),
        }
    }

    pub fn cell(row: usize, cell: usize) -> Self {
        Self::new(row, cell, row, cell)
    }

    /// Full-width range over a row interval.
    pub fn rows(from_row: usize, to_row: usize, column_count: usize) -> Self {
        Self::new(from_row, 0, to_row, column_count.saturating_sub(1))
    }

    pub fn is_single_cell(&self) -> bool {
        self.from_row == self.to_row && self.from_cell == self.to_cell
    }

    pub fn is_single_row(&self) -> bool {
        self.from_row == self.to_row
    }

    pub fn contains(&self, row: usize, cell: usize) -> bool {
        row >= self.from_row && row <= self.to_row && cell >= self.from_cell && cell <= self.to_cell
    }

    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.from_row && row <= self.to_row
    }
}

/// Grid state a selection model may consult while handling input.
#[derive(Clone, Copy, Debug)]
pub struct SelectionCtx {
    pub active: Option<(usize, usize)>,
    pub row_count: usize,
    pub column_count: usize,
}

/// Owns the selected ranges and decides how input mutates them.
/// A `Some` return means the selection changed and carries the new set.
pub trait SelectionModel {
    fn handle_click(
        &mut self,
        ctx: &SelectionCtx,
        row: usize,
        cell: usize,
        modifiers: KeyModifiers,
    ) -> Option<Vec<CellRange>>;

    fn handle_key(&mut self, ctx: &SelectionCtx, key: &KeyEvent) -> Option<Vec<CellRange>> {
        let _ = (ctx, key);
        None
    }

    fn set_selected_ranges(&mut self, ranges: Vec<CellRange>);

    fn selected_ranges(&self) -> &[CellRange];

    fn destroy(&mut self) {}
}

/// Whole-row selection: click replaces, ctrl-click toggles, shift-click
/// extends from the last anchor, shift+arrows grow or shrink the tail.
#[derive(Default)]
pub struct RowSelectionModel {
    ranges: Vec<CellRange>,
    anchor: Option<usize>,
}

impl RowSelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn selected_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = Vec::new();
        for range in &self.ranges {
            for row in range.from_row..=range.to_row {
                if !rows.contains(&row) {
                    rows.push(row);
                }
            }
        }
        rows.sort_unstable();
        rows
    }

    fn ranges_from_rows(rows: &[usize], column_count: usize) -> Vec<CellRange> {
        rows.iter()
            .map(|&row| CellRange::rows(row, row, column_count))
            .collect()
    }
}

impl SelectionModel for RowSelectionModel {
    fn handle_click(
        &mut self,
        ctx: &SelectionCtx,
        row: usize,
        _cell: usize,
        modifiers: KeyModifiers,
    ) -> Option<Vec<CellRange>> {
        if row >= ctx.row_count {
            return None;
        }
        let mut rows = self.selected_rows();
        if modifiers.ctrl {
            match rows.iter().position(|&r| r == row) {
                Some(i) => {
                    rows.remove(i);
                }
                None => rows.push(row),
            }
            self.anchor = Some(row);
        } else if modifiers.shift {
            let anchor = self.anchor.unwrap_or(row);
            rows = (anchor.min(row)..=anchor.max(row)).collect();
        } else {
            self.anchor = Some(row);
            rows = vec![row];
        }
        rows.sort_unstable();
        self.ranges = Self::ranges_from_rows(&rows, ctx.column_count);
        Some(self.ranges.clone())
    }

    fn handle_key(&mut self, ctx: &SelectionCtx, key: &KeyEvent) -> Option<Vec<CellRange>> {
        if !key.modifiers.shift || key.modifiers.ctrl || key.modifiers.alt {
            return None;
        }
        let delta: i64 = match key.code {
            KeyCode::Up => -1,
            KeyCode::Down => 1,
            _ => return None,
        };
        let last = self.ranges.last()?;
        let anchor = self.anchor.unwrap_or(last.from_row);
        let tail = if last.to_row > anchor || last.from_row == anchor {
            last.to_row
        } else {
            last.from_row
        };
        let moved = tail.checked_add_signed(delta as isize)?;
        if moved >= ctx.row_count {
            return None;
        }
        let range = CellRange::rows(anchor.min(moved), anchor.max(moved), ctx.column_count);
        self.ranges = vec![range];
        Some(self.ranges.clone())
    }

    fn set_selected_ranges(&mut self, ranges: Vec<CellRange>) {
        self.anchor = ranges.last().map(|r| r.from_row);
        self.ranges = ranges;
    }

    fn selected_ranges(&self) -> &[CellRange] {
        &self.ranges
    }
}

/// Handle to a registered plugin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PluginId(pub(crate) usize);

/// Lifecycle seam for grid extensions. Wiring happens through grid
/// notifications before registration; the grid only tracks teardown.
pub trait GridPlugin {
    fn name(&self) -> &str;

    fn destroy(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(rows: usize, cols: usize) -> SelectionCtx {
        SelectionCtx {
            active: None,
            row_count: rows,
            column_count: cols,
        }
    }

    #[test]
    fn range_normalizes_and_tests_membership() {
        let r = CellRange::new(5, 3, 2, 1);
        assert_eq!((r.from_row, r.to_row), (2, 5));
        assert_eq!((r.from_cell, r.to_cell), (1, 3));
        assert!(r.contains(3, 2));
        assert!(!r.contains(3, 0));
        assert!(!r.is_single_cell());
        assert!(CellRange::cell(1, 1).is_single_cell());
    }

    #[test]
    fn click_replaces_selection() {
        let mut m = RowSelectionModel::new();
        let c = ctx(10, 3);
        let ranges = m.handle_click(&c, 4, 0, KeyModifiers::default()).unwrap();
        assert_eq!(ranges, vec![CellRange::rows(4, 4, 3)]);
        let ranges = m.handle_click(&c, 7, 1, KeyModifiers::default()).unwrap();
        assert_eq!(ranges, vec![CellRange::rows(7, 7, 3)]);
    }

    #[test]
    fn ctrl_click_toggles_membership() {
        let mut m = RowSelectionModel::new();
        let c = ctx(10, 2);
        m.handle_click(&c, 2, 0, KeyModifiers::default());
        let ctrl = KeyModifiers {
            ctrl: true,
            ..KeyModifiers::default()
        };
        let ranges = m.handle_click(&c, 5, 0, ctrl).unwrap();
        assert_eq!(ranges.len(), 2);
        let ranges = m.handle_click(&c, 2, 0, ctrl).unwrap();
        assert_eq!(ranges, vec![CellRange::rows(5, 5, 2)]);
    }

    #[test]
    fn shift_click_extends_from_anchor() {
        let mut m = RowSelectionModel::new();
        let c = ctx(10, 2);
        m.handle_click(&c, 3, 0, KeyModifiers::default());
        let shift = KeyModifiers {
            shift: true,
            ..KeyModifiers::default()
        };
        let ranges = m.handle_click(&c, 6, 0, shift).unwrap();
        let rows: Vec<usize> = ranges.iter().map(|r| r.from_row).collect();
        assert_eq!(rows, vec![3, 4, 5, 6]);
    }

    #[test]
    fn shift_arrows_grow_and_shrink() {
        let mut m = RowSelectionModel::new();
        let c = ctx(10, 2);
        m.handle_click(&c, 3, 0, KeyModifiers::default());
        let down = KeyEvent::new(KeyCode::Down).with_modifiers(KeyModifiers::shift());
        let ranges = m.handle_key(&c, &down).unwrap();
        assert_eq!(ranges, vec![CellRange::rows(3, 4, 2)]);
        let ranges = m.handle_key(&c, &down).unwrap();
        assert_eq!(ranges, vec![CellRange::rows(3, 5, 2)]);
        let up = KeyEvent::new(KeyCode::Up).with_modifiers(KeyModifiers::shift());
        let ranges = m.handle_key(&c, &up).unwrap();
        assert_eq!(ranges, vec![CellRange::rows(3, 4, 2)]);
    }

    #[test]
    fn out_of_range_click_is_ignored() {
        let mut m = RowSelectionModel::new();
        let c = ctx(3, 2);
        assert!(m.handle_click(&c, 5, 0, KeyModifiers::default()).is_none());
    }
}
