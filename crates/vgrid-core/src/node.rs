//! Retained render nodes.
//!
//! Rendered rows and cells live in slab arenas keyed by [`RowKey`] and
//! [`CellKey`]. The cache maps row indices to keys; everything else
//! (position, formatted text, classes) is plain data a widget reads at
//! paint time. Per-node bookkeeping that a DOM would hang off elements
//! stays in these side tables instead.

use std::collections::BTreeMap;

use slab::Slab;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowKey(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellKey(usize);

/// A rendered cell: formatted text plus the class list a painter styles
/// it with.
#[derive(Clone, Debug, Default)]
pub struct CellNode {
    pub row: usize,
    pub cell: usize,
    pub colspan: u32,
    pub text: String,
    pub classes: Vec<String>,
    pub tooltip: Option<String>,
    /// A post-render hook has decorated this cell.
    pub decorated: bool,
}

impl CellNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }
}

/// A rendered row: canvas-relative top plus the cells rendered so far,
/// ordered by cell index.
#[derive(Clone, Debug, Default)]
pub struct RowNode {
    pub row: usize,
    /// Real canvas px; stale after a page switch until repositioned.
    pub top: i64,
    pub classes: Vec<String>,
    /// Rendered as a loading placeholder; invalidated when data arrives.
    pub loading: bool,
    /// Detached from the visible set but kept alive, see the cache's
    /// zombie handling.
    pub hidden: bool,
    pub cells: BTreeMap<usize, CellKey>,
}

impl RowNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }
}

/// Arena storage for render nodes. Keys stay valid until the node is
/// removed; removing a row does not free its cells, callers drain
/// `RowNode::cells` first so cleanup hooks can run.
#[derive(Default)]
pub struct NodeArena {
    rows: Slab<RowNode>,
    cells: Slab<CellNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&mut self, node: RowNode) -> RowKey {
        RowKey(self.rows.insert(node))
    }

    pub fn insert_cell(&mut self, node: CellNode) -> CellKey {
        CellKey(self.cells.insert(node))
    }

    pub fn row(&self, key: RowKey) -> &RowNode {
        &self.rows[key.0]
    }

    pub fn row_mut(&mut self, key: RowKey) -> &mut RowNode {
        &mut self.rows[key.0]
    }

    pub fn cell(&self, key: CellKey) -> &CellNode {
        &self.cells[key.0]
    }

    pub fn cell_mut(&mut self, key: CellKey) -> &mut CellNode {
        &mut self.cells[key.0]
    }

    pub fn get_cell(&self, key: CellKey) -> Option<&CellNode> {
        self.cells.get(key.0)
    }

    pub fn remove_row(&mut self, key: RowKey) -> RowNode {
        self.rows.remove(key.0)
    }

    pub fn remove_cell(&mut self, key: CellKey) -> CellNode {
        self.cells.remove(key.0)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_round_trip() {
        let mut arena = NodeArena::new();
        let ck = arena.insert_cell(CellNode {
            row: 2,
            cell: 1,
            colspan: 1,
            text: "x".into(),
            ..CellNode::default()
        });
        let rk = arena.insert_row(RowNode {
            row: 2,
            top: 50,
            cells: BTreeMap::from([(1, ck)]),
            ..RowNode::default()
        });
        assert_eq!(arena.row(rk).cells[&1], ck);
        assert_eq!(arena.cell(ck).text, "x");

        let row = arena.remove_row(rk);
        for (_, ck) in row.cells {
            arena.remove_cell(ck);
        }
        assert_eq!(arena.row_count(), 0);
        assert_eq!(arena.cell_count(), 0);
    }

    #[test]
    fn class_toggles_do_not_duplicate() {
        let mut cell = CellNode::default();
        cell.add_class("active");
        cell.add_class("active");
        assert_eq!(cell.classes.len(), 1);
        cell.remove_class("active");
        assert!(!cell.has_class("active"));
        cell.remove_class("missing");
    }
}
