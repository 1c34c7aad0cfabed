//! Column definitions and horizontal layout.

use std::collections::HashMap;
use std::rc::Rc;

use crate::data::CellValue;
use crate::data::GridItem;
use crate::editing::EditorFactory;
use crate::node::CellNode;

/// Input to a cell formatter.
pub struct FormatCtx<'a> {
    pub row: usize,
    pub cell: usize,
    pub value: CellValue,
    pub column: &'a Column,
    pub item: &'a dyn GridItem,
}

/// Formatter output: display text plus optional extra css classes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellContent {
    pub text: String,
    pub classes: String,
}

impl CellContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            classes: String::new(),
        }
    }

    pub fn with_classes(mut self, classes: impl Into<String>) -> Self {
        self.classes = classes.into();
        self
    }
}

impl From<String> for CellContent {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for CellContent {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

/// Pure presentation function for a cell.
pub type CellFormatter = Rc<dyn Fn(&FormatCtx<'_>) -> CellContent>;

/// Deferred decoration hook, run one row per tick after rendering settles.
pub type PostRenderHook = Rc<dyn Fn(&mut CellNode, usize, &dyn GridItem, &Column)>;

/// Runs against a decorated node before it is dropped.
pub type PostRenderCleanupHook = Rc<dyn Fn(&mut CellNode)>;

#[derive(Clone)]
pub struct Column {
    pub id: String,
    pub field: String,
    pub name: String,
    pub width: u32,
    pub min_width: u32,
    pub max_width: Option<u32>,
    pub resizable: bool,
    pub sortable: bool,
    pub focusable: bool,
    pub selectable: bool,
    /// Editing this column on the add-new row does not trigger an insert.
    pub cannot_trigger_insert: bool,
    pub css_class: Option<String>,
    pub header_css_class: Option<String>,
    pub tooltip: Option<String>,
    pub formatter: Option<CellFormatter>,
    pub editor: Option<Rc<dyn EditorFactory>>,
    pub post_render: Option<PostRenderHook>,
    pub post_render_cleanup: Option<PostRenderCleanupHook>,
}

impl Column {
    /// New column with `field` defaulting to the id.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            field: id.clone(),
            id,
            name: name.into(),
            width: 10,
            min_width: 1,
            max_width: None,
            resizable: true,
            sortable: false,
            focusable: true,
            selectable: true,
            cannot_trigger_insert: false,
            css_class: None,
            header_css_class: None,
            tooltip: None,
            formatter: None,
            editor: None,
            post_render: None,
            post_render_cleanup: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn min_width(mut self, min_width: u32) -> Self {
        self.min_width = min_width;
        self
    }

    pub fn max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn focusable(mut self, focusable: bool) -> Self {
        self.focusable = focusable;
        self
    }

    pub fn selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn css_class(mut self, class: impl Into<String>) -> Self {
        self.css_class = Some(class.into());
        self
    }

    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn formatter(mut self, formatter: CellFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn editor(mut self, editor: Rc<dyn EditorFactory>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn post_render(mut self, hook: PostRenderHook) -> Self {
        self.post_render = Some(hook);
        self
    }

    pub fn post_render_cleanup(mut self, hook: PostRenderCleanupHook) -> Self {
        self.post_render_cleanup = Some(hook);
        self
    }

    fn clamped_width(&self) -> u32 {
        let mut w = self.width.max(self.min_width);
        if let Some(max) = self.max_width {
            w = w.min(max);
        }
        w
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSort {
    pub column_id: String,
    pub ascending: bool,
}

/// Ordered column collection with the derived lookup structures the grid
/// needs: id to index, and cumulative left edges in px.
#[derive(Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
    by_id: HashMap<String, usize>,
    lefts: Vec<u64>,
}

impl ColumnSet {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut set = Self {
            columns,
            by_id: HashMap::new(),
            lefts: Vec::new(),
        };
        set.rebuild();
        set
    }

    fn rebuild(&mut self) {
        for c in &mut self.columns {
            c.width = c.clamped_width();
        }
        self.by_id = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        self.lefts.clear();
        self.lefts.reserve(self.columns.len() + 1);
        let mut x = 0u64;
        self.lefts.push(0);
        for c in &self.columns {
            x += u64::from(c.width);
            self.lefts.push(x);
        }
    }

    pub fn set(&mut self, columns: Vec<Column>) {
        self.columns = columns;
        self.rebuild();
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Left edge of column `index` in px.
    pub fn left(&self, index: usize) -> u64 {
        self.lefts[index]
    }

    /// Right edge (exclusive) of column `index` in px.
    pub fn right(&self, index: usize) -> u64 {
        self.lefts[index + 1]
    }

    /// Right edge of a span starting at `cell`.
    pub fn span_right(&self, cell: usize, colspan: u32) -> u64 {
        let last = (cell + colspan.max(1) as usize).min(self.columns.len());
        self.lefts[last]
    }

    pub fn total_width(&self) -> u64 {
        *self.lefts.last().unwrap_or(&0)
    }

    /// Column containing px position `x`; columns own `[left, right)`.
    pub fn col_at_x(&self, x: u64) -> Option<usize> {
        if self.columns.is_empty() || x >= self.total_width() {
            return None;
        }
        Some(self.lefts[1..].partition_point(|&right| right <= x))
    }

    pub fn set_width(&mut self, index: usize, width: u32) {
        if let Some(c) = self.columns.get_mut(index) {
            c.width = width;
        }
        self.rebuild();
    }

    pub fn set_header(&mut self, index: usize, name: String, tooltip: Option<String>) {
        if let Some(c) = self.columns.get_mut(index) {
            c.name = name;
            c.tooltip = tooltip;
        }
    }

    /// Move the column at `from` so it ends up at position `to`.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from >= self.columns.len() || to >= self.columns.len() {
            return;
        }
        let col = self.columns.remove(from);
        self.columns.insert(to, col);
        self.rebuild();
    }

    /// Distribute `avail_width` px across resizable columns, shrinking or
    /// growing proportionally while honoring per-column min/max widths.
    pub fn autosize(&mut self, avail_width: u32) {
        if self.columns.is_empty() {
            return;
        }
        let avail = u64::from(avail_width);
        let mut widths: Vec<u64> = self.columns.iter().map(|c| u64::from(c.width)).collect();
        let mut total: u64 = widths.iter().sum();
        let mut leeway: u64 = self
            .columns
            .iter()
            .filter(|c| c.resizable)
            .map(|c| u64::from(c.width.saturating_sub(c.min_width)))
            .sum();

        let mut prev_total = total;
        while total > avail && leeway > 0 {
            let proportion = (total - avail) as f64 / leeway as f64;
            for i in 0..self.columns.len() {
                if total <= avail {
                    break;
                }
                let c = &self.columns[i];
                let abs_min = u64::from(c.min_width);
                if !c.resizable || widths[i] <= abs_min {
                    continue;
                }
                let room = widths[i] - abs_min;
                let shrink = ((proportion * room as f64).floor() as u64)
                    .max(1)
                    .min(room)
                    .min(total - avail);
                widths[i] -= shrink;
                total -= shrink;
                leeway -= shrink;
            }
            if prev_total <= total {
                break;
            }
            prev_total = total;
        }

        prev_total = total;
        while total < avail && total > 0 {
            let proportion = avail as f64 / total as f64;
            for i in 0..self.columns.len() {
                if total >= avail {
                    break;
                }
                let c = &self.columns[i];
                let max = c.max_width.map(u64::from).unwrap_or(u64::from(u32::MAX));
                if !c.resizable || widths[i] >= max {
                    continue;
                }
                let target = (proportion * widths[i] as f64).floor() as u64;
                let grow = target
                    .saturating_sub(widths[i])
                    .max(1)
                    .min(max - widths[i])
                    .min(avail - total);
                widths[i] += grow;
                total += grow;
            }
            if prev_total >= total {
                break;
            }
            prev_total = total;
        }

        for (c, w) in self.columns.iter_mut().zip(widths) {
            c.width = w.min(u64::from(u32::MAX)) as u32;
        }
        self.rebuild();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(widths: &[u32]) -> ColumnSet {
        ColumnSet::new(
            widths
                .iter()
                .enumerate()
                .map(|(i, w)| Column::new(format!("c{i}"), format!("C{i}")).width(*w))
                .collect(),
        )
    }

    #[test]
    fn left_edges_accumulate() {
        let s = set(&[10, 20, 5]);
        assert_eq!(s.left(0), 0);
        assert_eq!(s.left(2), 30);
        assert_eq!(s.right(2), 35);
        assert_eq!(s.total_width(), 35);
        assert_eq!(s.span_right(0, 2), 30);
        assert_eq!(s.span_right(1, 99), 35);
    }

    #[test]
    fn col_at_x_owns_half_open_ranges() {
        let s = set(&[10, 20, 5]);
        assert_eq!(s.col_at_x(0), Some(0));
        assert_eq!(s.col_at_x(9), Some(0));
        assert_eq!(s.col_at_x(10), Some(1));
        assert_eq!(s.col_at_x(34), Some(2));
        assert_eq!(s.col_at_x(35), None);
    }

    #[test]
    fn autosize_shrinks_to_fit_respecting_min() {
        let mut s = ColumnSet::new(vec![
            Column::new("a", "A").width(40).min_width(5),
            Column::new("b", "B").width(40).min_width(30),
            Column::new("c", "C").width(20).resizable(false),
        ]);
        s.autosize(60);
        let widths: Vec<u32> = s.columns().iter().map(|c| c.width).collect();
        assert_eq!(widths.iter().sum::<u32>(), 60);
        assert_eq!(widths[2], 20);
        assert!(widths[0] >= 5);
        assert!(widths[1] >= 30);
    }

    #[test]
    fn autosize_grows_to_fill_respecting_max() {
        let mut s = ColumnSet::new(vec![
            Column::new("a", "A").width(10).max_width(12),
            Column::new("b", "B").width(10),
        ]);
        s.autosize(40);
        let widths: Vec<u32> = s.columns().iter().map(|c| c.width).collect();
        assert_eq!(widths.iter().sum::<u32>(), 40);
        assert!(widths[0] <= 12);
    }

    #[test]
    fn autosize_stops_when_nothing_can_give() {
        let mut s = ColumnSet::new(vec![
            Column::new("a", "A").width(10).resizable(false),
            Column::new("b", "B").width(10).resizable(false),
        ]);
        s.autosize(5);
        assert_eq!(s.total_width(), 20);
    }

    #[test]
    fn reorder_moves_and_rebuilds() {
        let mut s = set(&[10, 20, 5]);
        s.reorder(2, 0);
        let ids: Vec<&str> = s.columns().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c0", "c1"]);
        assert_eq!(s.index_of("c2"), Some(0));
        assert_eq!(s.left(1), 5);
    }
}
