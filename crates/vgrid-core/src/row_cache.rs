//! Rendered row cache.
//!
//! Rows and cells materialize lazily as the viewport moves and are evicted
//! once they leave the rendered range. Wide grids additionally window the
//! cells within each cached row to the horizontal viewport plus one
//! viewport of buffer on each side. Two deferred pumps run off the tick
//! clock: decoration runs post-render hooks one row per tick, and cleanup
//! disposes evicted decorated nodes one row group per tick.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use log::trace;

use crate::column::CellFormatter;
use crate::column::ColumnSet;
use crate::column::FormatCtx;
use crate::column::PostRenderCleanupHook;
use crate::data::DataProvider;
use crate::data::RowMetadata;
use crate::data::Span;
use crate::grid::GridOptions;
use crate::node::CellKey;
use crate::node::CellNode;
use crate::node::NodeArena;
use crate::node::RowKey;
use crate::node::RowNode;
use crate::timer::TimerSlot;
use crate::virtual_scroll::ScrollDir;
use crate::virtual_scroll::VirtualScroll;

/// Class appended to rows past the end of the data (the add-new row).
pub const ADD_NEW_ROW_CLASS: &str = "new-row";

/// Everything the cache needs to render, borrowed from the grid for the
/// duration of one call.
pub struct RenderCtx<'a> {
    pub data: &'a dyn DataProvider,
    pub columns: &'a ColumnSet,
    pub options: &'a GridOptions,
    pub vs: &'a VirtualScroll,
    /// Provider length; rows at or past it are the add-new row.
    pub data_len: usize,
    pub scroll_left: u64,
    pub viewport_w: u32,
    pub active: Option<(usize, usize)>,
    /// The active cell currently hosts an editor.
    pub editing: bool,
    /// Row under the last wheel event; its node outlives eviction.
    pub wheel_row: Option<usize>,
}

enum CleanupEntry {
    Cell {
        group: u32,
        key: CellKey,
        hook: Option<PostRenderCleanupHook>,
    },
    Row {
        group: u32,
        key: RowKey,
    },
}

impl CleanupEntry {
    fn group(&self) -> u32 {
        match self {
            Self::Cell { group, .. } | Self::Row { group, .. } => *group,
        }
    }
}

#[derive(Default)]
pub struct RowCache {
    arena: NodeArena,
    by_row: HashMap<usize, RowKey>,
    /// Evicted row kept alive while the pointer still rides it.
    zombie: Option<(usize, RowKey)>,
    decorated_rows: HashSet<usize>,
    postproc_from: i64,
    postproc_to: i64,
    cleanup_queue: VecDeque<CleanupEntry>,
    cleanup_group: u32,
    decoration_timer: TimerSlot,
    cleanup_timer: TimerSlot,
}

impl RowCache {
    pub fn new() -> Self {
        Self {
            postproc_to: -1,
            ..Self::default()
        }
    }

    pub fn is_cached(&self, row: usize) -> bool {
        self.by_row.contains_key(&row)
    }

    pub fn cached_rows(&self) -> usize {
        self.by_row.len()
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn row_node(&self, row: usize) -> Option<&RowNode> {
        self.by_row.get(&row).map(|&key| self.arena.row(key))
    }

    pub fn cell_node(&self, row: usize, cell: usize) -> Option<&CellNode> {
        let key = self.by_row.get(&row)?;
        let ck = self.arena.row(*key).cells.get(&cell)?;
        Some(self.arena.cell(*ck))
    }

    /// Cached rows in row order, for painting.
    pub fn rows_in_order(&self) -> Vec<(usize, RowKey)> {
        let mut rows: Vec<(usize, RowKey)> = self.by_row.iter().map(|(&r, &k)| (r, k)).collect();
        rows.sort_unstable_by_key(|(r, _)| *r);
        rows
    }

    pub fn zombie_row(&self) -> Option<usize> {
        self.zombie.map(|(row, _)| row)
    }

    /// Earliest pending pump deadline, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        match (self.decoration_timer.deadline(), self.cleanup_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Full render pass for the current scroll state: evict rows outside
    /// the rendered range, rewindow cells horizontally when the viewport
    /// moved sideways, materialize missing rows, and reset the decoration
    /// window to the visible rows.
    pub fn render(&mut self, ctx: &RenderCtx<'_>, h_scrolled: bool, now: u64) {
        if ctx.vs.row_count() == 0 {
            let stale: Vec<usize> = self.by_row.keys().copied().collect();
            for row in stale {
                self.remove_row(ctx, row, now);
            }
            self.postproc_from = 0;
            self.postproc_to = -1;
            return;
        }
        let rendered = ctx.vs.rendered_range();
        let visible = ctx.vs.visible_range();
        self.cleanup_rows(ctx, rendered.top, rendered.bottom, now);
        if h_scrolled {
            self.clean_up_and_render_cells(ctx, rendered.top, rendered.bottom, now);
        }
        self.render_rows(ctx, rendered.top, rendered.bottom);
        self.postproc_from = visible.top as i64;
        self.postproc_to = visible.bottom.min(ctx.vs.row_count() - 1) as i64;
        self.start_decoration(ctx, now);
        trace!(
            "render: rows {}..={} cached {}",
            rendered.top,
            rendered.bottom,
            self.by_row.len()
        );
    }

    /// Page-boundary scroll inside the same render window: evict down to
    /// the visible rows and refresh survivor positions.
    pub fn page_shift(&mut self, ctx: &RenderCtx<'_>, now: u64) {
        let visible = ctx.vs.visible_range();
        self.cleanup_rows(ctx, visible.top, visible.bottom, now);
        self.reposition_rows(ctx.vs);
    }

    pub fn reposition_rows(&mut self, vs: &VirtualScroll) {
        let arena = &mut self.arena;
        for (&row, &key) in &self.by_row {
            arena.row_mut(key).top = vs.row_top(row);
        }
    }

    fn cleanup_rows(&mut self, ctx: &RenderCtx<'_>, top: usize, bottom: usize, now: u64) {
        let active_row = ctx.active.map(|(row, _)| row);
        let mut stale: Vec<usize> = self
            .by_row
            .keys()
            .copied()
            .filter(|&row| (row < top || row > bottom) && Some(row) != active_row)
            .collect();
        stale.sort_unstable();
        for row in stale {
            self.remove_row(ctx, row, now);
        }
    }

    /// Drop a row from the cache. The wheel target row is hidden and kept
    /// as a zombie instead; decorated rows go through the async cleanup
    /// queue when that is enabled.
    pub fn remove_row(&mut self, ctx: &RenderCtx<'_>, row: usize, now: u64) {
        let Some(key) = self.by_row.remove(&row) else {
            return;
        };
        let decorated = self.decorated_rows.remove(&row);
        if ctx.wheel_row == Some(row) {
            self.arena.row_mut(key).hidden = true;
            if let Some((_, old)) = self.zombie.replace((row, key)) {
                self.free_row(old);
            }
            return;
        }
        if ctx.options.async_post_render_cleanup && decorated {
            self.queue_row_for_cleanup(ctx, key, now);
        } else {
            self.free_row(key);
        }
    }

    /// Dispose the zombie row once the wheel target moves elsewhere.
    pub fn kill_zombie(&mut self) {
        if let Some((_, key)) = self.zombie.take() {
            self.free_row(key);
        }
    }

    fn free_row(&mut self, key: RowKey) {
        let row = self.arena.remove_row(key);
        for (_, ck) in row.cells {
            self.arena.remove_cell(ck);
        }
    }

    pub fn invalidate_rows(&mut self, ctx: &RenderCtx<'_>, rows: &[usize], now: u64) {
        for &row in rows {
            self.remove_row(ctx, row, now);
        }
    }

    pub fn invalidate_all_rows(&mut self, ctx: &RenderCtx<'_>, now: u64) {
        let mut rows: Vec<usize> = self.by_row.keys().copied().collect();
        rows.sort_unstable();
        for row in rows {
            self.remove_row(ctx, row, now);
        }
    }

    /// Rendered horizontal window: the viewport plus one viewport of
    /// buffer each side, clamped to the canvas.
    fn rendered_px(ctx: &RenderCtx<'_>) -> (u64, u64) {
        let vw = u64::from(ctx.viewport_w);
        let left = ctx.scroll_left.saturating_sub(vw);
        let right = (ctx.scroll_left + 2 * vw).min(ctx.columns.total_width());
        (left, right)
    }

    fn clean_up_and_render_cells(
        &mut self,
        ctx: &RenderCtx<'_>,
        top: usize,
        bottom: usize,
        now: u64,
    ) {
        let (left_px, right_px) = Self::rendered_px(ctx);
        for row in top..=bottom {
            if !self.by_row.contains_key(&row) {
                continue;
            }
            self.clean_up_cells(ctx, row, left_px, right_px, now);
            self.render_missing_cells(ctx, row, left_px, right_px);
        }
    }

    /// Evict cells of a cached row that fell outside the horizontal
    /// window. The active cell is exempt.
    fn clean_up_cells(
        &mut self,
        ctx: &RenderCtx<'_>,
        row: usize,
        left_px: u64,
        right_px: u64,
        now: u64,
    ) {
        let Some(&key) = self.by_row.get(&row) else {
            return;
        };
        let mut to_remove: Vec<(usize, CellKey)> = Vec::new();
        for (&cell, &ck) in &self.arena.row(key).cells {
            let colspan = self.arena.cell(ck).colspan;
            let out = ctx.columns.left(cell) > right_px
                || ctx.columns.span_right(cell, colspan) < left_px;
            if out && ctx.active != Some((row, cell)) {
                to_remove.push((cell, ck));
            }
        }
        if to_remove.is_empty() {
            return;
        }
        self.cleanup_group += 1;
        let group = self.cleanup_group;
        let mut queued = false;
        for (cell, ck) in to_remove {
            self.arena.row_mut(key).cells.remove(&cell);
            let hook = ctx
                .columns
                .get(cell)
                .and_then(|c| c.post_render_cleanup.clone());
            if ctx.options.async_post_render_cleanup
                && self.arena.cell(ck).decorated
                && hook.is_some()
            {
                self.cleanup_queue
                    .push_back(CleanupEntry::Cell { group, key: ck, hook });
                queued = true;
            } else {
                self.arena.remove_cell(ck);
            }
        }
        if queued {
            self.start_cleanup(ctx, now);
        }
    }

    fn render_missing_cells(&mut self, ctx: &RenderCtx<'_>, row: usize, left_px: u64, right_px: u64) {
        let Some(&key) = self.by_row.get(&row) else {
            return;
        };
        let meta = ctx.data.row_metadata(row);
        let total = ctx.columns.len();
        let mut cell = 0usize;
        while cell < total {
            if ctx.columns.left(cell) > right_px {
                break;
            }
            if let Some(&ck) = self.arena.row(key).cells.get(&cell) {
                cell += self.arena.cell(ck).colspan.max(1) as usize;
                continue;
            }
            let colspan = colspan_at(ctx.columns, meta.as_ref(), cell);
            if ctx.columns.span_right(cell, colspan) > left_px {
                self.render_cell(ctx, key, row, cell, colspan, meta.as_ref());
            }
            cell += colspan.max(1) as usize;
        }
    }

    fn render_rows(&mut self, ctx: &RenderCtx<'_>, top: usize, bottom: usize) {
        let (left_px, right_px) = Self::rendered_px(ctx);
        for row in top..=bottom {
            if self.by_row.contains_key(&row) {
                continue;
            }
            let loading = row < ctx.data_len && ctx.data.item(row).is_none();
            let meta = ctx.data.row_metadata(row);
            let mut classes = Vec::new();
            if let Some(css) = meta.as_ref().and_then(|m| m.css_classes.as_deref()) {
                classes.extend(css.split_whitespace().map(String::from));
            }
            if row >= ctx.data_len {
                classes.push(ADD_NEW_ROW_CLASS.to_string());
            }
            if ctx.options.show_cell_selection && ctx.active.map(|(r, _)| r) == Some(row) {
                classes.push("active".to_string());
            }
            let key = self.arena.insert_row(RowNode {
                row,
                top: ctx.vs.row_top(row),
                classes,
                loading,
                hidden: false,
                cells: BTreeMap::new(),
            });
            self.by_row.insert(row, key);

            let total = ctx.columns.len();
            let mut cell = 0usize;
            while cell < total {
                let colspan = colspan_at(ctx.columns, meta.as_ref(), cell);
                if ctx.columns.span_right(cell, colspan) > left_px {
                    if ctx.columns.left(cell) > right_px {
                        break;
                    }
                    self.render_cell(ctx, key, row, cell, colspan, meta.as_ref());
                }
                cell += colspan.max(1) as usize;
            }
        }
    }

    fn render_cell(
        &mut self,
        ctx: &RenderCtx<'_>,
        key: RowKey,
        row: usize,
        cell: usize,
        colspan: u32,
        meta: Option<&RowMetadata>,
    ) {
        let Some(column) = ctx.columns.get(cell) else {
            return;
        };
        let mut node = CellNode {
            row,
            cell,
            colspan,
            ..CellNode::default()
        };
        if let Some(class) = &column.css_class {
            node.classes.push(class.clone());
        }
        if ctx.active == Some((row, cell)) {
            node.add_class("active");
        }
        if let Some(item) = ctx.data.item(row) {
            let value = item.value(&column.field);
            let content = match resolve_formatter(column, meta, cell) {
                Some(formatter) => formatter(&FormatCtx {
                    row,
                    cell,
                    value,
                    column,
                    item,
                }),
                None => value.to_string().into(),
            };
            node.text = content.text;
            for class in content.classes.split_whitespace() {
                node.add_class(class);
            }
        }
        let ck = self.arena.insert_cell(node);
        self.arena.row_mut(key).cells.insert(cell, ck);
    }

    fn reformat_cell(
        &mut self,
        ctx: &RenderCtx<'_>,
        key: RowKey,
        row: usize,
        cell: usize,
        meta: Option<&RowMetadata>,
    ) {
        let Some(&ck) = self.arena.row(key).cells.get(&cell) else {
            return;
        };
        let colspan = self.arena.cell(ck).colspan;
        self.arena.remove_cell(ck);
        self.arena.row_mut(key).cells.remove(&cell);
        self.render_cell(ctx, key, row, cell, colspan, meta);
    }

    /// Re-run the formatter for one rendered cell. Skipped while that cell
    /// hosts an editor; the grid reloads the editor instead.
    pub fn update_cell(&mut self, ctx: &RenderCtx<'_>, row: usize, cell: usize, now: u64) {
        let Some(&key) = self.by_row.get(&row) else {
            return;
        };
        if ctx.editing && ctx.active == Some((row, cell)) {
            return;
        }
        let meta = ctx.data.row_metadata(row);
        self.reformat_cell(ctx, key, row, cell, meta.as_ref());
        self.invalidate_decoration(ctx, row, now);
    }

    /// Re-run formatters for every rendered cell of a row.
    pub fn update_row(&mut self, ctx: &RenderCtx<'_>, row: usize, now: u64) {
        let Some(&key) = self.by_row.get(&row) else {
            return;
        };
        let meta = ctx.data.row_metadata(row);
        let cells: Vec<usize> = self.arena.row(key).cells.keys().copied().collect();
        for cell in cells {
            if ctx.editing && ctx.active == Some((row, cell)) {
                continue;
            }
            self.reformat_cell(ctx, key, row, cell, meta.as_ref());
        }
        let loading = row < ctx.data_len && ctx.data.item(row).is_none();
        self.arena.row_mut(key).loading = loading;
        self.invalidate_decoration(ctx, row, now);
    }

    fn invalidate_decoration(&mut self, ctx: &RenderCtx<'_>, row: usize, now: u64) {
        self.decorated_rows.remove(&row);
        if let Some(&key) = self.by_row.get(&row) {
            let cells: Vec<CellKey> = self.arena.row(key).cells.values().copied().collect();
            for ck in cells {
                self.arena.cell_mut(ck).decorated = false;
            }
        }
        self.postproc_from = self.postproc_from.min(row as i64);
        self.postproc_to = self.postproc_to.max(row as i64);
        self.start_decoration(ctx, now);
    }

    pub fn set_row_class(&mut self, row: usize, class: &str, on: bool) {
        if let Some(&key) = self.by_row.get(&row) {
            let node = self.arena.row_mut(key);
            if on {
                node.add_class(class);
            } else {
                node.remove_class(class);
            }
        }
    }

    pub fn set_cell_class(&mut self, row: usize, cell: usize, class: &str, on: bool) {
        let Some(&key) = self.by_row.get(&row) else {
            return;
        };
        let Some(&ck) = self.arena.row(key).cells.get(&cell) else {
            return;
        };
        let node = self.arena.cell_mut(ck);
        if on {
            node.add_class(class);
        } else {
            node.remove_class(class);
        }
    }

    fn start_decoration(&mut self, ctx: &RenderCtx<'_>, now: u64) {
        if !ctx.options.async_post_render {
            return;
        }
        self.decoration_timer
            .arm(now, ctx.options.async_post_render_delay);
    }

    fn start_cleanup(&mut self, ctx: &RenderCtx<'_>, now: u64) {
        self.cleanup_timer
            .arm(now, ctx.options.async_post_render_cleanup_delay);
    }

    /// Fire whichever pump deadlines have passed.
    pub fn tick(&mut self, ctx: &RenderCtx<'_>, now: u64) {
        if self.decoration_timer.fire(now) {
            self.pump_decoration(ctx, now);
        }
        if self.cleanup_timer.fire(now) {
            self.pump_cleanup(ctx, now);
        }
    }

    /// Decorate one cached row per tick, walking the pending window in the
    /// scroll direction. Uncached or out-of-data rows are skipped without
    /// consuming the tick.
    fn pump_decoration(&mut self, ctx: &RenderCtx<'_>, now: u64) -> bool {
        while self.postproc_from <= self.postproc_to {
            let row = if ctx.vs.direction() == ScrollDir::Up {
                let row = self.postproc_to;
                self.postproc_to -= 1;
                row
            } else {
                let row = self.postproc_from;
                self.postproc_from += 1;
                row
            };
            let row = row as usize;
            if !self.by_row.contains_key(&row) || row >= ctx.data_len {
                continue;
            }
            self.process_row_decoration(ctx, row);
            self.decorated_rows.insert(row);
            self.decoration_timer
                .arm(now, ctx.options.async_post_render_delay);
            return true;
        }
        false
    }

    fn process_row_decoration(&mut self, ctx: &RenderCtx<'_>, row: usize) {
        let Some(&key) = self.by_row.get(&row) else {
            return;
        };
        let Some(item) = ctx.data.item(row) else {
            return;
        };
        let cells: Vec<(usize, CellKey)> =
            self.arena.row(key).cells.iter().map(|(&i, &k)| (i, k)).collect();
        for (cell, ck) in cells {
            let Some(column) = ctx.columns.get(cell) else {
                continue;
            };
            let Some(hook) = &column.post_render else {
                continue;
            };
            let node = self.arena.cell_mut(ck);
            if node.decorated {
                continue;
            }
            hook(node, row, item, column);
            node.decorated = true;
        }
    }

    /// Dispose one queued row group per tick: cell entries run their
    /// cleanup hooks first, then the row shell is dropped.
    fn pump_cleanup(&mut self, ctx: &RenderCtx<'_>, now: u64) -> bool {
        let Some(front) = self.cleanup_queue.front() else {
            return false;
        };
        let group = front.group();
        while let Some(entry) = self.cleanup_queue.front() {
            if entry.group() != group {
                break;
            }
            match self.cleanup_queue.pop_front() {
                Some(CleanupEntry::Cell { key, hook, .. }) => {
                    let mut node = self.arena.remove_cell(key);
                    if let Some(hook) = hook {
                        hook(&mut node);
                    }
                }
                Some(CleanupEntry::Row { key, .. }) => {
                    self.arena.remove_row(key);
                }
                None => break,
            }
        }
        if !self.cleanup_queue.is_empty() {
            self.start_cleanup(ctx, now);
        }
        true
    }

    fn queue_row_for_cleanup(&mut self, ctx: &RenderCtx<'_>, key: RowKey, now: u64) {
        self.cleanup_group += 1;
        let group = self.cleanup_group;
        let cells: Vec<(usize, CellKey)> =
            self.arena.row(key).cells.iter().map(|(&i, &k)| (i, k)).collect();
        self.arena.row_mut(key).cells.clear();
        for (cell, ck) in cells {
            let hook = ctx
                .columns
                .get(cell)
                .and_then(|c| c.post_render_cleanup.clone());
            if self.arena.cell(ck).decorated && hook.is_some() {
                self.cleanup_queue
                    .push_back(CleanupEntry::Cell { group, key: ck, hook });
            } else {
                self.arena.remove_cell(ck);
            }
        }
        self.cleanup_queue.push_back(CleanupEntry::Row { group, key });
        self.start_cleanup(ctx, now);
    }
}

/// Effective colspan of a cell, honoring row metadata overrides.
pub(crate) fn colspan_at(columns: &ColumnSet, meta: Option<&RowMetadata>, cell: usize) -> u32 {
    let remaining = (columns.len() - cell) as u32;
    let Some(meta) = meta else {
        return 1;
    };
    let Some(column) = columns.get(cell) else {
        return 1;
    };
    match meta.cell(&column.id, cell).and_then(|m| m.colspan) {
        Some(Span::Count(n)) => n.clamp(1, remaining),
        Some(Span::All) => remaining,
        None => 1,
    }
}

fn resolve_formatter(
    column: &crate::column::Column,
    meta: Option<&RowMetadata>,
    cell: usize,
) -> Option<CellFormatter> {
    if let Some(meta) = meta {
        if let Some(f) = meta.cell(&column.id, cell).and_then(|m| m.formatter.clone()) {
            return Some(f);
        }
        if let Some(f) = meta.formatter.clone() {
            return Some(f);
        }
    }
    column.formatter.clone()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::column::Column;
    use crate::column::PostRenderHook;
    use crate::data::CellMetadata;
    use crate::data::ColumnRef;
    use crate::data::GridItem;
    use crate::data::Record;
    use crate::data::VecSource;

    struct Fixture {
        data: VecSource<Record>,
        columns: ColumnSet,
        options: GridOptions,
        vs: VirtualScroll,
        scroll_left: u64,
        viewport_w: u32,
        active: Option<(usize, usize)>,
        wheel_row: Option<usize>,
    }

    impl Fixture {
        fn new(rows: usize, widths: &[u32]) -> Self {
            let data = VecSource::new(
                (0..rows)
                    .map(|i| {
                        Record::new()
                            .with("a", i as i64)
                            .with("b", format!("r{i}"))
                    })
                    .collect(),
            );
            let columns = ColumnSet::new(
                widths
                    .iter()
                    .enumerate()
                    .map(|(i, w)| {
                        let id = ["a", "b", "c", "d"]
                            .get(i)
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| format!("c{i}"));
                        Column::new(id, format!("C{i}")).width(*w)
                    })
                    .collect(),
            );
            let mut vs = VirtualScroll::new(10, 1_000_000);
            vs.set_viewport_height(100);
            vs.set_row_count(rows);
            Self {
                data,
                columns,
                options: GridOptions::default(),
                vs,
                scroll_left: 0,
                viewport_w: 100,
                active: None,
                wheel_row: None,
            }
        }

        fn ctx(&self) -> RenderCtx<'_> {
            RenderCtx {
                data: &self.data,
                columns: &self.columns,
                options: &self.options,
                vs: &self.vs,
                data_len: self.data.len(),
                scroll_left: self.scroll_left,
                viewport_w: self.viewport_w,
                active: self.active,
                editing: false,
                wheel_row: self.wheel_row,
            }
        }
    }

    #[test]
    fn render_fills_rendered_range() {
        let f = Fixture::new(100, &[10, 10]);
        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        // visible 0..=10 plus 3-row buffers, clamped at the top
        assert!(cache.is_cached(0));
        assert!(cache.is_cached(13));
        assert!(!cache.is_cached(14));
        assert_eq!(cache.cell_node(5, 1).unwrap().text, "r5");
        assert_eq!(cache.cell_node(5, 0).unwrap().text, "5");
        assert_eq!(cache.row_node(5).unwrap().top, 50);
    }

    #[test]
    fn scroll_eviction_spares_active_row() {
        let mut f = Fixture::new(100, &[10, 10]);
        f.active = Some((2, 0));
        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        f.vs.scroll_to(500);
        cache.render(&f.ctx(), false, 0);
        assert!(cache.is_cached(2));
        assert!(!cache.is_cached(5));
        assert!(cache.is_cached(50));
        assert!(cache.is_cached(70));
    }

    #[test]
    fn horizontal_window_limits_and_rewindows_cells() {
        let mut f = Fixture::new(20, &[50; 20]);
        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        // window [0, 200): columns 0..=4 rendered
        assert!(cache.cell_node(0, 0).is_some());
        assert!(cache.cell_node(0, 4).is_some());
        assert!(cache.cell_node(0, 5).is_none());

        f.scroll_left = 600;
        cache.render(&f.ctx(), true, 0);
        // window [500, 800]: columns 10..=16 rendered, old ones evicted
        assert!(cache.cell_node(0, 0).is_none());
        assert!(cache.cell_node(0, 10).is_some());
        assert!(cache.cell_node(0, 16).is_some());
        assert!(cache.cell_node(0, 17).is_none());
    }

    #[test]
    fn colspan_all_renders_one_wide_cell() {
        struct MetaSource {
            inner: VecSource<Record>,
        }
        impl DataProvider for MetaSource {
            fn len(&self) -> usize {
                self.inner.len()
            }
            fn item(&self, index: usize) -> Option<&dyn GridItem> {
                self.inner.item(index)
            }
            fn item_mut(&mut self, index: usize) -> Option<&mut dyn GridItem> {
                self.inner.item_mut(index)
            }
            fn row_metadata(&self, index: usize) -> Option<RowMetadata> {
                (index == 1).then(|| RowMetadata {
                    columns: vec![(
                        ColumnRef::Index(0),
                        CellMetadata {
                            colspan: Some(Span::All),
                            ..CellMetadata::default()
                        },
                    )],
                    ..RowMetadata::default()
                })
            }
        }

        let f = Fixture::new(10, &[10, 10, 10]);
        let data = MetaSource {
            inner: VecSource::new(
                (0..10)
                    .map(|i| Record::new().with("a", i as i64))
                    .collect(),
            ),
        };
        let ctx = RenderCtx {
            data: &data,
            columns: &f.columns,
            options: &f.options,
            vs: &f.vs,
            data_len: data.len(),
            scroll_left: 0,
            viewport_w: 100,
            active: None,
            editing: false,
            wheel_row: None,
        };
        let mut cache = RowCache::new();
        cache.render(&ctx, false, 0);
        let row = cache.row_node(1).unwrap();
        assert_eq!(row.cells.len(), 1);
        assert_eq!(cache.cell_node(1, 0).unwrap().colspan, 3);
        assert_eq!(cache.row_node(0).unwrap().cells.len(), 3);
    }

    #[test]
    fn loading_and_add_new_rows_are_flagged() {
        struct SparseSource {
            len: usize,
            loaded: Vec<Record>,
        }
        impl DataProvider for SparseSource {
            fn len(&self) -> usize {
                self.len
            }
            fn item(&self, index: usize) -> Option<&dyn GridItem> {
                self.loaded.get(index).map(|r| r as &dyn GridItem)
            }
            fn item_mut(&mut self, index: usize) -> Option<&mut dyn GridItem> {
                self.loaded.get_mut(index).map(|r| r as &mut dyn GridItem)
            }
        }

        let f = Fixture::new(0, &[10, 10]);
        let data = SparseSource {
            len: 5,
            loaded: (0..3).map(|i| Record::new().with("a", i as i64)).collect(),
        };
        let mut vs = VirtualScroll::new(10, 1_000_000);
        vs.set_viewport_height(100);
        // one extra row for add-new
        vs.set_row_count(6);
        let ctx = RenderCtx {
            data: &data,
            columns: &f.columns,
            options: &f.options,
            vs: &vs,
            data_len: 5,
            scroll_left: 0,
            viewport_w: 100,
            active: None,
            editing: false,
            wheel_row: None,
        };
        let mut cache = RowCache::new();
        cache.render(&ctx, false, 0);
        assert!(!cache.row_node(2).unwrap().loading);
        assert!(cache.row_node(3).unwrap().loading);
        assert_eq!(cache.cell_node(3, 0).unwrap().text, "");
        let add_new = cache.row_node(5).unwrap();
        assert!(!add_new.loading);
        assert!(add_new.has_class(ADD_NEW_ROW_CLASS));
    }

    #[test]
    fn update_cell_reformats_unless_editing() {
        let mut f = Fixture::new(20, &[10, 10]);
        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        f.data.items_mut()[5].set_value("b", "changed".into());
        cache.update_cell(&f.ctx(), 5, 1, 0);
        assert_eq!(cache.cell_node(5, 1).unwrap().text, "changed");

        f.data.items_mut()[5].set_value("b", "again".into());
        let mut ctx = f.ctx();
        ctx.active = Some((5, 1));
        ctx.editing = true;
        cache.update_cell(&ctx, 5, 1, 0);
        assert_eq!(cache.cell_node(5, 1).unwrap().text, "changed");
    }

    #[test]
    fn decoration_pump_processes_one_row_per_tick() {
        let decorated: Rc<RefCell<Vec<usize>>> = Rc::default();
        let log = decorated.clone();
        let hook: PostRenderHook = Rc::new(move |node, row, _item, _column| {
            node.add_class("decorated");
            log.borrow_mut().push(row);
        });
        let mut f = Fixture::new(100, &[10, 10]);
        f.options.async_post_render = true;
        let columns: Vec<Column> = f
            .columns
            .columns()
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, c)| if i == 0 { c.post_render(hook.clone()) } else { c })
            .collect();
        f.columns.set(columns);

        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        cache.tick(&f.ctx(), 49);
        assert!(decorated.borrow().is_empty());
        cache.tick(&f.ctx(), 50);
        assert_eq!(*decorated.borrow(), vec![0]);
        cache.tick(&f.ctx(), 100);
        assert_eq!(*decorated.borrow(), vec![0, 1]);
        assert!(cache.cell_node(0, 0).unwrap().has_class("decorated"));
        assert!(!cache.cell_node(2, 0).unwrap().has_class("decorated"));
    }

    #[test]
    fn cleanup_pump_disposes_one_row_group_per_tick() {
        let cleaned: Rc<RefCell<Vec<(usize, usize)>>> = Rc::default();
        let log = cleaned.clone();
        let cleanup: PostRenderCleanupHook = Rc::new(move |node| {
            log.borrow_mut().push((node.row, node.cell));
        });
        let hook: PostRenderHook = Rc::new(|node, _, _, _| node.decorated = true);
        let mut f = Fixture::new(100, &[10, 10]);
        f.options.async_post_render = true;
        f.options.async_post_render_cleanup = true;
        let columns: Vec<Column> = f
            .columns
            .columns()
            .iter()
            .cloned()
            .map(|c| c.post_render(hook.clone()).post_render_cleanup(cleanup.clone()))
            .collect();
        f.columns.set(columns);

        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        let mut now = 0;
        for _ in 0..20 {
            now += 50;
            cache.tick(&f.ctx(), now);
        }
        assert!(cache.cell_node(0, 0).unwrap().decorated);

        f.vs.scroll_to(500);
        cache.render(&f.ctx(), false, now);
        assert!(!cache.is_cached(0));
        let rows_after_evict = cache.arena().row_count();

        now += 40;
        cache.tick(&f.ctx(), now);
        assert_eq!(*cleaned.borrow(), vec![(0, 0), (0, 1)]);
        assert_eq!(cache.arena().row_count(), rows_after_evict - 1);

        now += 40;
        cache.tick(&f.ctx(), now);
        assert_eq!(cleaned.borrow().len(), 4);
    }

    #[test]
    fn wheel_row_survives_eviction_as_zombie() {
        let mut f = Fixture::new(100, &[10, 10]);
        f.wheel_row = Some(2);
        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        f.vs.scroll_to(500);
        cache.render(&f.ctx(), false, 0);
        assert!(!cache.is_cached(2));
        assert_eq!(cache.zombie_row(), Some(2));
        let live = cache.cached_rows();
        assert_eq!(cache.arena().row_count(), live + 1);
        cache.kill_zombie();
        assert_eq!(cache.zombie_row(), None);
        assert_eq!(cache.arena().row_count(), live);
    }

    #[test]
    fn page_shift_repositions_survivors() {
        let mut f = Fixture::new(100, &[10, 10]);
        let mut cache = RowCache::new();
        cache.render(&f.ctx(), false, 0);
        f.vs.scroll_to(30);
        cache.page_shift(&f.ctx(), 0);
        assert_eq!(cache.row_node(5).unwrap().top, 50);
        // visible range is 3..=13; rows outside were evicted
        assert!(!cache.is_cached(0));
        assert!(cache.is_cached(13));
    }
}
