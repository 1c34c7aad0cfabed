//! The grid controller: one struct owning the data source, columns,
//! virtual scroller, row cache, editor lock and input routing.
//!
//! [`DataGrid`] is deliberately render-agnostic. It keeps the cell node
//! arena up to date and exposes it through [`DataGrid::row_cache`]; a
//! widget paints from that and feeds input back through
//! [`DataGrid::handle_key`] and [`DataGrid::handle_mouse`]. All timed
//! behavior (deferred editor loading, decoration, cleanup, drop-zone
//! polling) runs off [`DataGrid::on_tick`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use log::trace;
use thiserror::Error;

use vgrid_gesture::DragOptions;
use vgrid_gesture::DragPass;
use vgrid_gesture::DragPhase;
use vgrid_gesture::DragSensor;
use vgrid_gesture::DropOptions;
use vgrid_gesture::DropRegistry;
use vgrid_gesture::DropSink;
use vgrid_gesture::DropTracker;
use vgrid_gesture::Point;
use vgrid_gesture::PointerButton;
use vgrid_gesture::Region;

use crate::column::Column;
use crate::column::ColumnSet;
use crate::column::ColumnSort;
use crate::data::CellValue;
use crate::data::DataProvider;
use crate::data::GridItem;
use crate::editing::CellBox;
use crate::editing::ControllerHandle;
use crate::editing::EditCommand;
use crate::editing::EditOutcome;
use crate::editing::EditSession;
use crate::editing::EditSessionArgs;
use crate::editing::EditorArgs;
use crate::editing::EditorFactory;
use crate::editing::EditorKeyOutcome;
use crate::editing::EditorLock;
use crate::editing::LockError;
use crate::event::Signal;
use crate::input::InputEvent;
use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;
use crate::input::MouseButton;
use crate::input::MouseEvent;
use crate::input::MouseEventKind;
use crate::navigation::anchor_cell;
use crate::navigation::step;
use crate::navigation::CellPos;
use crate::navigation::NavDirection;
use crate::navigation::NavModel;
use crate::plugin::CellRange;
use crate::plugin::GridPlugin;
use crate::plugin::PluginId;
use crate::plugin::SelectionCtx;
use crate::plugin::SelectionModel;
use crate::row_cache::colspan_at;
use crate::row_cache::RenderCtx;
use crate::row_cache::RowCache;
use crate::timer::TimerSlot;
use crate::virtual_scroll::RowRange;
use crate::virtual_scroll::ScrollOutcome;
use crate::virtual_scroll::VirtualScroll;

#[derive(Debug, Error)]
pub enum GridError {
    /// An editing operation was requested on a grid without `editable`.
    #[error("grid is not editable")]
    NotEditable,
    #[error("unknown column id `{0}`")]
    UnknownColumn(String),
    /// `add_cell_css_styles` refuses to silently replace a key.
    #[error("cell css style key `{0}` is already in use")]
    StyleKeyInUse(String),
    #[error("no selection model is set")]
    NoSelectionModel,
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Receives commands instead of the grid applying them directly, enabling
/// undo stacks. The grid never calls [`EditCommand::undo`] itself.
pub type EditCommandHandler = Rc<dyn Fn(&mut dyn GridItem, &Column, EditCommand)>;

#[derive(Clone)]
pub struct GridOptions {
    pub row_height: u32,
    pub header_height: u32,
    /// Cap on the scrollable canvas; taller data sets are virtually paged.
    pub max_scroll_height: u64,
    pub editable: bool,
    /// Open an editor whenever a cell becomes active.
    pub auto_edit: bool,
    pub enable_cell_navigation: bool,
    /// Append a blank row below the data; committing an editor there
    /// fires [`GridEvents::add_new_row`].
    pub enable_add_row: bool,
    pub enable_column_reorder: bool,
    /// Construction does nothing until [`DataGrid::finish_init`] runs.
    pub explicit_initialization: bool,
    pub async_editor_loading: bool,
    pub async_editor_load_delay: u64,
    pub async_post_render: bool,
    pub async_post_render_delay: u64,
    pub async_post_render_cleanup: bool,
    pub async_post_render_cleanup_delay: u64,
    pub show_cell_selection: bool,
    pub multi_column_sort: bool,
    pub wheel_scroll_rows: u32,
    pub double_click_ms: u64,
    /// Pointer travel in px before a press becomes a drag.
    pub drag_distance: u32,
    pub selected_cell_css_class: String,
    /// Share one lock between grids so only one editor is open across all
    /// of them.
    pub editor_lock: Option<Rc<EditorLock>>,
    pub edit_command_handler: Option<EditCommandHandler>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            row_height: 25,
            header_height: 25,
            max_scroll_height: 6_000_000,
            editable: false,
            auto_edit: true,
            enable_cell_navigation: true,
            enable_add_row: false,
            enable_column_reorder: true,
            explicit_initialization: false,
            async_editor_loading: false,
            async_editor_load_delay: 100,
            async_post_render: false,
            async_post_render_delay: 50,
            async_post_render_cleanup: false,
            async_post_render_cleanup_delay: 40,
            show_cell_selection: true,
            multi_column_sort: false,
            wheel_scroll_rows: 3,
            double_click_ms: 400,
            drag_distance: 3,
            selected_cell_css_class: "selected".to_string(),
            editor_lock: None,
            edit_command_handler: None,
        }
    }
}

/// Overlay hash: row index to column id to css class.
pub type CellCssHash = HashMap<usize, HashMap<String, String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollInfo {
    pub scroll_left: u64,
    pub scroll_top: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellInfo {
    pub row: usize,
    pub cell: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickInfo {
    pub row: usize,
    pub cell: usize,
    pub modifiers: KeyModifiers,
}

#[derive(Clone, Debug)]
pub struct HeaderClickInfo {
    pub cell: usize,
    pub column_id: String,
}

#[derive(Clone, Debug)]
pub struct SortInfo {
    pub sort_columns: Vec<ColumnSort>,
}

#[derive(Clone, Debug)]
pub struct AddNewRowInfo {
    pub column_id: String,
    pub value: CellValue,
}

#[derive(Clone, Debug)]
pub struct ValidationErrorInfo {
    pub row: usize,
    pub cell: usize,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveCellInfo {
    pub prev: Option<(usize, usize)>,
    pub current: Option<(usize, usize)>,
}

#[derive(Clone, Debug)]
pub struct BeforeEditCellInfo {
    pub row: usize,
    pub cell: usize,
    pub column_id: String,
    pub is_add_new: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnsReorderedInfo {
    pub from: usize,
    pub to: usize,
}

#[derive(Clone, Debug)]
pub struct CellStylesChangedInfo {
    pub key: String,
}

/// Canvas-space drag report for cell drags. `from`/`to` are in canvas
/// coordinates so plugins can hit-test rows during autoscroll.
#[derive(Clone, Copy, Debug)]
pub struct DragInfo {
    pub row: usize,
    pub cell: usize,
    pub from: Point,
    pub to: Point,
}

#[derive(Clone, Debug)]
pub struct SelectedRangesInfo {
    pub ranges: Vec<CellRange>,
}

/// Every notification the grid emits. Subscribe on the field directly;
/// handlers can veto through the [`crate::event::EventScope`] they get.
#[derive(Default)]
pub struct GridEvents {
    pub scroll: Signal<ScrollInfo>,
    pub viewport_changed: Signal<()>,
    pub sort: Signal<SortInfo>,
    /// Stopping immediate propagation here suppresses sort handling.
    pub header_click: Signal<HeaderClickInfo>,
    pub header_context_menu: Signal<HeaderClickInfo>,
    /// Stopping immediate propagation here suppresses cell activation.
    pub click: Signal<ClickInfo>,
    pub double_click: Signal<ClickInfo>,
    pub context_menu: Signal<ClickInfo>,
    /// A `Some(true)` result (or stopping immediate propagation) marks
    /// the key as handled before the grid's own bindings run.
    pub key_down: Signal<KeyEvent, bool>,
    pub add_new_row: Signal<AddNewRowInfo>,
    pub validation_error: Signal<ValidationErrorInfo>,
    pub columns_reordered: Signal<ColumnsReorderedInfo>,
    pub columns_resized: Signal<()>,
    pub cell_change: Signal<CellInfo>,
    /// A `Some(false)` result vetoes opening the editor.
    pub before_edit_cell: Signal<BeforeEditCellInfo, bool>,
    pub before_cell_editor_destroy: Signal<CellInfo>,
    pub before_destroy: Signal<()>,
    pub active_cell_changed: Signal<ActiveCellInfo>,
    pub active_cell_position_changed: Signal<CellBox>,
    /// Stop immediate propagation to claim the drag; unclaimed cell
    /// drags are cancelled at the sensor.
    pub drag_init: Signal<DragInfo>,
    pub drag_start: Signal<DragInfo>,
    pub drag: Signal<DragInfo>,
    pub drag_end: Signal<DragInfo>,
    pub selected_ranges_changed: Signal<SelectedRangesInfo>,
    pub cell_css_styles_changed: Signal<CellStylesChangedInfo>,
}

#[derive(Clone, Copy)]
struct ResizeDrag {
    cell: usize,
    start_width: u32,
}

/// Mutable grid state split off so a [`RenderCtx`] can borrow it while
/// the row cache is borrowed mutably alongside.
struct GridState {
    data: Box<dyn DataProvider>,
    columns: ColumnSet,
    options: GridOptions,
    vs: VirtualScroll,
    scroll_left: u64,
    viewport_w: u32,
    active: Option<CellPos>,
    session: Option<Rc<RefCell<EditSession>>>,
    lock: Rc<EditorLock>,
    sort_columns: Vec<ColumnSort>,
    wheel_row: Option<usize>,
}

impl GridState {
    fn data_len(&self) -> usize {
        self.data.len()
    }

    fn data_len_including_add_new(&self) -> usize {
        self.data.len() + usize::from(self.options.enable_add_row)
    }

    fn is_editing(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.borrow().has_editor())
    }

    fn active_pair(&self) -> Option<(usize, usize)> {
        self.active.map(|p| (p.row, p.cell))
    }

    fn ctx(&self) -> RenderCtx<'_> {
        RenderCtx {
            data: &*self.data,
            columns: &self.columns,
            options: &self.options,
            vs: &self.vs,
            data_len: self.data.len(),
            scroll_left: self.scroll_left,
            viewport_w: self.viewport_w,
            active: self.active_pair(),
            editing: self.is_editing(),
            wheel_row: self.wheel_row,
        }
    }

    fn resolve_editor(&self, row: usize, cell: usize) -> Option<Rc<dyn EditorFactory>> {
        let column = self.columns.get(cell)?;
        if let Some(meta) = self.data.row_metadata(row) {
            if let Some(factory) = meta.cell(&column.id, cell).and_then(|m| m.editor.clone()) {
                return Some(factory);
            }
        }
        column.editor.clone()
    }

    fn is_cell_potentially_editable(&self, row: usize, cell: usize) -> bool {
        let data_len = self.data_len();
        // Not loaded yet?
        if row < data_len && self.data.item(row).is_none() {
            return false;
        }
        if row >= data_len
            && self.columns.get(cell).is_some_and(|c| c.cannot_trigger_insert)
        {
            return false;
        }
        self.resolve_editor(row, cell).is_some()
    }

    fn can_cell_be_selected(&self, row: usize, cell: usize) -> bool {
        if row >= self.data_len() || cell >= self.columns.len() {
            return false;
        }
        let meta = self.data.row_metadata(row);
        if let Some(selectable) = meta.as_ref().and_then(|m| m.selectable) {
            return selectable;
        }
        let Some(column) = self.columns.get(cell) else {
            return false;
        };
        if let Some(cm) = meta.as_ref().and_then(|m| m.cell(&column.id, cell)) {
            if let Some(selectable) = cm.selectable {
                return selectable;
            }
        }
        column.selectable
    }
}

impl NavModel for GridState {
    fn row_count(&self) -> usize {
        self.data_len_including_add_new()
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn can_cell_be_active(&self, row: usize, cell: usize) -> bool {
        if !self.options.enable_cell_navigation {
            return false;
        }
        if row >= self.data_len_including_add_new() || cell >= self.columns.len() {
            return false;
        }
        let meta = self.data.row_metadata(row);
        if let Some(focusable) = meta.as_ref().and_then(|m| m.focusable) {
            return focusable;
        }
        let Some(column) = self.columns.get(cell) else {
            return false;
        };
        if let Some(cm) = meta.as_ref().and_then(|m| m.cell(&column.id, cell)) {
            if let Some(focusable) = cm.focusable {
                return focusable;
            }
        }
        column.focusable
    }

    fn colspan(&self, row: usize, cell: usize) -> u32 {
        colspan_at(&self.columns, self.data.row_metadata(row).as_ref(), cell)
    }
}

/// Routes [`DropTracker`] callbacks during a header reorder drag.
struct ReorderSink<'a> {
    over: &'a mut Option<usize>,
    dropped: &'a mut Option<usize>,
}

impl DropSink<usize> for ReorderSink<'_> {
    fn drop_start(&mut self, zone: &usize) -> bool {
        *self.over = Some(*zone);
        true
    }

    fn drop_end(&mut self, zone: &usize) {
        if *self.over == Some(*zone) {
            *self.over = None;
        }
    }

    fn drop(&mut self, zone: &usize) {
        *self.dropped = Some(*zone);
    }
}

fn drag_info(pass: &DragPass<'_, (usize, usize)>) -> DragInfo {
    let (row, cell) = pass.target().copied().unwrap_or((0, 0));
    DragInfo {
        row,
        cell,
        from: pass.origin,
        to: pass.at,
    }
}

fn header_region(columns: &ColumnSet, cell: usize, header_height: u32) -> Region {
    let left = columns.left(cell) as i32;
    let width = columns.get(cell).map(|c| c.width).unwrap_or(0);
    Region::from_size(left, 0, width, header_height)
}

pub struct DataGrid {
    state: GridState,
    cache: RowCache,
    events: GridEvents,
    plugins: Vec<(PluginId, Box<dyn GridPlugin>)>,
    next_plugin: usize,
    selection: Option<Box<dyn SelectionModel>>,
    overlays: HashMap<String, CellCssHash>,
    header_sensor: DragSensor<usize>,
    resize_sensor: DragSensor<ResizeDrag>,
    cell_sensor: DragSensor<(usize, usize)>,
    drop_zones: DropRegistry<usize>,
    drop_tracker: Option<DropTracker<usize>>,
    reorder_from: Option<usize>,
    reorder_over: Option<usize>,
    editor_loader: TimerSlot,
    last_click: Option<(usize, usize, u64)>,
    last_rendered_scroll_left: u64,
    h_dirty: bool,
    initialized: bool,
}

impl DataGrid {
    pub fn new(data: Box<dyn DataProvider>, columns: Vec<Column>, options: GridOptions) -> Self {
        let lock = options.editor_lock.clone().unwrap_or_default();
        let vs = VirtualScroll::new(options.row_height, options.max_scroll_height);
        let drag = DragOptions {
            button: PointerButton::Primary,
            distance: options.drag_distance,
        };
        let explicit = options.explicit_initialization;
        let mut grid = Self {
            state: GridState {
                data,
                columns: ColumnSet::new(columns),
                options,
                vs,
                scroll_left: 0,
                viewport_w: 0,
                active: None,
                session: None,
                lock,
                sort_columns: Vec::new(),
                wheel_row: None,
            },
            cache: RowCache::new(),
            events: GridEvents::default(),
            plugins: Vec::new(),
            next_plugin: 0,
            selection: None,
            overlays: HashMap::new(),
            header_sensor: DragSensor::new(drag),
            resize_sensor: DragSensor::new(DragOptions {
                button: PointerButton::Primary,
                distance: 0,
            }),
            cell_sensor: DragSensor::new(drag),
            drop_zones: DropRegistry::new(),
            drop_tracker: None,
            reorder_from: None,
            reorder_over: None,
            editor_loader: TimerSlot::new(),
            last_click: None,
            last_rendered_scroll_left: 0,
            h_dirty: false,
            initialized: false,
        };
        if !explicit {
            grid.finish_init();
        }
        grid
    }

    /// Second half of two-phase construction. A no-op when already done.
    pub fn finish_init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        let rows = self.state.data_len_including_add_new();
        self.state.vs.set_row_count(rows);
        self.rebuild_header_zones();
        debug!(
            "grid initialized: {} rows, {} columns",
            rows,
            self.state.columns.len()
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Close any editor, destroy plugins and the selection model, and
    /// drop every cached node.
    pub fn destroy(&mut self, now: u64) {
        self.state.lock.cancel_current_edit();
        self.drain_session(now);
        self.events.before_destroy.notify(&());
        while let Some((_, mut plugin)) = self.plugins.pop() {
            plugin.destroy();
        }
        if let Some(mut model) = self.selection.take() {
            model.destroy();
        }
        self.editor_loader.disarm();
        self.drop_tracker = None;
        self.drop_zones.clear();
        let ctx = self.state.ctx();
        self.cache.invalidate_all_rows(&ctx, now);
        self.cache.kill_zombie();
        self.initialized = false;
        debug!("grid destroyed");
    }

    pub fn events(&mut self) -> &mut GridEvents {
        &mut self.events
    }

    pub fn options(&self) -> &GridOptions {
        &self.state.options
    }

    pub fn editor_lock(&self) -> Rc<EditorLock> {
        self.state.lock.clone()
    }

    /// The active edit session as a lock controller, if one is open.
    pub fn edit_controller(&self) -> Option<ControllerHandle> {
        self.state
            .session
            .clone()
            .map(|s| s as ControllerHandle)
    }

    pub fn is_editing(&self) -> bool {
        self.state.is_editing()
    }

    pub fn row_cache(&self) -> &RowCache {
        &self.cache
    }

    pub fn virtual_scroll(&self) -> &VirtualScroll {
        &self.state.vs
    }
}

/// Data and columns.
impl DataGrid {
    pub fn data(&self) -> &dyn DataProvider {
        &*self.state.data
    }

    pub fn data_mut(&mut self) -> &mut dyn DataProvider {
        &mut *self.state.data
    }

    pub fn data_length(&self) -> usize {
        self.state.data_len()
    }

    pub fn item(&self, row: usize) -> Option<&dyn GridItem> {
        self.state.data.item(row)
    }

    /// Swap the data source. Does not resync the scroller; call
    /// [`DataGrid::update_row_count`] once the new source is in place.
    pub fn set_data(&mut self, data: Box<dyn DataProvider>, scroll_to_top: bool, now: u64) {
        self.invalidate_all_rows(now);
        self.state.data = data;
        if scroll_to_top {
            self.scroll_to(0, now);
        }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.state.columns
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.state.columns.index_of(id)
    }

    pub fn set_columns(&mut self, columns: Vec<Column>, now: u64) {
        self.state.columns.set(columns);
        self.h_dirty = true;
        if self.initialized {
            self.rebuild_header_zones();
            self.invalidate_all_rows(now);
            self.render(now);
        }
    }

    pub fn update_column_header(
        &mut self,
        id: &str,
        name: impl Into<String>,
        tooltip: Option<String>,
    ) -> Result<(), GridError> {
        if !self.initialized {
            return Ok(());
        }
        let Some(index) = self.state.columns.index_of(id) else {
            return Err(GridError::UnknownColumn(id.to_string()));
        };
        self.state.columns.set_header(index, name.into(), tooltip);
        Ok(())
    }

    /// Distribute the viewport width across resizable columns.
    pub fn autosize_columns(&mut self, now: u64) {
        let avail = self.state.viewport_w;
        self.state.columns.autosize(avail);
        self.rebuild_header_zones();
        self.h_dirty = true;
        self.events.columns_resized.notify(&());
        self.render(now);
    }

    pub fn sort_columns(&self) -> &[ColumnSort] {
        &self.state.sort_columns
    }

    pub fn set_sort_column(&mut self, id: impl Into<String>, ascending: bool) {
        self.set_sort_columns(vec![ColumnSort {
            column_id: id.into(),
            ascending,
        }]);
    }

    /// Record the sort state shown in headers. Sorting the data itself is
    /// the embedder's job, usually from a [`GridEvents::sort`] handler.
    pub fn set_sort_columns(&mut self, sort_columns: Vec<ColumnSort>) {
        self.state.sort_columns = sort_columns;
    }
}

/// Viewport and scrolling.
impl DataGrid {
    /// Set the widget size in pixels; the canvas is `height` minus the
    /// header strip.
    pub fn resize(&mut self, width: u32, height: u32, now: u64) {
        self.state.viewport_w = width;
        let canvas = height.saturating_sub(self.state.options.header_height);
        let outcome = self.state.vs.set_viewport_height(canvas);
        self.h_dirty = true;
        self.after_scroll(outcome, now);
        if self.initialized {
            self.render(now);
        }
    }

    pub fn visible_range(&self) -> RowRange {
        self.state.vs.visible_range()
    }

    pub fn rendered_range(&self) -> RowRange {
        self.state.vs.rendered_range()
    }

    pub fn scroll_position(&self) -> ScrollInfo {
        ScrollInfo {
            scroll_left: self.state.scroll_left,
            scroll_top: self.state.vs.scroll_top(),
        }
    }

    /// Scroll the canvas to virtual position `y`.
    pub fn scroll_to(&mut self, y: u64, now: u64) {
        let outcome = self.state.vs.scroll_to(y);
        self.after_scroll(outcome, now);
    }

    pub fn scroll_by(&mut self, dy: i64, now: u64) {
        let outcome = self.state.vs.scroll_by(dy);
        self.after_scroll(outcome, now);
    }

    pub fn scroll_left_to(&mut self, x: u64, now: u64) {
        let max = self
            .state
            .columns
            .total_width()
            .saturating_sub(u64::from(self.state.viewport_w));
        let x = x.min(max);
        if x == self.state.scroll_left {
            return;
        }
        self.state.scroll_left = x;
        self.events.viewport_changed.notify(&());
        let info = ScrollInfo {
            scroll_left: self.state.scroll_left,
            scroll_top: self.state.vs.scroll_top(),
        };
        self.events.scroll.notify(&info);
        self.sync_editor_position(now);
    }

    pub fn scroll_row_into_view(&mut self, row: usize, now: u64) {
        let rh = u64::from(self.state.options.row_height);
        let vh = u64::from(self.state.vs.viewport_height());
        let vtop = self.state.vs.virtual_top();
        let row_top = row as u64 * rh;
        let row_bottom = row_top + rh;
        if row_bottom > vtop + vh {
            self.scroll_to(row_bottom.saturating_sub(vh), now);
            self.render(now);
        } else if row_top < vtop {
            self.scroll_to(row_top, now);
            self.render(now);
        }
    }

    pub fn scroll_row_to_top(&mut self, row: usize, now: u64) {
        self.scroll_to(row as u64 * u64::from(self.state.options.row_height), now);
        self.render(now);
    }

    pub fn scroll_cell_into_view(&mut self, row: usize, cell: usize, now: u64) {
        self.scroll_row_into_view(row, now);
        if cell >= self.state.columns.len() {
            return;
        }
        let colspan = self.state.colspan(row, cell);
        let left = self.state.columns.left(cell);
        let right = self.state.columns.span_right(cell, colspan);
        let vw = u64::from(self.state.viewport_w);
        if left < self.state.scroll_left {
            self.scroll_left_to(left, now);
        } else if right > self.state.scroll_left + vw {
            self.scroll_left_to(left.min(right.saturating_sub(vw)), now);
        }
    }

    fn after_scroll(&mut self, outcome: ScrollOutcome, now: u64) {
        if outcome.offset_changed {
            let ctx = self.state.ctx();
            self.cache.page_shift(&ctx, now);
        }
        if outcome.scrolled || outcome.offset_changed {
            self.events.viewport_changed.notify(&());
        }
        if outcome.scrolled {
            let info = ScrollInfo {
                scroll_left: self.state.scroll_left,
                scroll_top: self.state.vs.scroll_top(),
            };
            self.events.scroll.notify(&info);
            self.sync_editor_position(now);
        }
    }

    fn sync_editor_position(&mut self, _now: u64) {
        if !self.state.is_editing() {
            return;
        }
        let Some(cell_box) = self.active_cell_box() else {
            return;
        };
        if let Some(session) = self.state.session.clone() {
            let mut session = session.borrow_mut();
            if let Some(editor) = session.editor_mut() {
                editor.position(&cell_box);
                if cell_box.visible {
                    editor.show();
                } else {
                    editor.hide();
                }
            }
        }
        self.events.active_cell_position_changed.notify(&cell_box);
    }

    fn scroll_page(&mut self, dir: i64, now: u64) {
        let delta_rows = dir * self.state.vs.rows_per_page() as i64;
        let current = self.state.vs.row_at_position(self.state.vs.scroll_top()) as i64;
        let target = (current + delta_rows).max(0) as u64;
        self.scroll_to(target * u64::from(self.state.options.row_height), now);
        self.render(now);
        if !self.state.options.enable_cell_navigation {
            return;
        }
        let Some(pos) = self.state.active else {
            return;
        };
        let len = self.state.data_len_including_add_new() as i64;
        if len == 0 {
            return;
        }
        let row = (pos.row as i64 + delta_rows).clamp(0, len - 1) as usize;
        match anchor_cell(&self.state, row, pos.pos_x) {
            Some(cell) => {
                let next = CellPos {
                    row,
                    cell,
                    pos_x: pos.pos_x,
                };
                let edit = row == self.state.data_len() || self.state.options.auto_edit;
                self.set_active_internal(Some(next), edit, now);
            }
            None => self.reset_active_cell(now),
        }
    }
}

/// Rendering and invalidation.
impl DataGrid {
    /// Bring the cache in line with the viewport. Idempotent between
    /// scrolls; call every frame before painting.
    pub fn render(&mut self, now: u64) {
        if !self.initialized {
            return;
        }
        let h_scrolled =
            self.h_dirty || self.state.scroll_left != self.last_rendered_scroll_left;
        let ctx = self.state.ctx();
        self.cache.render(&ctx, h_scrolled, now);
        self.last_rendered_scroll_left = self.state.scroll_left;
        self.h_dirty = false;
        if self.cache.zombie_row() != self.state.wheel_row {
            self.cache.kill_zombie();
        }
    }

    /// Resync the scroller with the data source length, dropping cached
    /// rows past the end.
    pub fn update_row_count(&mut self, now: u64) {
        if !self.initialized {
            return;
        }
        self.make_active_cell_normal(now);
        let new_len = self.state.data_len_including_add_new();
        let stale: Vec<usize> = self
            .cache
            .rows_in_order()
            .into_iter()
            .map(|(row, _)| row)
            .filter(|&row| row >= new_len)
            .collect();
        if !stale.is_empty() {
            let ctx = self.state.ctx();
            for row in stale {
                self.cache.remove_row(&ctx, row, now);
            }
        }
        if self.cache.zombie_row().is_some_and(|row| row >= new_len) {
            self.cache.kill_zombie();
        }
        if self.state.active.is_some_and(|p| p.row >= new_len) {
            self.reset_active_cell(now);
        }
        let outcome = self.state.vs.set_row_count(new_len);
        self.after_scroll(outcome, now);
    }

    pub fn invalidate(&mut self, now: u64) {
        self.update_row_count(now);
        self.invalidate_all_rows(now);
        self.render(now);
    }

    pub fn invalidate_all_rows(&mut self, now: u64) {
        self.make_active_cell_normal(now);
        let ctx = self.state.ctx();
        self.cache.invalidate_all_rows(&ctx, now);
    }

    pub fn invalidate_rows(&mut self, rows: &[usize], now: u64) {
        if rows.is_empty() {
            return;
        }
        if self.state.is_editing()
            && self.state.active.is_some_and(|p| rows.contains(&p.row))
        {
            self.make_active_cell_normal(now);
        }
        let ctx = self.state.ctx();
        self.cache.invalidate_rows(&ctx, rows, now);
    }

    /// Re-render one cell from the data, or reload the open editor when
    /// it sits on that cell.
    pub fn update_cell(&mut self, row: usize, cell: usize, now: u64) {
        if self.state.is_editing() && self.state.active_pair() == Some((row, cell)) {
            if let Some(session) = self.state.session.clone() {
                if let Some(item) = self.state.data.item(row) {
                    session.borrow_mut().load_item(item);
                }
            }
        } else {
            let ctx = self.state.ctx();
            self.cache.update_cell(&ctx, row, cell, now);
        }
    }

    pub fn update_row(&mut self, row: usize, now: u64) {
        if self.state.is_editing() && self.state.active.map(|p| p.row) == Some(row) {
            if let Some(session) = self.state.session.clone() {
                if let Some(item) = self.state.data.item(row) {
                    session.borrow_mut().load_item(item);
                }
            }
        }
        let ctx = self.state.ctx();
        self.cache.update_row(&ctx, row, now);
    }
}

/// Cell geometry.
impl DataGrid {
    /// Hit-test widget coordinates. `(0, 0)` is the header's top-left;
    /// rows start below the header strip.
    pub fn cell_at_point(&self, x: u32, y: u32) -> Option<(usize, usize)> {
        let header = self.state.options.header_height;
        if y < header {
            return None;
        }
        let canvas_y = self.state.vs.scroll_top() + u64::from(y - header);
        let row = self.state.vs.row_at_position(canvas_y);
        if row >= self.state.data_len_including_add_new() {
            return None;
        }
        let cell = self
            .state
            .columns
            .col_at_x(self.state.scroll_left + u64::from(x))?;
        Some((row, cell))
    }

    pub fn cell_at_event(&self, ev: &MouseEvent) -> Option<(usize, usize)> {
        self.cell_at_point(u32::from(ev.x), u32::from(ev.y))
    }

    /// Widget-space rectangle of a cell, honoring colspan and scroll.
    pub fn cell_box(&self, row: usize, cell: usize) -> Option<CellBox> {
        if row >= self.state.data_len_including_add_new()
            || cell >= self.state.columns.len()
        {
            return None;
        }
        let header = i64::from(self.state.options.header_height);
        let colspan = self.state.colspan(row, cell);
        let top = header + self.state.vs.row_top(row) - self.state.vs.scroll_top() as i64;
        let left_abs = self.state.columns.left(cell);
        let right_abs = self.state.columns.span_right(cell, colspan);
        let left = left_abs as i64 - self.state.scroll_left as i64;
        let width = right_abs.saturating_sub(left_abs) as u32;
        let height = self.state.options.row_height;
        let visible = top + i64::from(height) > header
            && top < header + i64::from(self.state.vs.viewport_height())
            && left + i64::from(width) > 0
            && left < i64::from(self.state.viewport_w);
        Some(CellBox {
            row,
            cell,
            top,
            left: left.max(0) as u64,
            width,
            height,
            visible,
        })
    }

    pub fn active_cell_box(&self) -> Option<CellBox> {
        let pos = self.state.active?;
        self.cell_box(pos.row, pos.cell)
    }
}

/// Active cell and navigation.
impl DataGrid {
    pub fn active_cell(&self) -> Option<(usize, usize)> {
        self.state.active_pair()
    }

    pub fn set_active_cell(&mut self, row: usize, cell: usize, now: u64) {
        if !self.initialized || !self.state.options.enable_cell_navigation {
            return;
        }
        if row > self.state.data_len() || cell >= self.state.columns.len() {
            return;
        }
        self.scroll_cell_into_view(row, cell, now);
        self.set_active_internal(Some(CellPos::new(row, cell)), false, now);
    }

    pub fn reset_active_cell(&mut self, now: u64) {
        self.set_active_internal(None, false, now);
    }

    pub fn go_to_cell(&mut self, row: usize, cell: usize, force_edit: bool, now: u64) {
        if !self.initialized || !self.state.can_cell_be_active(row, cell) {
            return;
        }
        if !self.state.lock.commit_current_edit() {
            self.drain_session(now);
            return;
        }
        self.drain_session(now);
        self.scroll_cell_into_view(row, cell, now);
        let edit =
            force_edit || row == self.state.data_len() || self.state.options.auto_edit;
        self.set_active_internal(Some(CellPos::new(row, cell)), edit, now);
    }

    pub fn navigate_up(&mut self, now: u64) -> bool {
        self.navigate(NavDirection::Up, now)
    }

    pub fn navigate_down(&mut self, now: u64) -> bool {
        self.navigate(NavDirection::Down, now)
    }

    pub fn navigate_left(&mut self, now: u64) -> bool {
        self.navigate(NavDirection::Left, now)
    }

    pub fn navigate_right(&mut self, now: u64) -> bool {
        self.navigate(NavDirection::Right, now)
    }

    pub fn navigate_next(&mut self, now: u64) -> bool {
        self.navigate(NavDirection::Next, now)
    }

    pub fn navigate_prev(&mut self, now: u64) -> bool {
        self.navigate(NavDirection::Prev, now)
    }

    fn navigate(&mut self, dir: NavDirection, now: u64) -> bool {
        if !self.state.options.enable_cell_navigation {
            return false;
        }
        if self.state.active.is_none()
            && !matches!(dir, NavDirection::Next | NavDirection::Prev)
        {
            return false;
        }
        if !self.state.lock.commit_current_edit() {
            self.drain_session(now);
            return true;
        }
        self.drain_session(now);
        match step(&self.state, dir, self.state.active) {
            Some(pos) => {
                self.scroll_cell_into_view(pos.row, pos.cell, now);
                let edit =
                    pos.row == self.state.data_len() || self.state.options.auto_edit;
                self.set_active_internal(Some(pos), edit, now);
                true
            }
            None => {
                // Dead end: re-activate in place so auto-edit reopens.
                if let Some(pos) = self.state.active {
                    let edit =
                        pos.row == self.state.data_len() || self.state.options.auto_edit;
                    self.set_active_internal(Some(pos), edit, now);
                }
                false
            }
        }
    }

    fn set_active_internal(&mut self, new: Option<CellPos>, edit_mode: bool, now: u64) {
        self.make_active_cell_normal(now);
        let prev = self.state.active;
        if let Some(p) = prev {
            self.cache.set_row_class(p.row, "active", false);
            self.cache.set_cell_class(p.row, p.cell, "active", false);
        }
        self.state.active = new;
        self.editor_loader.disarm();
        if let Some(p) = new {
            if self.state.options.show_cell_selection {
                self.cache.set_row_class(p.row, "active", true);
            }
            self.cache.set_cell_class(p.row, p.cell, "active", true);
            if self.state.options.editable
                && edit_mode
                && self.state.is_cell_potentially_editable(p.row, p.cell)
            {
                if self.state.options.async_editor_loading {
                    self.editor_loader
                        .arm(now, self.state.options.async_editor_load_delay);
                } else {
                    let _ = self.make_active_cell_editable(now);
                }
            }
        }
        trace!("active cell: {:?} -> {:?}", prev.map(|p| (p.row, p.cell)), new.map(|p| (p.row, p.cell)));
        let info = ActiveCellInfo {
            prev: prev.map(|p| (p.row, p.cell)),
            current: new.map(|p| (p.row, p.cell)),
        };
        self.events.active_cell_changed.notify(&info);
    }
}

/// Editing.
impl DataGrid {
    /// Open an editor on the active cell.
    pub fn edit_active_cell(&mut self, now: u64) -> Result<(), GridError> {
        self.make_active_cell_editable(now)
    }

    /// Snapshot of the open editor for painting: widget-space cell box,
    /// display text and caret offset.
    pub fn editor_overlay(&self) -> Option<(CellBox, String, Option<usize>)> {
        let session = self.state.session.as_ref()?;
        let session = session.borrow();
        let editor = session.editor()?;
        let cell_box = self.cell_box(session.row(), session.cell())?;
        Some((cell_box, editor.text(), editor.cursor()))
    }

    pub fn commit_current_edit(&mut self, now: u64) -> bool {
        let ok = self.state.lock.commit_current_edit();
        self.drain_session(now);
        ok
    }

    pub fn cancel_current_edit(&mut self, now: u64) -> bool {
        let ok = self.state.lock.cancel_current_edit();
        self.drain_session(now);
        ok
    }

    fn make_active_cell_editable(&mut self, now: u64) -> Result<(), GridError> {
        let Some(pos) = self.state.active else {
            return Ok(());
        };
        if !self.state.options.editable {
            return Err(GridError::NotEditable);
        }
        self.editor_loader.disarm();
        if !self.state.is_cell_potentially_editable(pos.row, pos.cell) {
            return Ok(());
        }
        let Some(column_id) = self.state.columns.get(pos.cell).map(|c| c.id.clone()) else {
            return Ok(());
        };
        let is_add_new = pos.row >= self.state.data_len();
        let before = BeforeEditCellInfo {
            row: pos.row,
            cell: pos.cell,
            column_id: column_id.clone(),
            is_add_new,
        };
        let out = self.events.before_edit_cell.notify(&before);
        if out.result == Some(false) {
            return Ok(());
        }
        let Some(factory) = self.state.resolve_editor(pos.row, pos.cell) else {
            return Ok(());
        };
        let position = self.cell_box(pos.row, pos.cell).unwrap_or_default();
        let mut editor = {
            let column = self
                .state
                .columns
                .get(pos.cell)
                .ok_or_else(|| GridError::UnknownColumn(column_id.clone()))?;
            let item = self.state.data.item(pos.row);
            let args = EditorArgs {
                row: pos.row,
                cell: pos.cell,
                column,
                item,
                position,
            };
            let mut editor = factory.make(&args);
            if let Some(item) = item {
                editor.load_value(item);
            }
            editor
        };
        editor.position(&position);
        editor.show();
        let session = EditSession::begin(
            EditSessionArgs {
                row: pos.row,
                cell: pos.cell,
                column_id,
                is_add_new,
                defer_apply: self.state.options.edit_command_handler.is_some(),
            },
            editor,
            &self.state.lock,
        )?;
        self.state.session = Some(session);
        self.cache.set_cell_class(pos.row, pos.cell, "editable", true);
        Ok(())
    }

    /// Cancel any open editor without committing.
    fn make_active_cell_normal(&mut self, now: u64) {
        let Some(session) = self.state.session.clone() else {
            return;
        };
        if session.borrow().has_editor() {
            session.borrow_mut().cancel();
        }
        self.drain_session(now);
    }

    /// Apply queued session outcomes in order: data writes, cell class
    /// and cache refreshes, and the matching notifications.
    fn drain_session(&mut self, now: u64) {
        let Some(session) = self.state.session.clone() else {
            return;
        };
        let outcomes = session.borrow_mut().take_outcomes();
        for outcome in outcomes {
            match outcome {
                EditOutcome::Apply(cmd) => {
                    let handler = self.state.options.edit_command_handler.clone();
                    match handler {
                        Some(handler) => {
                            let column = self.state.columns.get(cmd.cell).cloned();
                            if let Some(column) = column {
                                if let Some(item) = self.state.data.item_mut(cmd.row) {
                                    handler(item, &column, cmd);
                                }
                            }
                        }
                        None => {
                            if let Some(item) = self.state.data.item_mut(cmd.row) {
                                cmd.execute(item);
                            }
                        }
                    }
                }
                EditOutcome::Closed { row, cell } => {
                    self.events
                        .before_cell_editor_destroy
                        .notify(&CellInfo { row, cell });
                    self.cache.set_cell_class(row, cell, "editable", false);
                    self.cache.set_cell_class(row, cell, "invalid", false);
                    let ctx = self.state.ctx();
                    self.cache.update_cell(&ctx, row, cell, now);
                }
                EditOutcome::Changed { row, cell } => {
                    let ctx = self.state.ctx();
                    self.cache.update_row(&ctx, row, now);
                    self.events.cell_change.notify(&CellInfo { row, cell });
                }
                EditOutcome::AddNew { column_id, value } => {
                    self.events
                        .add_new_row
                        .notify(&AddNewRowInfo { column_id, value });
                }
                EditOutcome::Invalid { row, cell, message } => {
                    self.cache.set_cell_class(row, cell, "invalid", true);
                    self.events.validation_error.notify(&ValidationErrorInfo {
                        row,
                        cell,
                        message,
                    });
                }
            }
        }
        if !session.borrow().has_editor() {
            self.state.session = None;
        }
    }

    fn commit_edit_and_set_focus(&mut self, now: u64) {
        let ok = self.state.lock.commit_current_edit();
        self.drain_session(now);
        if ok && self.state.options.auto_edit {
            self.navigate(NavDirection::Down, now);
        }
    }

    fn cancel_edit_and_set_focus(&mut self, now: u64) {
        self.state.lock.cancel_current_edit();
        self.drain_session(now);
    }
}

/// Selection and cell css overlays.
impl DataGrid {
    pub fn set_selection_model(&mut self, model: Box<dyn SelectionModel>, now: u64) {
        if let Some(mut old) = self.selection.take() {
            old.destroy();
        }
        let ranges = model.selected_ranges().to_vec();
        self.selection = Some(model);
        self.apply_selection(ranges, now);
    }

    pub fn selection_model(&self) -> Option<&dyn SelectionModel> {
        self.selection.as_deref()
    }

    pub fn selected_ranges(&self) -> &[CellRange] {
        self.selection
            .as_ref()
            .map(|m| m.selected_ranges())
            .unwrap_or(&[])
    }

    pub fn selected_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .selected_ranges()
            .iter()
            .flat_map(|r| r.from_row..=r.to_row)
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    pub fn set_selected_rows(&mut self, rows: &[usize], now: u64) -> Result<(), GridError> {
        if self.selection.is_none() {
            return Err(GridError::NoSelectionModel);
        }
        let column_count = self.state.columns.len();
        let ranges: Vec<CellRange> = rows
            .iter()
            .map(|&row| CellRange::rows(row, row, column_count))
            .collect();
        if let Some(model) = self.selection.as_mut() {
            model.set_selected_ranges(ranges.clone());
        }
        self.apply_selection(ranges, now);
        Ok(())
    }

    /// Paint selection through the overlay layer under the configured
    /// selected-cell class and notify.
    fn apply_selection(&mut self, ranges: Vec<CellRange>, _now: u64) {
        let class = self.state.options.selected_cell_css_class.clone();
        let mut hash: CellCssHash = HashMap::new();
        for range in &ranges {
            for row in range.from_row..=range.to_row {
                for cell in range.from_cell..=range.to_cell {
                    if cell >= self.state.columns.len() {
                        break;
                    }
                    if !self.state.can_cell_be_selected(row, cell) {
                        continue;
                    }
                    let Some(column) = self.state.columns.get(cell) else {
                        continue;
                    };
                    hash.entry(row)
                        .or_default()
                        .insert(column.id.clone(), class.clone());
                }
            }
        }
        self.overlays.insert(class.clone(), hash);
        self.events
            .cell_css_styles_changed
            .notify(&CellStylesChangedInfo { key: class });
        self.events
            .selected_ranges_changed
            .notify(&SelectedRangesInfo { ranges });
    }

    /// Replace the overlay hash stored under `key`.
    pub fn set_cell_css_styles(&mut self, key: impl Into<String>, hash: CellCssHash) {
        let key = key.into();
        self.overlays.insert(key.clone(), hash);
        self.events
            .cell_css_styles_changed
            .notify(&CellStylesChangedInfo { key });
    }

    /// Like [`DataGrid::set_cell_css_styles`], but refuses to clobber an
    /// existing key.
    pub fn add_cell_css_styles(
        &mut self,
        key: impl Into<String>,
        hash: CellCssHash,
    ) -> Result<(), GridError> {
        let key = key.into();
        if self.overlays.contains_key(&key) {
            return Err(GridError::StyleKeyInUse(key));
        }
        self.set_cell_css_styles(key, hash);
        Ok(())
    }

    pub fn remove_cell_css_styles(&mut self, key: &str) {
        if self.overlays.remove(key).is_some() {
            self.events
                .cell_css_styles_changed
                .notify(&CellStylesChangedInfo {
                    key: key.to_string(),
                });
        }
    }

    pub fn cell_css_styles(&self, key: &str) -> Option<&CellCssHash> {
        self.overlays.get(key)
    }

    /// Overlay classes for one cell, merged across all keys. Widgets call
    /// this at paint time; overlays never touch cached nodes.
    pub fn overlay_classes(&self, row: usize, cell: usize) -> Vec<&str> {
        let Some(column) = self.state.columns.get(cell) else {
            return Vec::new();
        };
        let mut classes: Vec<&str> = self
            .overlays
            .values()
            .filter_map(|hash| {
                hash.get(&row)
                    .and_then(|cols| cols.get(column.id.as_str()))
                    .map(String::as_str)
            })
            .collect();
        classes.sort_unstable();
        classes
    }
}

/// Plugins.
impl DataGrid {
    pub fn register_plugin(&mut self, plugin: Box<dyn GridPlugin>) -> PluginId {
        let id = PluginId(self.next_plugin);
        self.next_plugin += 1;
        debug!("plugin registered: {}", plugin.name());
        self.plugins.push((id, plugin));
        id
    }

    pub fn unregister_plugin(&mut self, id: PluginId) -> bool {
        match self.plugins.iter().position(|(pid, _)| *pid == id) {
            Some(index) => {
                let (_, mut plugin) = self.plugins.remove(index);
                plugin.destroy();
                true
            }
            None => false,
        }
    }
}

/// Input routing.
impl DataGrid {
    pub fn handle_input(&mut self, ev: &InputEvent, now: u64) -> bool {
        match ev {
            InputEvent::Key(key) => self.handle_key(key, now),
            InputEvent::Mouse(mouse) => self.handle_mouse(mouse, now),
            InputEvent::Paste(text) => {
                if !self.state.is_editing() {
                    return false;
                }
                if let Some(session) = self.state.session.clone() {
                    let mut session = session.borrow_mut();
                    if let Some(editor) = session.editor_mut() {
                        for ch in text.chars() {
                            let _ = editor.handle_key(&KeyEvent::new(KeyCode::Char(ch)));
                        }
                    }
                }
                true
            }
        }
    }

    /// Route a key press: subscribers, then the open editor, then the
    /// selection model, then the grid's own bindings.
    pub fn handle_key(&mut self, key: &KeyEvent, now: u64) -> bool {
        if !self.initialized {
            return false;
        }
        let out = self.events.key_down.notify(key);
        if out.immediate_propagation_stopped || out.result == Some(true) {
            return true;
        }
        if self.state.is_editing() {
            if let Some(session) = self.state.session.clone() {
                let outcome = {
                    let mut session = session.borrow_mut();
                    session.editor_mut().map(|e| e.handle_key(key))
                };
                if matches!(outcome, Some(EditorKeyOutcome::Consumed)) {
                    return true;
                }
            }
        }
        if let Some(model) = self.selection.as_mut() {
            let sctx = SelectionCtx {
                active: self.state.active.map(|p| (p.row, p.cell)),
                row_count: self.state.data.len(),
                column_count: self.state.columns.len(),
            };
            if let Some(ranges) = model.handle_key(&sctx, key) {
                self.apply_selection(ranges, now);
                return true;
            }
        }
        if key.modifiers.is_plain() {
            match key.code {
                KeyCode::Esc => {
                    if !self.state.lock.is_active() {
                        return false;
                    }
                    self.cancel_edit_and_set_focus(now);
                    true
                }
                KeyCode::PageDown => {
                    self.scroll_page(1, now);
                    true
                }
                KeyCode::PageUp => {
                    self.scroll_page(-1, now);
                    true
                }
                KeyCode::Left => self.navigate(NavDirection::Left, now),
                KeyCode::Right => self.navigate(NavDirection::Right, now),
                KeyCode::Up => self.navigate(NavDirection::Up, now),
                KeyCode::Down => self.navigate(NavDirection::Down, now),
                KeyCode::Tab => self.navigate(NavDirection::Next, now),
                KeyCode::Enter => {
                    if self.state.options.editable {
                        if self.state.is_editing() {
                            let add_new = self
                                .state
                                .active
                                .is_some_and(|p| p.row == self.state.data_len());
                            if add_new {
                                self.navigate(NavDirection::Down, now);
                            } else {
                                self.commit_edit_and_set_focus(now);
                            }
                        } else if self.state.lock.commit_current_edit() {
                            self.drain_session(now);
                            let _ = self.make_active_cell_editable(now);
                        }
                    }
                    true
                }
                _ => false,
            }
        } else if key.code == KeyCode::Tab
            && key.modifiers.shift
            && !key.modifiers.ctrl
            && !key.modifiers.alt
        {
            self.navigate(NavDirection::Prev, now)
        } else {
            false
        }
    }

    pub fn handle_mouse(&mut self, ev: &MouseEvent, now: u64) -> bool {
        if !self.initialized {
            return false;
        }
        match ev.kind {
            MouseEventKind::ScrollDown => {
                self.wheel_scroll(ev, 1, now);
                true
            }
            MouseEventKind::ScrollUp => {
                self.wheel_scroll(ev, -1, now);
                true
            }
            MouseEventKind::Down(button) => self.pointer_down(ev, button, now),
            MouseEventKind::Drag(_) | MouseEventKind::Moved => self.pointer_move_all(ev, now),
            MouseEventKind::Up(_) => self.pointer_up(ev, now),
        }
    }

    fn header_point(&self, ev: &MouseEvent) -> Point {
        Point::new(
            (self.state.scroll_left + u64::from(ev.x)) as i32,
            i32::from(ev.y),
        )
    }

    fn canvas_point(&self, ev: &MouseEvent) -> Point {
        let header = i64::from(self.state.options.header_height);
        let x = self.state.scroll_left as i64 + i64::from(ev.x);
        let y = self.state.vs.scroll_top() as i64 + i64::from(ev.y) - header;
        Point::new(x as i32, y as i32)
    }

    fn wheel_scroll(&mut self, ev: &MouseEvent, dir: i64, now: u64) {
        self.state.wheel_row = self.cell_at_event(ev).map(|(row, _)| row);
        let dy = dir
            * i64::from(self.state.options.wheel_scroll_rows)
            * i64::from(self.state.options.row_height);
        self.scroll_by(dy, now);
        self.render(now);
    }

    fn resize_handle_at(&self, abs_x: u64) -> Option<usize> {
        for index in 0..self.state.columns.len() {
            let right = self.state.columns.right(index);
            if right > 0 && abs_x == right - 1 {
                let resizable = self
                    .state
                    .columns
                    .get(index)
                    .is_some_and(|c| c.resizable);
                return resizable.then_some(index);
            }
        }
        None
    }

    fn pointer_down(&mut self, ev: &MouseEvent, button: MouseButton, now: u64) -> bool {
        let header = self.state.options.header_height;
        if u32::from(ev.y) < header {
            return self.header_down(ev, button);
        }
        let Some((row, cell)) = self.cell_at_event(ev) else {
            return false;
        };
        match button {
            MouseButton::Right => {
                let info = ClickInfo {
                    row,
                    cell,
                    modifiers: ev.modifiers,
                };
                self.events.context_menu.notify(&info);
                return true;
            }
            MouseButton::Middle => return false,
            MouseButton::Left => {}
        }
        let point = self.canvas_point(ev);
        {
            let events = &mut self.events;
            self.cell_sensor.press(point, PointerButton::Primary, (row, cell), |pass| {
                let info = drag_info(pass);
                let out = events.drag_init.notify(&info);
                if !out.immediate_propagation_stopped {
                    pass.cancel();
                }
            });
        }
        let double = self.last_click.take().is_some_and(|(r, c, t)| {
            r == row && c == cell && now.saturating_sub(t) <= self.state.options.double_click_ms
        });
        self.last_click = Some((row, cell, now));
        if double {
            self.handle_double_click(row, cell, ev.modifiers, now);
        } else {
            self.handle_click(row, cell, ev.modifiers, now);
        }
        true
    }

    fn header_down(&mut self, ev: &MouseEvent, button: MouseButton) -> bool {
        let abs_x = self.state.scroll_left + u64::from(ev.x);
        let Some(cell) = self
            .resize_handle_at(abs_x)
            .or_else(|| self.state.columns.col_at_x(abs_x))
        else {
            return false;
        };
        if button == MouseButton::Right {
            let Some(column) = self.state.columns.get(cell) else {
                return false;
            };
            let info = HeaderClickInfo {
                cell,
                column_id: column.id.clone(),
            };
            self.events.header_context_menu.notify(&info);
            return true;
        }
        if button != MouseButton::Left {
            return false;
        }
        let point = self.header_point(ev);
        if let Some(handle) = self.resize_handle_at(abs_x) {
            let start_width = self.state.columns.get(handle).map(|c| c.width).unwrap_or(0);
            self.resize_sensor.press(
                point,
                PointerButton::Primary,
                ResizeDrag {
                    cell: handle,
                    start_width,
                },
                |_| {},
            );
            return true;
        }
        if self.state.options.enable_column_reorder {
            self.header_sensor
                .press(point, PointerButton::Primary, cell, |_| {});
        }
        self.reorder_from = Some(cell);
        true
    }

    fn handle_click(&mut self, row: usize, cell: usize, modifiers: KeyModifiers, now: u64) {
        let info = ClickInfo {
            row,
            cell,
            modifiers,
        };
        let out = self.events.click.notify(&info);
        if out.immediate_propagation_stopped {
            return;
        }
        if let Some(model) = self.selection.as_mut() {
            let sctx = SelectionCtx {
                active: self.state.active.map(|p| (p.row, p.cell)),
                row_count: self.state.data.len(),
                column_count: self.state.columns.len(),
            };
            if let Some(ranges) = model.handle_click(&sctx, row, cell, modifiers) {
                self.apply_selection(ranges, now);
            }
        }
        if self.state.active_pair() == Some((row, cell)) {
            return;
        }
        if !self.state.can_cell_be_active(row, cell) {
            return;
        }
        if self.state.lock.is_active() && !self.state.lock.commit_current_edit() {
            self.drain_session(now);
            return;
        }
        self.drain_session(now);
        self.scroll_row_into_view(row, now);
        let edit = row == self.state.data_len() || self.state.options.auto_edit;
        self.set_active_internal(Some(CellPos::new(row, cell)), edit, now);
    }

    fn handle_double_click(
        &mut self,
        row: usize,
        cell: usize,
        modifiers: KeyModifiers,
        now: u64,
    ) {
        let info = ClickInfo {
            row,
            cell,
            modifiers,
        };
        let out = self.events.double_click.notify(&info);
        if out.immediate_propagation_stopped {
            return;
        }
        if self.state.options.editable {
            self.go_to_cell(row, cell, true, now);
        }
    }

    fn pointer_move_all(&mut self, ev: &MouseEvent, now: u64) -> bool {
        let header_point = self.header_point(ev);
        let canvas_point = self.canvas_point(ev);
        let mut any = false;
        {
            let columns = &mut self.state.columns;
            let dirty = &mut self.h_dirty;
            any |= self.resize_sensor.pointer_move(header_point, |pass| {
                if pass.phase != DragPhase::Drag {
                    return;
                }
                let Some(target) = pass.target().copied() else {
                    return;
                };
                let (dx, _) = pass.delta();
                let wanted = i64::from(target.start_width) + i64::from(dx);
                let (min, max) = columns
                    .get(target.cell)
                    .map(|c| (c.min_width, c.max_width.unwrap_or(u32::MAX)))
                    .unwrap_or((1, u32::MAX));
                let width = wanted.clamp(i64::from(min), i64::from(max)) as u32;
                columns.set_width(target.cell, width);
                *dirty = true;
            });
        }
        if self.resize_sensor.is_dragging() {
            self.rebuild_header_zones();
        }
        {
            let zones = &self.drop_zones;
            let tracker = &mut self.drop_tracker;
            let columns = &self.state.columns;
            let header_h = self.state.options.header_height;
            any |= self.header_sensor.pointer_move(header_point, |pass| {
                let Some(&source) = pass.target() else {
                    return;
                };
                match pass.phase {
                    DragPhase::Start => {
                        *tracker = Some(DropTracker::begin(
                            zones,
                            DropOptions::default(),
                            |zone| *zone != source,
                        ));
                    }
                    DragPhase::Drag => {
                        if let Some(tracker) = tracker.as_mut() {
                            let (dx, dy) = pass.delta();
                            let proxy =
                                header_region(columns, source, header_h).translated(dx, dy);
                            tracker.note_move(now, pass.at, proxy);
                        }
                    }
                    _ => {}
                }
            });
        }
        {
            let events = &mut self.events;
            any |= self.cell_sensor.pointer_move(canvas_point, |pass| {
                let info = drag_info(pass);
                match pass.phase {
                    DragPhase::Start => {
                        events.drag_start.notify(&info);
                    }
                    DragPhase::Drag => {
                        events.drag.notify(&info);
                    }
                    _ => {}
                }
            });
        }
        any
    }

    fn pointer_up(&mut self, ev: &MouseEvent, now: u64) -> bool {
        let header_point = self.header_point(ev);
        let canvas_point = self.canvas_point(ev);
        let mut any = false;

        let mut resized = false;
        any |= self.resize_sensor.release(header_point, |pass| {
            if pass.phase == DragPhase::End {
                resized = true;
            }
        });
        if resized {
            self.rebuild_header_zones();
            self.h_dirty = true;
            self.events.columns_resized.notify(&());
            self.render(now);
        }

        let was_reorder = self.header_sensor.release(header_point, |_| {});
        any |= was_reorder;
        if was_reorder {
            let mut dropped = None;
            if let Some(mut tracker) = self.drop_tracker.take() {
                let mut sink = ReorderSink {
                    over: &mut self.reorder_over,
                    dropped: &mut dropped,
                };
                tracker.end(&mut sink);
            }
            self.reorder_over = None;
            let from = self.reorder_from.take();
            if let (Some(from), Some(to)) = (from, dropped) {
                if from != to {
                    self.state.columns.reorder(from, to);
                    self.rebuild_header_zones();
                    self.h_dirty = true;
                    self.invalidate_all_rows(now);
                    trace!("columns reordered: {} -> {}", from, to);
                    self.events
                        .columns_reordered
                        .notify(&ColumnsReorderedInfo { from, to });
                    self.render(now);
                }
            }
        } else if u32::from(ev.y) < self.state.options.header_height
            && self.reorder_from.take().is_some()
        {
            self.handle_header_click(ev, now);
            any = true;
        }

        {
            let events = &mut self.events;
            any |= self.cell_sensor.release(canvas_point, |pass| {
                let info = drag_info(pass);
                events.drag_end.notify(&info);
            });
        }
        any
    }

    fn handle_header_click(&mut self, ev: &MouseEvent, now: u64) {
        let abs_x = self.state.scroll_left + u64::from(ev.x);
        let Some(cell) = self.state.columns.col_at_x(abs_x) else {
            return;
        };
        let Some(column) = self.state.columns.get(cell) else {
            return;
        };
        let info = HeaderClickInfo {
            cell,
            column_id: column.id.clone(),
        };
        let out = self.events.header_click.notify(&info);
        if out.immediate_propagation_stopped {
            return;
        }
        self.handle_sort_click(cell, ev.modifiers, now);
    }

    fn handle_sort_click(&mut self, cell: usize, modifiers: KeyModifiers, now: u64) {
        let Some(column) = self.state.columns.get(cell) else {
            return;
        };
        if !column.sortable {
            return;
        }
        if !self.state.lock.commit_current_edit() {
            self.drain_session(now);
            return;
        }
        let id = column.id.clone();
        self.drain_session(now);
        let multi =
            self.state.options.multi_column_sort && (modifiers.shift || modifiers.ctrl);
        if modifiers.ctrl && self.state.options.multi_column_sort {
            // Ctrl removes the column from the sort set.
            if let Some(index) = self
                .state
                .sort_columns
                .iter()
                .position(|s| s.column_id == id)
            {
                self.state.sort_columns.remove(index);
            }
        } else {
            if !multi {
                self.state.sort_columns.retain(|s| s.column_id == id);
            }
            match self
                .state
                .sort_columns
                .iter_mut()
                .find(|s| s.column_id == id)
            {
                Some(sort) => sort.ascending = !sort.ascending,
                None => self.state.sort_columns.push(ColumnSort {
                    column_id: id,
                    ascending: true,
                }),
            }
        }
        let info = SortInfo {
            sort_columns: self.state.sort_columns.clone(),
        };
        self.events.sort.notify(&info);
    }

    fn rebuild_header_zones(&mut self) {
        self.drop_zones.clear();
        let header_h = self.state.options.header_height;
        for index in 0..self.state.columns.len() {
            self.drop_zones
                .register(index, header_region(&self.state.columns, index, header_h));
        }
    }
}

/// Timed work.
impl DataGrid {
    /// Drive deferred work: delayed editor opening, decoration and
    /// cleanup pumps, and drop-zone polling during a header drag.
    pub fn on_tick(&mut self, now: u64) {
        if self.editor_loader.fire(now) {
            let _ = self.make_active_cell_editable(now);
        }
        let ctx = self.state.ctx();
        self.cache.tick(&ctx, now);
        if let Some(tracker) = self.drop_tracker.as_mut() {
            let mut dropped = None;
            let mut sink = ReorderSink {
                over: &mut self.reorder_over,
                dropped: &mut dropped,
            };
            tracker.tick(now, &mut sink);
        }
    }

    /// Earliest tick deadline across grid timers, for embedders that
    /// sleep between events.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.cache.next_deadline(),
            self.editor_loader.deadline(),
            self.drop_tracker.as_ref().and_then(DropTracker::deadline),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}
