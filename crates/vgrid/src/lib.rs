//! Virtualized, editable data grid for ratatui.
//!
//! The engine lives in `vgrid-core` and is display-agnostic: virtual paging
//! over millions of rows, a retained row/cell cache, keyboard navigation,
//! editing sessions behind a shared lock, header drag gestures. This crate
//! adds the terminal half and re-exports the engine, so most apps depend on
//! this crate alone.
//!
//! Useful entry points:
//! - [`DataGrid`]: the engine; feed it input events and a millisecond clock.
//! - [`widget::GridWidget`]: paints a grid with a [`theme::Theme`].
//! - [`editors`]: stock text-input and checkbox cell editors.
//! - [`widget::grid_mouse`] / [`widget::content_width`]: terminal glue for
//!   mouse translation and engine sizing.
//!
//! ## Getting started
//!
//! ```
//! use ratatui::buffer::Buffer;
//! use ratatui::layout::Rect;
//! use ratatui::widgets::Widget;
//! use vgrid::{Column, DataGrid, GridOptions, GridWidget, Record, Theme, VecSource};
//!
//! let rows = (0..1000).map(|i| Record::new().with("id", i as i64)).collect();
//! let mut grid = DataGrid::new(
//!     Box::new(VecSource::new(rows)),
//!     vec![Column::new("id", "Id").width(8)],
//!     GridOptions {
//!         row_height: 1,
//!         header_height: 1,
//!         ..GridOptions::default()
//!     },
//! );
//!
//! // Per frame: size the engine to the drawing area, advance timers, paint.
//! grid.resize(40, 20, 0);
//! grid.render(0);
//!
//! let area = Rect::new(0, 0, 41, 20);
//! let mut buf = Buffer::empty(area);
//! GridWidget::new(&grid, &Theme::default()).render(area, &mut buf);
//! ```
//!
//! The engine is single-threaded and deterministic: drive
//! [`DataGrid::on_tick`] from your event loop and sleep until
//! [`DataGrid::next_deadline`] when idle. The `demo` example shows the full
//! crossterm wiring.

pub mod editors;
pub mod render;
pub mod theme;
pub mod widget;

pub use theme::Theme;
pub use widget::GridWidget;

pub use vgrid_core::column;
#[cfg(feature = "crossterm")]
pub use vgrid_core::crossterm_input;
pub use vgrid_core::data;
pub use vgrid_core::editing;
pub use vgrid_core::event;
pub use vgrid_core::grid;
pub use vgrid_core::input;
pub use vgrid_core::navigation;
pub use vgrid_core::node;
pub use vgrid_core::plugin;
pub use vgrid_core::row_cache;
pub use vgrid_core::timer;
pub use vgrid_core::virtual_scroll;

pub use vgrid_core::CellEditor;
pub use vgrid_core::CellRange;
pub use vgrid_core::CellValue;
pub use vgrid_core::Column;
pub use vgrid_core::ColumnSet;
pub use vgrid_core::ColumnSort;
pub use vgrid_core::DataGrid;
pub use vgrid_core::DataProvider;
pub use vgrid_core::EditorLock;
pub use vgrid_core::GridError;
pub use vgrid_core::GridItem;
pub use vgrid_core::GridOptions;
pub use vgrid_core::InputEvent;
pub use vgrid_core::KeyCode;
pub use vgrid_core::KeyEvent;
pub use vgrid_core::MouseEvent;
pub use vgrid_core::Record;
pub use vgrid_core::RowRange;
pub use vgrid_core::SelectionModel;
pub use vgrid_core::VecSource;
pub use vgrid_core::VirtualScroll;
