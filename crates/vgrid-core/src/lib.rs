//! Headless data-grid engine.
//!
//! The engine keeps a virtual scroll window over an arbitrarily large data
//! source, a retained cache of row/cell nodes for the rendered range, and the
//! interaction state (active cell, in-flight edit, drags) that a display
//! adapter paints from. Nothing here draws; the `vgrid` crate provides the
//! ratatui adapter.
//!
//! All coordinates are abstract pixels (`u64` offsets, `u32` sizes); a
//! terminal embedding uses one px per cell. The engine is single-threaded
//! and deterministic: feed it input events plus a monotonic millisecond
//! clock via [`grid::DataGrid::on_tick`].

pub mod column;
#[cfg(feature = "crossterm")]
pub mod crossterm_input;
pub mod data;
pub mod editing;
pub mod event;
pub mod grid;
pub mod input;
pub mod navigation;
pub mod node;
pub mod plugin;
pub mod row_cache;
pub mod timer;
pub mod virtual_scroll;

pub use column::Column;
pub use column::ColumnSet;
pub use column::ColumnSort;
pub use data::CellValue;
pub use data::DataProvider;
pub use data::GridItem;
pub use data::Record;
pub use data::VecSource;
pub use editing::CellEditor;
pub use editing::EditorLock;
pub use grid::DataGrid;
pub use grid::GridError;
pub use grid::GridOptions;
pub use input::InputEvent;
pub use input::KeyCode;
pub use input::KeyEvent;
pub use input::MouseEvent;
pub use plugin::CellRange;
pub use plugin::SelectionModel;
pub use virtual_scroll::RowRange;
pub use virtual_scroll::VirtualScroll;
