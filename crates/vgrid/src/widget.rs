//! The ratatui widget that paints a [`DataGrid`].
//!
//! [`GridWidget`] is a throwaway view over a grid and a theme, built fresh
//! for every frame. All state lives in the engine: the widget walks the
//! cached rows the engine materialized during [`DataGrid::render`] and never
//! touches data items itself. Painting order is header, rows, editor
//! overlay, scrollbar.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthChar;
use vgrid_core::DataGrid;
use vgrid_core::input::{MouseEvent, MouseEventKind};

use crate::render::{ScrollMetrics, render_scrollbar, render_str_clipped};
use crate::theme::Theme;

/// Width in cells available to grid content inside `area`, after reserving
/// one column for the scrollbar when there is room for it.
///
/// Feed this to [`DataGrid::resize`] so the engine's canvas matches what the
/// widget will paint.
pub fn content_width(area: Rect) -> u16 {
    if area.width >= 2 {
        area.width - 1
    } else {
        area.width
    }
}

/// Translates a terminal-absolute mouse event into the grid-local
/// coordinates [`DataGrid::handle_mouse`] expects.
///
/// Returns `None` for events outside the content area, except drags and
/// button releases, which are clamped inward so an in-flight column drag
/// keeps tracking when the pointer leaves the widget.
pub fn grid_mouse(area: Rect, ev: &MouseEvent) -> Option<MouseEvent> {
    let width = content_width(area);
    if width == 0 || area.height == 0 {
        return None;
    }
    let inside = ev.x >= area.x
        && ev.x < area.x + width
        && ev.y >= area.y
        && ev.y < area.y + area.height;
    let tracking = matches!(
        ev.kind,
        MouseEventKind::Drag(_) | MouseEventKind::Up(_)
    );
    if !inside && !tracking {
        return None;
    }
    Some(MouseEvent {
        x: ev.x.clamp(area.x, area.x + width - 1) - area.x,
        y: ev.y.clamp(area.y, area.y + area.height - 1) - area.y,
        kind: ev.kind,
        modifiers: ev.modifiers,
    })
}

/// Paints a [`DataGrid`] with a [`Theme`].
pub struct GridWidget<'a> {
    grid: &'a DataGrid,
    theme: &'a Theme,
}

impl<'a> GridWidget<'a> {
    pub fn new(grid: &'a DataGrid, theme: &'a Theme) -> Self {
        Self { grid, theme }
    }

    fn draw(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        buf.set_style(area, self.theme.text);

        let content_w = content_width(area);
        let content = Rect::new(area.x, area.y, content_w, area.height);
        let header_h = self
            .grid
            .options()
            .header_height
            .min(u32::from(content.height)) as u16;
        let header = Rect::new(content.x, content.y, content.width, header_h);
        let body = Rect::new(
            content.x,
            content.y + header_h,
            content.width,
            content.height - header_h,
        );

        self.draw_header(header, buf);
        self.draw_rows(body, buf);
        self.draw_editor(body, buf);

        if content_w < area.width {
            let track = Rect::new(area.x + content_w, body.y, 1, body.height);
            let vs = self.grid.virtual_scroll();
            let metrics = ScrollMetrics {
                position: vs.scroll_top(),
                viewport: vs.viewport_height(),
                content: vs.real_height(),
            };
            render_scrollbar(track, buf, &metrics, self.theme.scrollbar);
        }
    }

    fn draw_header(&self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        buf.set_style(area, self.theme.header);

        let columns = self.grid.columns();
        let scroll_left = self.grid.scroll_position().scroll_left;
        let sort_columns = self.grid.sort_columns();

        for (i, column) in columns.columns().iter().enumerate() {
            let left = columns.left(i);
            let width = columns.right(i).saturating_sub(left);
            if width == 0 {
                continue;
            }
            let (rect, clip) = clip_x(area, scroll_left, left, clamp_u32(width));

            if rect.width > 0 {
                let mut style = self.theme.text.patch(self.theme.header);
                if let Some(class) = &column.header_css_class {
                    if let Some(extra) = self.theme.class_style(class) {
                        style = style.patch(extra);
                    }
                }
                buf.set_style(rect, style);

                let mut title = column.name.clone();
                if let Some(sort) = sort_columns.iter().find(|s| s.column_id == column.id) {
                    title.push_str(if sort.ascending { " ▲" } else { " ▼" });
                }
                render_str_clipped(rect.x, rect.y, clip, rect.width, buf, &title, style);
            }

            // Resize handle on the column's last px, where the engine's
            // hit test expects it.
            if column.resizable {
                if let Some(hx) = rel_x(area, scroll_left, columns.right(i) - 1) {
                    for dy in 0..area.height {
                        if let Some(cell) = buf.cell_mut((hx, area.y + dy)) {
                            cell.set_symbol("│");
                            cell.set_style(self.theme.grid_line);
                        }
                    }
                }
            }
        }
    }

    fn draw_rows(&self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let cache = self.grid.row_cache();
        let arena = cache.arena();
        let columns = self.grid.columns();
        let scroll = self.grid.scroll_position();
        let row_h = self.grid.options().row_height;

        for (row, key) in cache.rows_in_order() {
            let node = arena.row(key);
            if node.hidden {
                continue;
            }
            let (row_rect, clip_top) = clip_y(area, scroll.scroll_top, node.top, row_h);
            if row_rect.height == 0 {
                continue;
            }

            let mut row_style = self.theme.text;
            for class in &node.classes {
                if let Some(extra) = self.theme.row_class_style(class) {
                    row_style = row_style.patch(extra);
                }
            }
            if node.loading {
                row_style = row_style.patch(self.theme.loading);
            }
            buf.set_style(row_rect, row_style);

            for (&cell, &cell_key) in &node.cells {
                let Some(cnode) = arena.get_cell(cell_key) else {
                    continue;
                };
                let left = columns.left(cell);
                let span_w = clamp_u32(columns.span_right(cell, cnode.colspan).saturating_sub(left));
                let (rect, clip_left) = clip_x(row_rect, scroll.scroll_left, left, span_w);
                if rect.width == 0 {
                    continue;
                }

                let mut style = row_style;
                for class in &cnode.classes {
                    if let Some(extra) = self.theme.class_style(class) {
                        style = style.patch(extra);
                    }
                }
                for class in self.grid.overlay_classes(row, cell) {
                    if let Some(extra) = self.theme.class_style(class) {
                        style = style.patch(extra);
                    }
                }
                buf.set_style(rect, style);

                if clip_top == 0 {
                    // Leave a one-column gutter when the cell's right edge
                    // is on screen.
                    let edge_visible = clip_left + u32::from(rect.width) >= span_w;
                    let text_cols = if edge_visible {
                        rect.width.saturating_sub(1)
                    } else {
                        rect.width
                    };
                    render_str_clipped(rect.x, rect.y, clip_left, text_cols, buf, &cnode.text, style);
                }
            }
        }
    }

    fn draw_editor(&self, body: Rect, buf: &mut Buffer) {
        let Some((bounds, text, cursor)) = self.grid.editor_overlay() else {
            return;
        };
        if !bounds.visible || body.height == 0 || body.width == 0 {
            return;
        }

        // The engine reports the box relative to the widget origin, header
        // included; shift into body space so the overlay clips under the
        // header instead of over it.
        let top = bounds.top - i64::from(self.grid.options().header_height);
        let (row_rect, clip_top) = clip_y(body, 0, top, bounds.height);
        if row_rect.height == 0 {
            return;
        }
        let (rect, clip_left) = clip_x(row_rect, 0, bounds.left, bounds.width);
        if rect.width == 0 {
            return;
        }

        buf.set_style(rect, self.theme.editing);
        if clip_top != 0 {
            return;
        }
        render_str_clipped(rect.x, rect.y, clip_left, rect.width, buf, &text, self.theme.editing);

        if let Some(cur) = cursor {
            let col: usize = text
                .chars()
                .take(cur)
                .filter_map(UnicodeWidthChar::width)
                .sum();
            let col = col as u32;
            if col >= clip_left && col - clip_left < u32::from(rect.width) {
                let x = rect.x + (col - clip_left) as u16;
                if let Some(cell) = buf.cell_mut((x, rect.y)) {
                    cell.set_style(self.theme.editing.add_modifier(Modifier::REVERSED));
                }
            }
        }
    }
}

impl Widget for GridWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.draw(area, buf);
    }
}

fn clamp_u32(v: u64) -> u32 {
    v.min(u64::from(u32::MAX)) as u32
}

/// Vertical slice of `area` covered by a span at canvas `top` with `height`,
/// plus how many rows of the span fall above the viewport.
fn clip_y(area: Rect, scroll_top: u64, top: i64, height: u32) -> (Rect, u32) {
    let rel = top - scroll_top as i64;
    let clip = (-rel).clamp(0, i64::from(height)) as u32;
    let y_off = rel.clamp(0, i64::from(area.height)) as u16;
    let visible = height
        .saturating_sub(clip)
        .min(u32::from(area.height.saturating_sub(y_off))) as u16;
    (Rect::new(area.x, area.y + y_off, area.width, visible), clip)
}

/// Horizontal counterpart of [`clip_y`] in canvas px.
fn clip_x(area: Rect, scroll_left: u64, left: u64, width: u32) -> (Rect, u32) {
    let rel = left as i64 - scroll_left as i64;
    let clip = (-rel).clamp(0, i64::from(width)) as u32;
    let x_off = rel.clamp(0, i64::from(area.width)) as u16;
    let visible = width
        .saturating_sub(clip)
        .min(u32::from(area.width.saturating_sub(x_off))) as u16;
    (Rect::new(area.x + x_off, area.y, visible, area.height), clip)
}

fn rel_x(area: Rect, scroll_left: u64, x: u64) -> Option<u16> {
    let rel = x as i64 - scroll_left as i64;
    if rel < 0 || rel >= i64::from(area.width) {
        return None;
    }
    Some(area.x + rel as u16)
}

#[cfg(test)]
mod tests {
    use ratatui::style::Color;
    use vgrid_core::{CellValue, Column, GridOptions, Record, VecSource};

    use super::*;
    use crate::editors::TextInputEditor;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("a", "A").width(5).sortable(true),
            Column::new("b", "B").width(5),
            Column::new("c", "C").width(5),
        ]
    }

    fn make_data(rows: usize) -> Box<VecSource<Record>> {
        let items = (0..rows)
            .map(|i| {
                Record::new()
                    .with("a", i as i64)
                    .with("b", format!("b{i}"))
                    .with("c", CellValue::Int((i * 2) as i64))
            })
            .collect();
        Box::new(VecSource::new(items))
    }

    fn make_grid(columns: Vec<Column>, options: GridOptions) -> DataGrid {
        let mut grid = DataGrid::new(make_data(100), columns, options);
        grid.resize(14, 6, 0);
        grid.render(0);
        grid
    }

    fn options() -> GridOptions {
        GridOptions {
            row_height: 1,
            header_height: 1,
            ..GridOptions::default()
        }
    }

    fn paint(grid: &DataGrid) -> Buffer {
        let mut buf = Buffer::empty(Rect::new(0, 0, 15, 6));
        GridWidget::new(grid, &Theme::default()).render(Rect::new(0, 0, 15, 6), &mut buf);
        buf
    }

    fn line(buf: &Buffer, y: u16) -> String {
        (0..15)
            .map(|x| buf.cell((x, y)).unwrap().symbol().to_string())
            .collect()
    }

    #[test]
    fn paints_header_rows_and_scrollbar() {
        let mut grid = make_grid(columns(), options());
        grid.set_sort_column("a", true);
        let buf = paint(&grid);

        assert!(line(&buf, 0).starts_with("A ▲ │B"), "header: {:?}", line(&buf, 0));
        assert!(line(&buf, 1).starts_with("0    b0"), "row 0: {:?}", line(&buf, 1));
        assert!(line(&buf, 5).starts_with("4    b4"), "row 4: {:?}", line(&buf, 5));

        // 100 rows of content behind a 5 row viewport, thumb parked at the top.
        assert_eq!(buf.cell((14, 1)).unwrap().symbol(), "█");
        assert_eq!(buf.cell((14, 5)).unwrap().symbol(), " ");
    }

    #[test]
    fn active_cell_is_styled_through_its_classes() {
        let mut grid = make_grid(columns(), options());
        grid.set_active_cell(1, 1, 0);
        grid.render(0);
        let buf = paint(&grid);

        let active = buf.cell((5, 2)).unwrap().style();
        assert!(active.add_modifier.contains(Modifier::REVERSED));
        let idle = buf.cell((0, 1)).unwrap().style();
        assert!(!idle.add_modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn editor_overlay_paints_text_and_cursor() {
        let cols = vec![
            Column::new("a", "A").width(5).editor(TextInputEditor::factory()),
            Column::new("b", "B").width(5),
        ];
        let mut grid = make_grid(
            cols,
            GridOptions {
                editable: true,
                ..options()
            },
        );
        grid.go_to_cell(0, 0, true, 0);
        assert!(grid.is_editing());
        grid.handle_input(
            &vgrid_core::InputEvent::Key(vgrid_core::KeyEvent::new(
                vgrid_core::KeyCode::Char('x'),
            )),
            0,
        );
        grid.render(0);
        let buf = paint(&grid);

        assert_eq!(buf.cell((0, 1)).unwrap().symbol(), "0");
        assert_eq!(buf.cell((1, 1)).unwrap().symbol(), "x");
        assert_eq!(buf.cell((0, 1)).unwrap().style().bg, Some(Color::Cyan));
        let caret = buf.cell((2, 1)).unwrap().style();
        assert!(caret.add_modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn mouse_translation_rejects_outside_but_tracks_drags() {
        let area = Rect::new(2, 1, 15, 6);
        let down = MouseEvent {
            x: 4,
            y: 2,
            kind: MouseEventKind::Down(vgrid_core::input::MouseButton::Left),
            modifiers: Default::default(),
        };
        assert_eq!(grid_mouse(area, &down).map(|ev| (ev.x, ev.y)), Some((2, 1)));

        let outside = MouseEvent { x: 0, y: 0, ..down };
        assert_eq!(grid_mouse(area, &outside), None);

        let drag = MouseEvent {
            x: 30,
            y: 0,
            kind: MouseEventKind::Drag(vgrid_core::input::MouseButton::Left),
            modifiers: Default::default(),
        };
        assert_eq!(grid_mouse(area, &drag).map(|ev| (ev.x, ev.y)), Some((13, 0)));
    }
}
