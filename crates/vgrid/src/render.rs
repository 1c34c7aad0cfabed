//! Low-level buffer painting helpers shared by the grid widget.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use unicode_width::UnicodeWidthChar;

/// Scroll geometry for [`render_scrollbar`], in content pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollMetrics {
    /// Current scroll offset from the top of the content.
    pub position: u64,
    /// Height of the visible window.
    pub viewport: u32,
    /// Total content height. May exceed the viewport by millions of rows.
    pub content: u64,
}

/// Renders a one-column vertical scrollbar into `area`.
///
/// The track is blanked when the content fits inside the viewport. The thumb
/// is proportional to the visible fraction, never thinner than one cell.
pub fn render_scrollbar(area: Rect, buf: &mut Buffer, metrics: &ScrollMetrics, style: Style) {
    buf.set_style(area, style);
    if area.height == 0 || area.width == 0 {
        return;
    }
    if metrics.content <= u64::from(metrics.viewport) || metrics.content == 0 {
        for dy in 0..area.height {
            buf.set_stringn(area.x, area.y + dy, " ", 1, style);
        }
        return;
    }

    let track_h = f64::from(area.height);
    let thumb_h = ((f64::from(metrics.viewport) / metrics.content as f64) * track_h)
        .round()
        .clamp(1.0, track_h) as u16;

    let max_y = metrics
        .content
        .saturating_sub(u64::from(metrics.viewport))
        .max(1) as f64;
    let thumb_top = ((metrics.position as f64 / max_y) * (track_h - f64::from(thumb_h)))
        .round()
        .clamp(0.0, (track_h - f64::from(thumb_h)).max(0.0)) as u16;

    for dy in 0..area.height {
        let ch = if dy >= thumb_top && dy < thumb_top + thumb_h {
            "█"
        } else {
            " "
        };
        buf.set_stringn(area.x, area.y + dy, ch, 1, style);
    }
}

/// Renders `input` at `(x, y)`, skipping the first `start_col` display columns
/// and writing at most `max_cols` columns.
///
/// Tabs expand to four columns. A wide character straddling either edge is
/// dropped rather than half-drawn; its trailing cell is blanked so stale
/// glyphs cannot bleed through.
pub fn render_str_clipped(
    x: u16,
    y: u16,
    start_col: u32,
    max_cols: u16,
    buf: &mut Buffer,
    input: &str,
    style: Style,
) {
    if max_cols == 0 {
        return;
    }

    let start_col = start_col as usize;
    let max_cols = max_cols as usize;
    let mut col = 0usize;
    let mut out_cols = 0usize;
    let mut dx = 0u16;

    let mut tmp = [0u8; 4];

    for ch in input.chars() {
        if ch == '\t' {
            for _ in 0..4 {
                if col + 1 <= start_col {
                    col += 1;
                    continue;
                }
                if out_cols + 1 > max_cols {
                    return;
                }
                if let Some(cell) = buf.cell_mut((x + dx, y)) {
                    cell.set_style(style);
                    cell.set_symbol(" ");
                }
                dx += 1;
                out_cols += 1;
                col += 1;
            }
            continue;
        }

        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if w == 0 {
            continue;
        }
        if col + w <= start_col {
            col += w;
            continue;
        }
        if col < start_col && col + w > start_col {
            col += w;
            continue;
        }
        if out_cols + w > max_cols {
            return;
        }

        let s = ch.encode_utf8(&mut tmp);
        if let Some(cell) = buf.cell_mut((x + dx, y)) {
            cell.set_style(style);
            cell.set_symbol(s);
        }
        dx += 1;
        out_cols += 1;
        col += w;

        if w == 2 {
            if out_cols >= max_cols {
                return;
            }
            if let Some(cell) = buf.cell_mut((x + dx, y)) {
                cell.set_style(style);
                cell.set_symbol("");
            }
            dx += 1;
            out_cols += 1;
        }
    }
}
