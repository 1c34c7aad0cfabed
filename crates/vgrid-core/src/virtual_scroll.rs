//! Virtual scrolling over row space taller than any real scroll area.
//!
//! Platforms cap how tall a scrollable canvas may be, so the total virtual
//! height `th` is projected onto a real canvas of height `h` divided into
//! `n` pages of height `ph`. Consecutive pages overlap by a constant
//! "jumpiness" `cj`; the active page contributes `offset = round(page * cj)`
//! which converts between real and virtual positions:
//!
//! - `virtual = real + offset`
//! - `row = floor((real + offset) / row_height)`
//! - `row_top = row * row_height - offset` (real canvas px)
//!
//! Scrolling within a page slides the real position; crossing a page
//! boundary changes `offset` and invalidates every cached row position.

use log::debug;

/// Inclusive row interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowRange {
    pub top: usize,
    pub bottom: usize,
}

impl RowRange {
    pub fn new(top: usize, bottom: usize) -> Self {
        Self { top, bottom }
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.top && row <= self.bottom
    }

    pub fn len(&self) -> usize {
        self.bottom - self.top + 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollDir {
    Up,
    #[default]
    None,
    Down,
}

/// What a scroll operation changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// The page offset moved; every cached row position is stale.
    pub offset_changed: bool,
    /// The real scroll position moved.
    pub scrolled: bool,
}

pub struct VirtualScroll {
    row_height: u32,
    viewport_h: u32,
    max_scroll_height: u64,
    row_count: usize,
    /// Total virtual height.
    th: u64,
    /// Real canvas height (th, capped).
    h: u64,
    /// Page height.
    ph: f64,
    page_count: usize,
    /// Overlap between consecutive pages.
    jumpiness: f64,
    page: usize,
    offset: u64,
    scroll_top: u64,
    prev_scroll_top: u64,
    dir: ScrollDir,
}

impl VirtualScroll {
    pub fn new(row_height: u32, max_scroll_height: u64) -> Self {
        let mut vs = Self {
            row_height: row_height.max(1),
            viewport_h: 0,
            max_scroll_height: max_scroll_height.max(1),
            row_count: 0,
            th: 0,
            h: 0,
            ph: 0.0,
            page_count: 1,
            jumpiness: 0.0,
            page: 0,
            offset: 0,
            scroll_top: 0,
            prev_scroll_top: 0,
            dir: ScrollDir::None,
        };
        vs.recompute();
        vs
    }

    pub fn row_height(&self) -> u32 {
        self.row_height
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_h
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Total virtual height in px.
    pub fn virtual_height(&self) -> u64 {
        self.th
    }

    /// Real (capped) canvas height in px.
    pub fn real_height(&self) -> u64 {
        self.h
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn scroll_top(&self) -> u64 {
        self.scroll_top
    }

    /// Current position in virtual space.
    pub fn virtual_top(&self) -> u64 {
        self.scroll_top + self.offset
    }

    pub fn direction(&self) -> ScrollDir {
        self.dir
    }

    pub fn set_row_count(&mut self, rows: usize) -> ScrollOutcome {
        self.row_count = rows;
        self.recompute();
        self.refit()
    }

    pub fn set_viewport_height(&mut self, viewport_h: u32) -> ScrollOutcome {
        self.viewport_h = viewport_h;
        self.recompute();
        self.refit()
    }

    fn recompute(&mut self) {
        self.th = (self.row_count as u64 * u64::from(self.row_height))
            .max(u64::from(self.viewport_h));
        if self.th < self.max_scroll_height {
            self.h = self.th;
            self.ph = self.th as f64;
            self.page_count = 1;
            self.jumpiness = 0.0;
        } else {
            self.h = self.max_scroll_height;
            self.ph = self.h as f64 / 100.0;
            self.page_count = (self.th as f64 / self.ph).floor() as usize;
            self.jumpiness = (self.th - self.h) as f64 / (self.page_count - 1) as f64;
        }
    }

    /// Re-anchor after a geometry change: keep the virtual position when it
    /// is still reachable, otherwise clamp to the end.
    fn refit(&mut self) -> ScrollOutcome {
        let old_offset = self.offset;
        let max_y = self.th.saturating_sub(u64::from(self.viewport_h));
        if self.th == 0 || self.scroll_top == 0 {
            self.page = 0;
            self.offset = 0;
            ScrollOutcome {
                offset_changed: old_offset != 0,
                scrolled: false,
            }
        } else if self.scroll_top + old_offset <= max_y {
            self.scroll_to(self.scroll_top + old_offset)
        } else {
            self.scroll_to(max_y)
        }
    }

    /// Scroll to a position in virtual space.
    pub fn scroll_to(&mut self, y: u64) -> ScrollOutcome {
        let max_y = self.th.saturating_sub(u64::from(self.viewport_h));
        let y = y.min(max_y);
        let old_offset = self.offset;
        self.page = if self.page_count > 1 {
            ((y as f64 / self.ph).floor() as usize).min(self.page_count - 1)
        } else {
            0
        };
        self.offset = (self.page as f64 * self.jumpiness).round() as u64;
        let new_scroll_top = y.saturating_sub(self.offset);
        let scrolled = new_scroll_top != self.scroll_top;
        if scrolled {
            self.dir = if self.prev_scroll_top + old_offset < new_scroll_top + self.offset {
                ScrollDir::Down
            } else {
                ScrollDir::Up
            };
            self.prev_scroll_top = new_scroll_top;
            self.scroll_top = new_scroll_top;
        }
        let offset_changed = old_offset != self.offset;
        if offset_changed {
            debug!(
                "virtual page switch: page {} offset {}",
                self.page, self.offset
            );
        }
        ScrollOutcome {
            offset_changed,
            scrolled,
        }
    }

    /// Scroll by a signed delta in virtual space.
    pub fn scroll_by(&mut self, dy: i64) -> ScrollOutcome {
        let from = self.virtual_top() as i64;
        self.scroll_to(from.saturating_add(dy).max(0) as u64)
    }

    /// Jump straight to a real scrollbar position, interpolating the page
    /// from the real fraction. Used for scrollbar thumb jumps; unlike
    /// [`Self::scroll_to`], far jumps land on a page picked from the real
    /// position rather than sliding through virtual space.
    pub fn jump_to_real(&mut self, real_top: u64) -> ScrollOutcome {
        let viewport = u64::from(self.viewport_h);
        let real = real_top.min(self.h.saturating_sub(viewport));
        let dist = real.abs_diff(self.scroll_top);
        if dist < viewport {
            return self.scroll_to(real + self.offset);
        }
        let old_offset = self.offset;
        self.dir = if self.scroll_top < real {
            ScrollDir::Down
        } else {
            ScrollDir::Up
        };
        self.page = if self.h <= viewport {
            0
        } else {
            let fraction =
                (self.th - viewport) as f64 / (self.h - viewport) as f64 / self.ph;
            (((real as f64) * fraction).floor() as usize).min(self.page_count - 1)
        };
        self.offset = (self.page as f64 * self.jumpiness).round() as u64;
        self.scroll_top = real;
        self.prev_scroll_top = real;
        ScrollOutcome {
            offset_changed: old_offset != self.offset,
            scrolled: true,
        }
    }

    /// Row containing a virtual position.
    pub fn row_at_virtual(&self, y: u64) -> usize {
        (y / u64::from(self.row_height)) as usize
    }

    /// Row containing a real canvas position.
    pub fn row_at_position(&self, canvas_y: u64) -> usize {
        self.row_at_virtual(canvas_y + self.offset)
    }

    /// Top of `row` in real canvas px. Negative for rows above the current
    /// page window.
    pub fn row_top(&self, row: usize) -> i64 {
        (row as i64) * i64::from(self.row_height) - self.offset as i64
    }

    /// Rows a full viewport covers, rounded up.
    pub fn rows_per_page(&self) -> usize {
        (u64::from(self.viewport_h).div_ceil(u64::from(self.row_height))) as usize
    }

    /// Rows intersecting the viewport, unclamped at the bottom.
    pub fn visible_range(&self) -> RowRange {
        let top = self.row_at_virtual(self.virtual_top());
        let bottom = self.row_at_virtual(self.virtual_top() + u64::from(self.viewport_h));
        RowRange::new(top, bottom)
    }

    /// Visible range expanded by a full-viewport buffer in the scroll
    /// direction and a 3-row minimum on the other side, clamped to
    /// `[0, row_count - 1]`. Meaningless when `row_count` is zero.
    pub fn rendered_range(&self) -> RowRange {
        let visible = self.visible_range();
        let buffer = (f64::from(self.viewport_h) / f64::from(self.row_height)).round() as usize;
        let min_buffer = 3;
        let (top_buffer, bottom_buffer) = match self.dir {
            ScrollDir::Up => (buffer, min_buffer),
            ScrollDir::Down => (min_buffer, buffer),
            ScrollDir::None => (min_buffer, min_buffer),
        };
        let last = self.row_count.saturating_sub(1);
        RowRange::new(
            visible.top.saturating_sub(top_buffer),
            (visible.bottom + bottom_buffer).min(last),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paged() -> VirtualScroll {
        // 100k rows of 25px against a 1M px cap: th = 2.5M, h = 1M,
        // ph = 10k, n = 250, cj = 1.5M / 249
        let mut vs = VirtualScroll::new(25, 1_000_000);
        vs.set_viewport_height(500);
        vs.set_row_count(100_000);
        vs
    }

    #[test]
    fn small_grids_use_a_single_page() {
        let mut vs = VirtualScroll::new(25, 1_000_000);
        vs.set_viewport_height(500);
        vs.set_row_count(100);
        assert_eq!(vs.page_count(), 1);
        vs.scroll_to(700);
        assert_eq!(vs.offset(), 0);
        assert_eq!(vs.scroll_top(), 700);
        assert_eq!(vs.visible_range(), RowRange::new(28, 48));
    }

    #[test]
    fn paged_geometry_matches_formulas() {
        let vs = paged();
        assert_eq!(vs.virtual_height(), 2_500_000);
        assert_eq!(vs.real_height(), 1_000_000);
        assert_eq!(vs.page_count(), 250);
    }

    #[test]
    fn scroll_to_maps_rows_consistently() {
        let mut vs = paged();
        vs.scroll_to(50_000);
        assert_eq!(vs.page(), 5);
        // offset = round(5 * 1.5M / 249)
        assert_eq!(vs.offset(), 30_120);
        assert_eq!(vs.virtual_top(), 50_000);
        let visible = vs.visible_range();
        assert_eq!(visible.top, 2000);
        assert_eq!(visible.bottom, 2020);
        // the top visible row's real top equals the real scroll position
        assert_eq!(vs.row_top(visible.top), vs.scroll_top() as i64);
        assert_eq!(vs.row_at_position(vs.scroll_top()), 2000);
    }

    #[test]
    fn offset_changes_only_across_pages() {
        let mut vs = paged();
        vs.scroll_to(50_000);
        let out = vs.scroll_to(51_000);
        assert!(!out.offset_changed);
        assert!(out.scrolled);
        let out = vs.scroll_to(62_000);
        assert!(out.offset_changed);
        assert_eq!(vs.page(), 6);
    }

    #[test]
    fn scroll_clamps_to_content_end() {
        let mut vs = paged();
        vs.scroll_to(u64::MAX);
        assert_eq!(vs.virtual_top(), 2_500_000 - 500);
        assert_eq!(vs.rendered_range().bottom, 99_999);
    }

    #[test]
    fn rendered_range_buffers_follow_direction() {
        let mut vs = paged();
        vs.scroll_to(50_000);
        assert_eq!(vs.direction(), ScrollDir::Down);
        let rendered = vs.rendered_range();
        let visible = vs.visible_range();
        // 3 rows above, a full viewport (20 rows) below
        assert_eq!(rendered.top, visible.top - 3);
        assert_eq!(rendered.bottom, visible.bottom + 20);
        assert!(rendered.top <= visible.top && rendered.bottom >= visible.bottom);

        vs.scroll_to(40_000);
        assert_eq!(vs.direction(), ScrollDir::Up);
        let rendered = vs.rendered_range();
        let visible = vs.visible_range();
        assert_eq!(rendered.top, visible.top - 20);
        assert_eq!(rendered.bottom, visible.bottom + 3);
    }

    #[test]
    fn unknown_direction_uses_minimum_buffers() {
        let vs = paged();
        let rendered = vs.rendered_range();
        let visible = vs.visible_range();
        assert_eq!(rendered.top, visible.top.saturating_sub(3));
        assert_eq!(rendered.bottom, visible.bottom + 3);
    }

    #[test]
    fn rendered_range_clamps_to_data() {
        let mut vs = VirtualScroll::new(25, 1_000_000);
        vs.set_viewport_height(500);
        vs.set_row_count(10);
        let rendered = vs.rendered_range();
        assert_eq!(rendered.top, 0);
        assert_eq!(rendered.bottom, 9);
    }

    #[test]
    fn row_count_shrink_keeps_or_clamps_position() {
        let mut vs = paged();
        vs.scroll_to(50_000);
        // still reachable: virtual position survives
        let out = vs.set_row_count(50_000);
        assert_eq!(vs.virtual_top(), 50_000);
        assert!(!out.scrolled || vs.virtual_top() == 50_000);
        // not reachable: clamps to the new end
        vs.set_row_count(100);
        assert_eq!(vs.virtual_top(), 100 * 25 - 500);
    }

    #[test]
    fn scroll_by_moves_in_virtual_space() {
        let mut vs = paged();
        vs.scroll_to(50_000);
        vs.scroll_by(-1_000);
        assert_eq!(vs.virtual_top(), 49_000);
        vs.scroll_by(-100_000);
        assert_eq!(vs.virtual_top(), 0);
    }

    #[test]
    fn jump_to_real_interpolates_page_from_fraction() {
        let mut vs = paged();
        // jump the "thumb" to halfway down the real canvas
        let out = vs.jump_to_real(500_000);
        assert!(out.scrolled);
        assert_eq!(vs.scroll_top(), 500_000);
        // page ≈ real * ((th - vh) / (h - vh)) / ph
        assert_eq!(vs.page(), 125);
        let row = vs.row_at_position(vs.scroll_top());
        assert!(row > 49_000 && row < 51_000, "row {row}");
    }
}
