//! Styling for [`GridWidget`](crate::widget::GridWidget).
//!
//! A [`Theme`] is a plain bag of [`Style`]s. The widget resolves the css-like
//! class names carried by cached rows and cells (`"active"`, `"selected"`,
//! formatter classes, per-column classes) into styles through
//! [`Theme::class_style`], so embedders can restyle the grid without touching
//! the engine.

use ratatui::style::{Style, Stylize};

/// Visual styles for the grid widget.
///
/// All fields are public; start from [`Theme::default`] and override what you
/// need. Classes injected by formatters or by
/// [`set_cell_css_styles`](vgrid_core::DataGrid::set_cell_css_styles) that are
/// not built in can be mapped through [`custom`](Theme::custom).
#[derive(Debug, Clone)]
pub struct Theme {
    /// Base text style for the whole grid area.
    pub text: Style,
    /// Secondary text (status hints, placeholder cells).
    pub muted: Style,
    /// Header row.
    pub header: Style,
    /// The active cell.
    pub active: Style,
    /// The row carrying the active cell. Defaults to no extra styling.
    pub active_row: Style,
    /// Cells inside a selected range.
    pub selected: Style,
    /// The cell currently being edited and the editor overlay.
    pub editing: Style,
    /// A cell whose pending edit failed validation.
    pub invalid: Style,
    /// The add-new row appended after the data when enabled.
    pub add_new: Style,
    /// Rows rendered before their data has arrived.
    pub loading: Style,
    /// Column separators and resize handles.
    pub grid_line: Style,
    /// Vertical scrollbar thumb and track.
    pub scrollbar: Style,
    /// Extra class name to style mappings, checked after the built-ins.
    pub custom: Vec<(String, Style)>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text: Style::new(),
            muted: Style::new().dark_gray(),
            header: Style::new().bold(),
            active: Style::new().reversed(),
            active_row: Style::new(),
            selected: Style::new().on_blue(),
            editing: Style::new().on_cyan().black(),
            invalid: Style::new().red(),
            add_new: Style::new().italic(),
            loading: Style::new().dim(),
            grid_line: Style::new().dark_gray(),
            scrollbar: Style::new().dark_gray(),
            custom: Vec::new(),
        }
    }
}

impl Theme {
    /// Resolves a cell class name to a style, if this theme maps it.
    pub fn class_style(&self, class: &str) -> Option<Style> {
        match class {
            "active" => Some(self.active),
            "selected" => Some(self.selected),
            "editable" => Some(self.editing),
            "invalid" => Some(self.invalid),
            "new-row" => Some(self.add_new),
            _ => self.custom_style(class),
        }
    }

    /// Resolves a row class name to a style.
    ///
    /// Rows reuse the cell mapping except for `"active"`, which would repaint
    /// the whole row with the active-cell style; rows use
    /// [`active_row`](Theme::active_row) instead.
    pub fn row_class_style(&self, class: &str) -> Option<Style> {
        match class {
            "active" => Some(self.active_row),
            _ => self.class_style(class),
        }
    }

    fn custom_style(&self, class: &str) -> Option<Style> {
        self.custom
            .iter()
            .find(|(name, _)| name == class)
            .map(|(_, style)| *style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_lookup_prefers_builtins() {
        let mut theme = Theme::default();
        theme.custom.push(("warn".to_string(), Style::new().yellow()));

        assert_eq!(theme.class_style("active"), Some(theme.active));
        assert_eq!(theme.class_style("warn"), Some(Style::new().yellow()));
        assert_eq!(theme.class_style("nope"), None);
    }

    #[test]
    fn rows_do_not_inherit_the_active_cell_style() {
        let theme = Theme::default();
        assert_eq!(theme.row_class_style("active"), Some(theme.active_row));
        assert_eq!(theme.row_class_style("new-row"), Some(theme.add_new));
    }
}
