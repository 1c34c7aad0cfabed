//! Keyboard navigation over the cell grid.
//!
//! Pure stepping logic against a [`NavModel`], so it can be exercised
//! without a live grid. Steps honor colspans and focusability; vertical
//! movement keeps a sticky horizontal anchor (`pos_x`) so traversing a
//! wide spanned cell and moving on restores the original column.

/// What the stepping functions need to know about the grid.
pub trait NavModel {
    /// Total navigable rows, including the add-new row when present.
    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize;

    fn can_cell_be_active(&self, row: usize, cell: usize) -> bool;

    fn colspan(&self, row: usize, cell: usize) -> u32;
}

/// An active position plus the sticky column anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellPos {
    pub row: usize,
    pub cell: usize,
    pub pos_x: usize,
}

impl CellPos {
    pub fn new(row: usize, cell: usize) -> Self {
        Self {
            row,
            cell,
            pos_x: cell,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavDirection {
    Up,
    Down,
    Left,
    Right,
    /// Tab order: right, then on to following rows.
    Next,
    /// Reverse tab order.
    Prev,
}

/// One navigation step. Directional moves need a current position;
/// `Next`/`Prev` seed from the grid edges when there is none.
pub fn step(model: &dyn NavModel, dir: NavDirection, from: Option<CellPos>) -> Option<CellPos> {
    match dir {
        NavDirection::Up => goto_up(model, from?),
        NavDirection::Down => goto_down(model, from?),
        NavDirection::Left => goto_left(model, from?),
        NavDirection::Right => goto_right(model, from?),
        NavDirection::Next => goto_next(model, from),
        NavDirection::Prev => goto_prev(model, from),
    }
}

fn span(model: &dyn NavModel, row: usize, cell: usize) -> usize {
    model.colspan(row, cell).max(1) as usize
}

pub fn goto_right(model: &dyn NavModel, from: CellPos) -> Option<CellPos> {
    let cols = model.column_count();
    if from.cell >= cols {
        return None;
    }
    let mut cell = from.cell;
    loop {
        cell += span(model, from.row, cell);
        if cell >= cols || model.can_cell_be_active(from.row, cell) {
            break;
        }
    }
    (cell < cols).then(|| CellPos::new(from.row, cell))
}

pub fn goto_left(model: &dyn NavModel, from: CellPos) -> Option<CellPos> {
    if from.cell == 0 {
        return None;
    }
    let first = first_focusable_cell(model, from.row)?;
    if first >= from.cell {
        return None;
    }
    let mut prev = CellPos::new(from.row, first);
    loop {
        let pos = goto_right(model, prev)?;
        if pos.cell >= from.cell {
            return Some(prev);
        }
        prev = pos;
    }
}

pub fn goto_down(model: &dyn NavModel, from: CellPos) -> Option<CellPos> {
    let mut row = from.row;
    loop {
        row += 1;
        if row >= model.row_count() {
            return None;
        }
        if let Some(cell) = anchor_cell(model, row, from.pos_x) {
            return Some(CellPos {
                row,
                cell,
                pos_x: from.pos_x,
            });
        }
    }
}

pub fn goto_up(model: &dyn NavModel, from: CellPos) -> Option<CellPos> {
    let mut row = from.row;
    loop {
        row = row.checked_sub(1)?;
        if let Some(cell) = anchor_cell(model, row, from.pos_x) {
            return Some(CellPos {
                row,
                cell,
                pos_x: from.pos_x,
            });
        }
    }
}

/// Cell of `row` whose span covers the anchor column, if it can be
/// activated.
pub fn anchor_cell(model: &dyn NavModel, row: usize, pos_x: usize) -> Option<usize> {
    let mut prev = 0;
    let mut cell = 0;
    while cell <= pos_x {
        prev = cell;
        cell += span(model, row, cell);
    }
    model.can_cell_be_active(row, prev).then_some(prev)
}

pub fn goto_next(model: &dyn NavModel, from: Option<CellPos>) -> Option<CellPos> {
    let from = match from {
        Some(pos) => pos,
        None => {
            let start = CellPos::new(0, 0);
            if model.row_count() > 0 && model.can_cell_be_active(0, 0) {
                return Some(start);
            }
            start
        }
    };
    if let Some(pos) = goto_right(model, from) {
        return Some(pos);
    }
    let mut row = from.row;
    loop {
        row += 1;
        if row >= model.row_count() {
            return None;
        }
        if let Some(cell) = first_focusable_cell(model, row) {
            return Some(CellPos::new(row, cell));
        }
    }
}

pub fn goto_prev(model: &dyn NavModel, from: Option<CellPos>) -> Option<CellPos> {
    if model.row_count() == 0 || model.column_count() == 0 {
        return None;
    }
    let from = match from {
        Some(pos) => pos,
        None => {
            let end = CellPos::new(model.row_count() - 1, model.column_count() - 1);
            if model.can_cell_be_active(end.row, end.cell) {
                return Some(end);
            }
            end
        }
    };
    if let Some(pos) = goto_left(model, from) {
        return Some(pos);
    }
    let mut row = from.row;
    loop {
        row = row.checked_sub(1)?;
        if let Some(cell) = last_focusable_cell(model, row) {
            return Some(CellPos::new(row, cell));
        }
    }
}

pub fn first_focusable_cell(model: &dyn NavModel, row: usize) -> Option<usize> {
    let cols = model.column_count();
    let mut cell = 0;
    while cell < cols {
        if model.can_cell_be_active(row, cell) {
            return Some(cell);
        }
        cell += span(model, row, cell);
    }
    None
}

pub fn last_focusable_cell(model: &dyn NavModel, row: usize) -> Option<usize> {
    let cols = model.column_count();
    let mut last = None;
    let mut cell = 0;
    while cell < cols {
        if model.can_cell_be_active(row, cell) {
            last = Some(cell);
        }
        cell += span(model, row, cell);
    }
    last
}
