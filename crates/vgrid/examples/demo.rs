use std::cell::RefCell;
use std::cmp::Ordering;
use std::io;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableMouseCapture;
use crossterm::event::Event;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui::widgets::Widget;
use vgrid::CellValue;
use vgrid::Column;
use vgrid::ColumnSort;
use vgrid::DataGrid;
use vgrid::GridItem;
use vgrid::GridOptions;
use vgrid::GridWidget;
use vgrid::InputEvent;
use vgrid::Record;
use vgrid::Theme;
use vgrid::VecSource;
use vgrid::crossterm_input::input_event_from_crossterm;
use vgrid::editing::Validation;
use vgrid::editors::CheckboxEditor;
use vgrid::editors::TextInputEditor;
use vgrid::editors::Validator;
use vgrid::grid::AddNewRowInfo;
use vgrid::grid::SortInfo;
use vgrid::widget;

fn main() -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

fn make_rows(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::new()
                .with("id", i as i64)
                .with("name", format!("item {i:04}"))
                .with("done", i % 3 == 0)
                .with("score", ((i * 37) % 101) as i64)
        })
        .collect()
}

fn make_columns() -> Vec<Column> {
    let score_validator: Validator = Rc::new(|s: &str| match s.parse::<i64>() {
        Ok(n) if (0..=100).contains(&n) => Validation::Valid,
        _ => Validation::Invalid("score must be 0..=100".to_string()),
    });

    vec![
        Column::new("id", "Id").width(6).sortable(true),
        Column::new("name", "Name")
            .width(18)
            .sortable(true)
            .editor(TextInputEditor::factory()),
        Column::new("done", "Done")
            .width(6)
            .editor(CheckboxEditor::factory()),
        Column::new("score", "Score")
            .width(7)
            .sortable(true)
            .editor(TextInputEditor::validated_factory(score_validator)),
    ]
}

fn run<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>) -> io::Result<()> {
    let theme = Theme::default();
    let mut grid = DataGrid::new(
        Box::new(VecSource::new(make_rows(10_000))),
        make_columns(),
        GridOptions {
            row_height: 1,
            header_height: 1,
            editable: true,
            auto_edit: false,
            enable_add_row: true,
            multi_column_sort: true,
            ..GridOptions::default()
        },
    );

    // Handlers run inside the grid and cannot mutate it; stash requests and
    // apply them once the event is fully processed.
    let pending_sort: Rc<RefCell<Option<SortInfo>>> = Rc::new(RefCell::new(None));
    let sort_sink = pending_sort.clone();
    grid.events().sort.subscribe(move |_, info| {
        *sort_sink.borrow_mut() = Some(info.clone());
        None
    });

    let pending_add: Rc<RefCell<Option<AddNewRowInfo>>> = Rc::new(RefCell::new(None));
    let add_sink = pending_add.clone();
    grid.events().add_new_row.subscribe(move |_, info| {
        *add_sink.borrow_mut() = Some(info.clone());
        None
    });

    let message = Rc::new(RefCell::new("click a header to sort".to_string()));
    let change_sink = message.clone();
    grid.events().cell_change.subscribe(move |_, info| {
        *change_sink.borrow_mut() = format!("changed r{} c{}", info.row, info.cell);
        None
    });
    let invalid_sink = message.clone();
    grid.events().validation_error.subscribe(move |_, info| {
        *invalid_sink.borrow_mut() = info.message.clone();
        None
    });

    let epoch = Instant::now();
    let mut grid_area = Rect::default();

    loop {
        let now = epoch.elapsed().as_millis() as u64;
        grid.on_tick(now);

        terminal.draw(|f| {
            let area = f.area();
            let block = Block::default()
                .title("vgrid (arrows/Tab move, Enter edits, click headers to sort, q quits)")
                .borders(Borders::ALL);
            let inner = block.inner(area);
            f.render_widget(block, area);

            let body = Rect::new(
                inner.x,
                inner.y,
                inner.width,
                inner.height.saturating_sub(1),
            );
            let status_area = Rect::new(inner.x, inner.y + body.height, inner.width, 1);

            if body != grid_area {
                grid_area = body;
                grid.resize(
                    u32::from(widget::content_width(body)),
                    u32::from(body.height),
                    now,
                );
            }
            grid.render(now);

            let buf = f.buffer_mut();
            GridWidget::new(&grid, &theme).render(body, buf);
            render_status(status_area, buf, &theme, &grid, &message.borrow());
        })?;

        let timeout = grid
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
            .unwrap_or(250)
            .min(250);
        if crossterm::event::poll(Duration::from_millis(timeout))? {
            let raw = crossterm::event::read()?;
            if let Event::Key(key) = &raw
                && key.code == crossterm::event::KeyCode::Char('q')
                && !grid.is_editing()
            {
                return Ok(());
            }

            let now = epoch.elapsed().as_millis() as u64;
            if let Some(ev) = input_event_from_crossterm(raw) {
                let ev = match ev {
                    InputEvent::Mouse(m) => match widget::grid_mouse(grid_area, &m) {
                        Some(m) => InputEvent::Mouse(m),
                        None => continue,
                    },
                    other => other,
                };
                grid.handle_input(&ev, now);
            }
        }

        let now = epoch.elapsed().as_millis() as u64;
        if let Some(info) = pending_add.borrow_mut().take() {
            append_row(&mut grid, &info, now);
        }
        if let Some(info) = pending_sort.borrow_mut().take() {
            apply_sort(&mut grid, &info, now);
        }
    }
}

/// Copies the grid's rows back out. The demo keeps its truth inside the
/// grid's own source and swaps a fresh source in when it reorders or grows.
fn snapshot(grid: &DataGrid) -> Vec<Record> {
    (0..grid.data_length())
        .filter_map(|i| grid.item(i))
        .map(|item| {
            Record::new()
                .with("id", item.value("id"))
                .with("name", item.value("name"))
                .with("done", item.value("done"))
                .with("score", item.value("score"))
        })
        .collect()
}

fn append_row(grid: &mut DataGrid, info: &AddNewRowInfo, now: u64) {
    let mut rows = snapshot(grid);
    let mut row = Record::new()
        .with("id", rows.len() as i64)
        .with("name", "")
        .with("done", false)
        .with("score", 0i64);
    row.set_value(&info.column_id, info.value.clone());
    rows.push(row);
    grid.set_data(Box::new(VecSource::new(rows)), false, now);
    grid.update_row_count(now);
}

fn apply_sort(grid: &mut DataGrid, info: &SortInfo, now: u64) {
    let mut rows = snapshot(grid);
    sort_rows(&mut rows, &info.sort_columns);
    grid.set_data(Box::new(VecSource::new(rows)), false, now);
    grid.invalidate(now);
}

fn compare(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Int(x), CellValue::Int(y)) => x.cmp(y),
        (CellValue::Float(x), CellValue::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (CellValue::Bool(x), CellValue::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_rows(rows: &mut [Record], sort_columns: &[ColumnSort]) {
    rows.sort_by(|a, b| {
        sort_columns
            .iter()
            .map(|sort| {
                let ord = compare(&a.value(&sort.column_id), &b.value(&sort.column_id));
                if sort.ascending { ord } else { ord.reverse() }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn render_status(
    area: Rect,
    buf: &mut ratatui::buffer::Buffer,
    theme: &Theme,
    grid: &DataGrid,
    message: &str,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let active = grid
        .active_cell()
        .map(|(row, cell)| format!("r{row} c{cell}"))
        .unwrap_or("-".to_string());
    let top = grid.scroll_position().scroll_top;
    let s = format!(
        "active={active}  top={top}  rows={}  {message}",
        grid.data_length()
    );
    buf.set_span(area.x, area.y, &Span::styled(s, theme.muted), area.width);
}
