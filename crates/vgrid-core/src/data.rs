//! Data source seam.
//!
//! The grid reads rows through [`DataProvider`], resolved once at
//! construction: either the built-in [`VecSource`] over a plain vector, or
//! any capability object the embedding supplies (lazy loaders may return
//! `None` from [`DataProvider::item`] for rows whose data has not arrived;
//! the cache renders those as loading placeholders). Items expose their
//! fields dynamically via [`GridItem`] so columns can address them by name.

use std::fmt;
use std::rc::Rc;

use crate::column::CellFormatter;
use crate::editing::EditorFactory;

/// A single cell's dynamic value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CellValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Int(n) => write!(f, "{n}"),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Int(n)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Float(x)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// A row item addressable by field name.
pub trait GridItem {
    fn value(&self, field: &str) -> CellValue;
    fn set_value(&mut self, field: &str, value: CellValue);
}

/// Field-ordered item for ad-hoc data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.set_value(&field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v)
    }
}

impl GridItem for Record {
    fn value(&self, field: &str) -> CellValue {
        self.get(field).cloned().unwrap_or_default()
    }

    fn set_value(&mut self, field: &str, value: CellValue) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }
}

/// Colspan of a cell within its row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Span {
    Count(u32),
    /// Occupy every remaining column of the row.
    All,
}

/// Addresses a column from row metadata, by id or by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnRef {
    Id(String),
    Index(usize),
}

/// Per-cell overrides supplied by row metadata.
#[derive(Clone, Default)]
pub struct CellMetadata {
    pub colspan: Option<Span>,
    pub focusable: Option<bool>,
    pub selectable: Option<bool>,
    pub formatter: Option<CellFormatter>,
    pub editor: Option<Rc<dyn EditorFactory>>,
}

/// Per-row overrides supplied by the data source.
#[derive(Clone, Default)]
pub struct RowMetadata {
    pub css_classes: Option<String>,
    pub focusable: Option<bool>,
    pub selectable: Option<bool>,
    pub formatter: Option<CellFormatter>,
    pub columns: Vec<(ColumnRef, CellMetadata)>,
}

impl RowMetadata {
    /// Cell override for a column, id match taking precedence over index.
    pub fn cell(&self, column_id: &str, cell: usize) -> Option<&CellMetadata> {
        self.columns
            .iter()
            .find(|(r, _)| matches!(r, ColumnRef::Id(id) if id == column_id))
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(r, _)| matches!(r, ColumnRef::Index(i) if *i == cell))
            })
            .map(|(_, m)| m)
    }
}

/// Row access seam between the grid and its data.
pub trait DataProvider {
    fn len(&self) -> usize;

    /// `None` for rows inside `len()` means "not loaded yet"; the cache
    /// renders a loading placeholder for them.
    fn item(&self, index: usize) -> Option<&dyn GridItem>;

    fn item_mut(&mut self, index: usize) -> Option<&mut dyn GridItem>;

    fn row_metadata(&self, index: usize) -> Option<RowMetadata> {
        let _ = index;
        None
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plain indexable sequence source.
pub struct VecSource<T> {
    items: Vec<T>,
}

impl<T: GridItem> VecSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<T: GridItem> DataProvider for VecSource<T> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn item(&self, index: usize) -> Option<&dyn GridItem> {
        self.items.get(index).map(|item| item as &dyn GridItem)
    }

    fn item_mut(&mut self, index: usize) -> Option<&mut dyn GridItem> {
        self.items
            .get_mut(index)
            .map(|item| item as &mut dyn GridItem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let mut r = Record::new().with("name", "ada").with("age", 36i64);
        assert_eq!(r.value("name"), CellValue::Text("ada".into()));
        assert_eq!(r.value("age"), CellValue::Int(36));
        assert_eq!(r.value("missing"), CellValue::Null);
        r.set_value("age", CellValue::Int(37));
        assert_eq!(r.value("age"), CellValue::Int(37));
    }

    #[test]
    fn metadata_id_match_beats_index_match() {
        let meta = RowMetadata {
            columns: vec![
                (
                    ColumnRef::Index(1),
                    CellMetadata {
                        colspan: Some(Span::Count(2)),
                        ..Default::default()
                    },
                ),
                (
                    ColumnRef::Id("b".into()),
                    CellMetadata {
                        colspan: Some(Span::All),
                        ..Default::default()
                    },
                ),
            ],
            ..Default::default()
        };
        assert_eq!(meta.cell("b", 1).unwrap().colspan, Some(Span::All));
        assert_eq!(meta.cell("x", 1).unwrap().colspan, Some(Span::Count(2)));
        assert!(meta.cell("x", 0).is_none());
    }

    #[test]
    fn vec_source_provides_items() {
        let mut src = VecSource::new(vec![Record::new().with("n", 1i64)]);
        assert_eq!(src.len(), 1);
        assert_eq!(src.item(0).unwrap().value("n"), CellValue::Int(1));
        assert!(src.item(1).is_none());
        src.item_mut(0)
            .unwrap()
            .set_value("n", CellValue::Int(2));
        assert_eq!(src.item(0).unwrap().value("n"), CellValue::Int(2));
    }

    #[test]
    fn cell_value_display() {
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::Int(-4).to_string(), "-4");
        assert_eq!(CellValue::Text("hi".into()).to_string(), "hi");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
    }
}
