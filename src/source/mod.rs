//! In-memory view over the tables of one data source.
//!
//! Concrete drivers live in submodules and produce a [`TabularSource`]
//! through the [`SourceAdapter`] trait. A source is either schema-typed
//! (every column declares its kind) or a row set (kinds are decided per
//! value).

pub mod sqlite;
pub mod xml_dataset;

pub use sqlite::SqliteAdapter;
pub use xml_dataset::{XmlDataSet, XmlDataSetAdapter};

use crate::config::ScanConfig;
use crate::error::{DbImagesError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Binary,
    Text,
    Other,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Binary => "binary",
            ColumnKind::Text => "text",
            ColumnKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bytes(Vec<u8>),
    Text(String),
    /// Any other scalar, kept in its textual form.
    Other(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CellValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceShape {
    SchemaTyped,
    RowSet,
}

impl SourceShape {
    /// Zero-padding width of the occurrence index in exported file names.
    pub fn index_width(self) -> usize {
        match self {
            SourceShape::SchemaTyped => 2,
            SourceShape::RowSet => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// `None` for row-set sources, which carry no declared schema.
    pub kind: Option<ColumnKind>,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, kind: Option<ColumnKind>) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Returns the blob held by `value` if this column treats it as binary.
    pub fn binary_value<'a>(&self, value: &'a CellValue) -> Option<&'a [u8]> {
        match self.kind {
            Some(ColumnKind::Binary) | None => value.as_bytes(),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_column<S: Into<String>>(mut self, name: S, kind: Option<ColumnKind>) -> Self {
        self.add_column(name, kind);
        self
    }

    /// Adds a column and pads existing rows with nulls. Returns its position.
    pub fn add_column<S: Into<String>>(&mut self, name: S, kind: Option<ColumnKind>) -> usize {
        self.columns.push(Column::new(name, kind));
        for row in &mut self.rows {
            row.push(CellValue::Null);
        }
        self.columns.len() - 1
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Null);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.to_lowercase() == name.to_lowercase())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: CellValue) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabularSource {
    name: String,
    shape: SourceShape,
    tables: Vec<Table>,
}

impl TabularSource {
    pub fn new<S: Into<String>>(name: S, shape: SourceShape) -> Self {
        Self {
            name: name.into(),
            shape,
            tables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> SourceShape {
        self.shape
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Adds a table. Names are unique ignoring case.
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        if self.table_index(&table.name).is_some() {
            return Err(DbImagesError::SourceUnavailable {
                path: self.name.clone(),
                reason: format!("duplicate table name '{}'", table.name),
            });
        }
        self.tables.push(table);
        Ok(())
    }

    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| t.name.to_lowercase() == name.to_lowercase())
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.table_index(name).map(|i| &self.tables[i])
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.table_index(name).map(move |i| &mut self.tables[i])
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Opens one kind of data file and materializes it as a [`TabularSource`].
pub trait SourceAdapter {
    fn format_name(&self) -> &'static str;

    /// Lower-case file extensions this adapter recognizes, without the dot.
    fn extensions(&self) -> &[String];

    fn load(&self, path: &Path) -> Result<TabularSource>;

    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let ext = e.to_lowercase();
                self.extensions().iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }
}

/// A loaded source that can be written back to where it came from.
pub trait RoundTripSource {
    fn source(&self) -> &TabularSource;

    fn source_mut(&mut self) -> &mut TabularSource;

    fn serialize(&self) -> Result<String>;
}

/// Adapters in the order their files are processed within a directory.
pub fn default_adapters(config: &ScanConfig) -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(XmlDataSetAdapter::new(config.xml_extensions.clone())),
        Box::new(SqliteAdapter::new(config.sqlite_extensions.clone())),
    ]
}

/// File name (with extension) used to name a source and its image folder.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
