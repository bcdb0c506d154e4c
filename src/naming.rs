//! File naming for exported images.
//!
//! An image exported from `<source>` table `T`, column `C`, occurrence `n`
//! is stored as `DB_<source>_Images/T_C_<n>.<ext>`, with `n` zero-padded
//! to the width of the source shape. Table and column names may contain
//! the separator themselves, so decoding searches the table name among the
//! tables actually present, shortest candidate first.

use crate::source::TabularSource;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Address {
    pub source: String,
    pub table: String,
    pub column: String,
    /// 1-based position among the non-null blobs of this table and column.
    pub index: u32,
}

impl Address {
    pub fn new<S, T, C>(source: S, table: T, column: C, index: u32) -> Self
    where
        S: Into<String>,
        T: Into<String>,
        C: Into<String>,
    {
        Self {
            source: source.into(),
            table: table.into(),
            column: column.into(),
            index,
        }
    }

    /// File stem without extension: `<table>_<column>_<index>`.
    pub fn file_stem(&self, width: usize) -> String {
        format!(
            "{}{sep}{}{sep}{:0width$}",
            self.table,
            self.column,
            self.index,
            sep = SEPARATOR,
            width = width
        )
    }
}

pub fn image_folder_name(source_name: &str) -> String {
    format!("DB_{}_Images", source_name)
}

pub fn image_folder(prefix: &Path, source_name: &str) -> PathBuf {
    prefix.join(image_folder_name(source_name))
}

/// Table, column and occurrence index recovered from a file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    /// Table name as stored in the source.
    pub table: String,
    /// Column name as stored in the source.
    pub column: String,
    pub index: u32,
}

impl DecodedName {
    /// Zero-based row position; the occurrence order is the row order.
    pub fn row_position(&self) -> Option<usize> {
        (self.index as usize).checked_sub(1)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid name format '{stem}' (expected tableName_columnName_index)")]
    TooFewParts { stem: String },

    #[error("non-numeric index in '{stem}'")]
    NonNumericIndex { stem: String },

    #[error("could not find matching table for '{stem}'")]
    UnknownTable { stem: String },

    #[error("column '{column}' not found in table '{table}'")]
    UnknownColumn {
        stem: String,
        table: String,
        column: String,
    },
}

impl DecodeError {
    pub fn file_stem(&self) -> &str {
        match self {
            DecodeError::TooFewParts { stem }
            | DecodeError::NonNumericIndex { stem }
            | DecodeError::UnknownTable { stem }
            | DecodeError::UnknownColumn { stem, .. } => stem,
        }
    }
}

/// Parses the trailing index of a stem and returns the remaining name parts.
fn split_stem(stem: &str) -> Result<(Vec<&str>, u32), DecodeError> {
    let parts: Vec<&str> = stem.split(SEPARATOR).collect();
    if parts.len() < 3 {
        return Err(DecodeError::TooFewParts {
            stem: stem.to_string(),
        });
    }

    let index_part = parts[parts.len() - 1];
    let index = if !index_part.is_empty() && index_part.bytes().all(|b| b.is_ascii_digit()) {
        index_part.parse::<u32>().ok()
    } else {
        None
    };

    match index {
        Some(index) => Ok((parts[..parts.len() - 1].to_vec(), index)),
        None => Err(DecodeError::NonNumericIndex {
            stem: stem.to_string(),
        }),
    }
}

/// Decodes a file stem against the tables of `source`.
///
/// Table candidates are the leading parts re-joined with the separator,
/// tried from one part upwards; at least one part is always left for the
/// column. The first candidate naming an existing table whose remaining
/// parts name one of its columns wins, so shorter table names take
/// precedence.
pub fn decode(stem: &str, source: &TabularSource) -> Result<DecodedName, DecodeError> {
    let (name_parts, index) = split_stem(stem)?;
    let sep = SEPARATOR.to_string();
    let mut first_miss: Option<(String, String)> = None;

    for table_len in 1..name_parts.len() {
        let candidate = name_parts[..table_len].join(&sep);
        let Some(table) = source.table(&candidate) else {
            continue;
        };

        let column_name = name_parts[table_len..].join(&sep);
        match table.column(&column_name) {
            Some(column) => {
                return Ok(DecodedName {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    index,
                })
            }
            None => {
                tracing::trace!(table = %table.name, column = %column_name, "candidate rejected");
                first_miss.get_or_insert((table.name.clone(), column_name));
            }
        }
    }

    match first_miss {
        Some((table, column)) => Err(DecodeError::UnknownColumn {
            stem: stem.to_string(),
            table,
            column,
        }),
        None => Err(DecodeError::UnknownTable {
            stem: stem.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ColumnKind, SourceShape, Table};

    fn source_with(tables: &[(&str, &[&str])]) -> TabularSource {
        let mut source = TabularSource::new("data.xml", SourceShape::SchemaTyped);
        for (name, columns) in tables {
            let mut table = Table::new(*name);
            for column in *columns {
                table.add_column(*column, Some(ColumnKind::Binary));
            }
            source.add_table(table).unwrap();
        }
        source
    }

    #[test]
    fn test_encode_widths() {
        let address = Address::new("data.xml", "Products", "Image", 7);
        assert_eq!(address.file_stem(2), "Products_Image_07");
        assert_eq!(address.file_stem(3), "Products_Image_007");
        assert_eq!(Address::new("s", "T", "C", 1234).file_stem(2), "T_C_1234");
    }

    #[test]
    fn test_image_folder() {
        let address = Address::new("shop.sqlite3", "items", "photo", 1);
        let path = image_folder(Path::new("/exports"), &address.source)
            .join(address.file_stem(SourceShape::RowSet.index_width()));
        assert_eq!(
            path,
            PathBuf::from("/exports/DB_shop.sqlite3_Images/items_photo_001")
        );
    }

    #[test]
    fn test_decode_simple() {
        let source = source_with(&[("Products", &["Image"])]);
        let decoded = decode("Products_Image_01", &source).unwrap();
        assert_eq!(decoded.table, "Products");
        assert_eq!(decoded.column, "Image");
        assert_eq!(decoded.index, 1);
        assert_eq!(decoded.row_position(), Some(0));
    }

    #[test]
    fn test_decode_prefers_longer_table_when_shorter_has_no_column() {
        let source = source_with(&[("A", &["X"]), ("A_B", &["C"])]);
        let decoded = decode("A_B_C_1", &source).unwrap();
        assert_eq!(decoded.table, "A_B");
        assert_eq!(decoded.column, "C");
        assert_eq!(decoded.index, 1);
    }

    #[test]
    fn test_decode_shortest_table_wins() {
        let source = source_with(&[("A", &["B_C"]), ("A_B", &["C"])]);
        let decoded = decode("A_B_C_1", &source).unwrap();
        assert_eq!(decoded.table, "A");
        assert_eq!(decoded.column, "B_C");
    }

    #[test]
    fn test_decode_single_table() {
        let source = source_with(&[("A", &["C"])]);
        let decoded = decode("A_C_1", &source).unwrap();
        assert_eq!(decoded.table, "A");
        assert_eq!(decoded.column, "C");
        assert_eq!(decoded.index, 1);
    }

    #[test]
    fn test_decode_column_with_separator() {
        let source = source_with(&[("Order_Items", &["Main_Photo"])]);
        let decoded = decode("Order_Items_Main_Photo_012", &source).unwrap();
        assert_eq!(decoded.table, "Order_Items");
        assert_eq!(decoded.column, "Main_Photo");
        assert_eq!(decoded.index, 12);
    }

    #[test]
    fn test_decode_is_case_insensitive_and_returns_stored_names() {
        let source = source_with(&[("Products", &["Image"])]);
        let decoded = decode("products_IMAGE_3", &source).unwrap();
        assert_eq!(decoded.table, "Products");
        assert_eq!(decoded.column, "Image");
    }

    #[test]
    fn test_malformed_names() {
        let source = source_with(&[("A", &["C"])]);
        assert!(matches!(
            decode("A_1", &source),
            Err(DecodeError::TooFewParts { .. })
        ));
        assert!(matches!(
            decode("Products", &source),
            Err(DecodeError::TooFewParts { .. })
        ));
        assert!(matches!(
            decode("A_C_x1", &source),
            Err(DecodeError::NonNumericIndex { .. })
        ));
        assert!(matches!(
            decode("A_C_-1", &source),
            Err(DecodeError::NonNumericIndex { .. })
        ));
        assert!(matches!(
            decode("A_C_", &source),
            Err(DecodeError::NonNumericIndex { .. })
        ));
    }

    #[test]
    fn test_unresolved_names() {
        let source = source_with(&[("A", &["C"])]);
        assert_eq!(
            decode("Z_C_1", &source),
            Err(DecodeError::UnknownTable {
                stem: "Z_C_1".to_string()
            })
        );
        assert_eq!(
            decode("A_D_1", &source),
            Err(DecodeError::UnknownColumn {
                stem: "A_D_1".to_string(),
                table: "A".to_string(),
                column: "D".to_string(),
            })
        );
    }

    #[test]
    fn test_encode_then_decode() {
        let source = source_with(&[("my_table", &["pic_one", "pic"])]);
        for column in ["pic_one", "pic"] {
            let stem = Address::new("data.xml", "my_table", column, 5).file_stem(2);
            let decoded = decode(&stem, &source).unwrap();
            assert_eq!(decoded.table, "my_table");
            assert_eq!(decoded.column, column);
            assert_eq!(decoded.index, 5);
        }
    }

    #[test]
    fn test_zero_index_has_no_row() {
        let source = source_with(&[("A", &["C"])]);
        let decoded = decode("A_C_00", &source).unwrap();
        assert_eq!(decoded.index, 0);
        assert_eq!(decoded.row_position(), None);
    }
}
