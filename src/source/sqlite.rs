use crate::error::{DbImagesError, Result};
use crate::source::{source_name, CellValue, SourceAdapter, SourceShape, Table, TabularSource};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Reads every user table of a SQLite file as an untyped row set.
pub struct SqliteAdapter {
    extensions: Vec<String>,
}

impl SqliteAdapter {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

impl SourceAdapter for SqliteAdapter {
    fn format_name(&self) -> &'static str {
        "SQLite"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn load(&self, path: &Path) -> Result<TabularSource> {
        if !path.is_file() {
            return Err(DbImagesError::source_unavailable(path, "file not found"));
        }

        // The connection lives for this call only and is dropped on every return path.
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| DbImagesError::source_unavailable(path, e))?;

        let source = read_tables(&conn, &source_name(path))
            .map_err(|e| DbImagesError::source_unavailable(path, e))?;

        tracing::debug!(
            path = %path.display(),
            tables = source.tables().len(),
            "loaded sqlite source"
        );
        Ok(source)
    }
}

fn read_tables(conn: &Connection, name: &str) -> rusqlite::Result<TabularSource> {
    let mut source = TabularSource::new(name, SourceShape::RowSet);

    let table_names: Vec<String> = {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect::<rusqlite::Result<_>>()?
    };

    for table_name in table_names {
        let table = read_table(conn, &table_name)?;
        // sqlite_master cannot hold two tables differing only by case
        if source.add_table(table).is_err() {
            tracing::warn!(table = %table_name, "skipping duplicate table name");
        }
    }

    Ok(source)
}

fn read_table(conn: &Connection, table_name: &str) -> rusqlite::Result<Table> {
    let sql = format!("SELECT * FROM {}", quote_identifier(table_name));
    let mut stmt = conn.prepare(&sql)?;

    let mut table = Table::new(table_name);
    for column in stmt.column_names() {
        table.add_column(column, None);
    }
    let column_count = table.columns.len();

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(cell_from_sql(row.get_ref(i)?));
        }
        table.push_row(values);
    }

    Ok(table)
}

fn cell_from_sql(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Other(i.to_string()),
        ValueRef::Real(f) => CellValue::Other(f.to_string()),
        ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => CellValue::Bytes(b.to_vec()),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    fn create_database(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE photos (id INTEGER PRIMARY KEY, caption TEXT, data BLOB);
             CREATE TABLE \"odd \"\"name\"\"\" (value BLOB);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO photos (caption, data) VALUES (?1, ?2)",
            params!["first", vec![1u8, 2, 3]],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO photos (caption, data) VALUES (?1, NULL)",
            params!["second"],
        )
        .unwrap();
    }

    #[test]
    fn test_load_row_set() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("album.sqlite3");
        create_database(&path);

        let adapter = SqliteAdapter::new(vec!["sqlite3".to_string()]);
        let source = adapter.load(&path).unwrap();

        assert_eq!(source.name(), "album.sqlite3");
        assert_eq!(source.shape(), SourceShape::RowSet);

        let photos = source.table("photos").unwrap();
        assert_eq!(photos.columns.len(), 3);
        assert!(photos.columns.iter().all(|c| c.kind.is_none()));
        assert_eq!(photos.row_count(), 2);
        assert_eq!(photos.cell(0, 0), Some(&CellValue::Other("1".to_string())));
        assert_eq!(photos.cell(0, 1), Some(&CellValue::Text("first".to_string())));
        assert_eq!(photos.cell(0, 2), Some(&CellValue::Bytes(vec![1, 2, 3])));
        assert_eq!(photos.cell(1, 2), Some(&CellValue::Null));

        assert!(source.table("odd \"name\"").is_some());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = SqliteAdapter::new(vec!["db".to_string()]);
        let err = adapter.load(&temp_dir.path().join("nope.db")).unwrap_err();
        assert_eq!(err.kind(), "SourceUnavailable");
    }

    #[test]
    fn test_garbage_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.db");
        std::fs::write(&path, "definitely not a sqlite database\n".repeat(64)).unwrap();

        let adapter = SqliteAdapter::new(vec!["db".to_string()]);
        let err = adapter.load(&path).unwrap_err();
        assert_eq!(err.kind(), "SourceUnavailable");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("plain"), "\"plain\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
