//! SQLite Storage - single shared connection behind a mutex
//!
//! Architecture: one `rusqlite::Connection`, in memory by default or backed by
//! a file when a data source is given. Every call takes the connection lock
//! for its own duration; query results hold it until the consumer returns.

use crate::error::{CsvqlError, Result};
use crate::storage::catalog::{
    CatalogEntry, SQL_CREATE_CATALOG, SQL_INSERT_CATALOG, SQL_SHOW_TABLES,
};
use crate::storage::{Row, RowStream, Storage};
use itertools::Itertools;
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::sync::Mutex;
use tracing::debug;

pub const DATA_SOURCE_NAME_DEFAULT: &str = ":memory:";

pub struct SqliteStorage {
    data_source: String,
    db: Mutex<Option<Connection>>,
}

impl SqliteStorage {
    /// Opens the given database file, or an in-memory database when `None`/empty
    pub fn open(data_source: Option<&str>) -> Result<Self> {
        let data_source = data_source
            .filter(|ds| !ds.trim().is_empty())
            .unwrap_or(DATA_SOURCE_NAME_DEFAULT)
            .to_string();

        let db = if data_source == DATA_SOURCE_NAME_DEFAULT {
            Connection::open_in_memory()
        } else {
            Connection::open(&data_source)
        }
        .map_err(|e| {
            CsvqlError::Storage(format!("failed to open database {}: {}", data_source, e))
        })?;

        debug!("Opened storage at {}", data_source);

        Ok(Self {
            data_source,
            db: Mutex::new(Some(db)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(None)
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    /// Reads the whole catalog
    pub fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        self.with_connection(|db| {
            db.execute_batch(SQL_CREATE_CATALOG)?;
            let mut stmt = db.prepare(SQL_SHOW_TABLES)?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (id, name, columns, total_columns) = row?;
                entries.push(CatalogEntry {
                    id,
                    name,
                    columns: serde_json::from_str(&columns)?,
                    total_columns,
                });
            }
            Ok(entries)
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .db
            .lock()
            .map_err(|_| CsvqlError::Storage("connection lock poisoned".to_string()))?;
        let db = guard.as_ref().ok_or(CsvqlError::StorageClosed)?;
        f(db)
    }
}

impl Storage for SqliteStorage {
    fn build_structure(&self, table_name: &str, columns: &[String]) -> Result<()> {
        if columns.is_empty() {
            return Err(CsvqlError::schema(table_name, "header has no columns"));
        }

        let create = create_table_statement(table_name, columns);
        let serialized_columns = serde_json::to_string(columns)?;

        self.with_connection(|db| {
            // Table and catalog entry land together or not at all
            let tx = db
                .unchecked_transaction()
                .map_err(|e| CsvqlError::schema(table_name, e))?;

            tx.execute_batch(&create).map_err(|e| {
                CsvqlError::schema(
                    table_name,
                    format!("failed to create structure: {} (sql: {})", e, create.trim()),
                )
            })?;

            tx.execute_batch(SQL_CREATE_CATALOG).map_err(|e| {
                CsvqlError::schema(table_name, format!("failed to create catalog: {}", e))
            })?;

            tx.execute(
                SQL_INSERT_CATALOG,
                params![table_name, serialized_columns, columns.len() as i64],
            )
            .map_err(|e| {
                CsvqlError::schema(table_name, format!("failed to register table: {}", e))
            })?;

            tx.commit().map_err(|e| CsvqlError::schema(table_name, e))?;
            Ok(())
        })?;

        debug!("Created table {} with {} columns", table_name, columns.len());
        Ok(())
    }

    fn insert_row(&self, table_name: &str, columns: &[String], values: &[String]) -> Result<()> {
        if columns.len() != values.len() {
            return Err(CsvqlError::ColumnMismatch {
                table: table_name.to_string(),
                columns: columns.len(),
                values: values.len(),
            });
        }

        let insert = insert_statement(table_name, columns);
        self.with_connection(|db| {
            let mut stmt = db.prepare_cached(&insert).map_err(|e| {
                CsvqlError::Storage(format!("failed to prepare insert: {} (sql: {})", e, insert))
            })?;
            stmt.execute(params_from_iter(values.iter())).map_err(|e| {
                CsvqlError::Storage(format!("failed to execute insert: {} (sql: {})", e, insert))
            })?;
            Ok(())
        })
    }

    fn query<T, F>(&self, statement: &str, consume: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RowStream) -> Result<T>,
    {
        self.with_connection(|db| {
            let mut stmt = db
                .prepare(statement)
                .map_err(|e| CsvqlError::Query(e.to_string()))?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let rows = stmt
                .query([])
                .map_err(|e| CsvqlError::Query(e.to_string()))?;

            let mut stream = SqliteRowStream { columns, rows };
            consume(&mut stream)
        })
    }

    fn show_tables<T, F>(&self, consume: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RowStream) -> Result<T>,
    {
        self.with_connection(|db| {
            db.execute_batch(SQL_CREATE_CATALOG)
                .map_err(|e| CsvqlError::Query(e.to_string()))
        })?;
        self.query(SQL_SHOW_TABLES, consume)
    }

    fn close(&self) -> Result<()> {
        let mut guard = self
            .db
            .lock()
            .map_err(|_| CsvqlError::Storage("connection lock poisoned".to_string()))?;

        match guard.take() {
            Some(db) => db.close().map_err(|(_, e)| {
                CsvqlError::Storage(format!("failed to close database: {}", e))
            }),
            None => Ok(()),
        }
    }
}

struct SqliteRowStream<'stmt> {
    columns: Vec<String>,
    rows: rusqlite::Rows<'stmt>,
}

impl RowStream for SqliteRowStream<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        let row = match self.rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(CsvqlError::RowRead(e.to_string())),
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for idx in 0..self.columns.len() {
            let value = row
                .get_ref(idx)
                .map_err(|e| CsvqlError::RowRead(e.to_string()))?;
            values.push(cell_from_sql(value));
        }

        Ok(Some(values))
    }
}

fn cell_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

/// Double-quotes an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_statement(table_name: &str, columns: &[String]) -> String {
    let attrs = columns
        .iter()
        .map(|column| format!("\n\t{} text", quote_identifier(column)))
        .join(",");
    format!("CREATE TABLE {} ({}\n);", quote_identifier(table_name), attrs)
}

fn insert_statement(table_name: &str, columns: &[String]) -> String {
    let columns_raw = columns.iter().map(|c| quote_identifier(c)).join(", ");
    let params_raw = (1..=columns.len()).map(|i| format!("?{}", i)).join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote_identifier(table_name),
        columns_raw,
        params_raw
    )
}
