//! Storage Module - narrow contract over the relational engine
//!
//! The ingestion pipeline and the query/export dispatch only talk to the
//! store through [`Storage`]. Query results are lent to a consumer closure as
//! a [`RowStream`] and released by the engine when the closure returns, on
//! success and on error alike.

pub mod catalog;
pub mod sqlite;

pub use catalog::{CatalogEntry, CATALOG_TABLE};
pub use sqlite::SqliteStorage;

use crate::error::Result;
use serde_json::Value;

/// One result row, positionally aligned with [`RowStream::columns`]
pub type Row = Vec<Value>;

/// Forward-only, single-pass sequence of result rows
pub trait RowStream {
    fn columns(&self) -> &[String];

    /// Next row, or `None` once the sequence is exhausted
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Storage contract consumed by the ingestion and query layers
///
/// Implementations hold a single connection. Writers are expected to go
/// through the coordinator's load lock; the engine only guarantees that each
/// individual call is atomic with respect to the connection.
pub trait Storage: Send + Sync {
    /// Creates an all-text table and records it in the catalog
    fn build_structure(&self, table_name: &str, columns: &[String]) -> Result<()>;

    /// Positional insert; `columns` and `values` must have the same length
    fn insert_row(&self, table_name: &str, columns: &[String], values: &[String]) -> Result<()>;

    /// Runs a pass-through statement and lends its result to `consume`
    fn query<T, F>(&self, statement: &str, consume: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RowStream) -> Result<T>;

    /// Lists catalog entries
    fn show_tables<T, F>(&self, consume: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RowStream) -> Result<T>;

    /// Releases the connection. Calling it again is a no-op.
    fn close(&self) -> Result<()>;
}

/// Text rendering of a cell, shared by the console table and the CSV exporter
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Drains a stream into memory. Handy for small results and tests.
pub fn collect_rows(rows: &mut dyn RowStream) -> Result<Vec<Row>> {
    let mut out = Vec::new();
    while let Some(row) = rows.next_row()? {
        out.push(row);
    }
    Ok(out)
}
