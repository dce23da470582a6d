use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvqlError {
    #[error("failed to open file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to totalize rows of {path}: {source}")]
    Count {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load headers and build structure for table {table}: {message}")]
    Schema { table: String, message: String },

    #[error("failed to process row number {row} of table {table}: {message}")]
    Row {
        table: String,
        row: u64,
        message: String,
    },

    #[error("failed to execute query: {0}")]
    Query(String),

    #[error("failed to read row: {0}")]
    RowRead(String),

    #[error("failed to export data to {path}: {message}")]
    Export { path: PathBuf, message: String },

    #[error("export type {0} not defined")]
    UnknownExportKind(String),

    #[error("failed to validate flag: {0}")]
    Validation(String),

    #[error("column mismatch for table {table}: {columns} columns, {values} values")]
    ColumnMismatch {
        table: String,
        columns: usize,
        values: usize,
    },

    #[error("ingestion unit failed: {0}")]
    Unit(String),

    #[error("storage is closed")]
    StorageClosed,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for CsvqlError {
    fn from(err: rusqlite::Error) -> Self {
        CsvqlError::Storage(err.to_string())
    }
}

impl CsvqlError {
    pub fn schema(table: impl Into<String>, message: impl ToString) -> Self {
        CsvqlError::Schema {
            table: table.into(),
            message: message.to_string(),
        }
    }

    pub fn row(table: impl Into<String>, row: u64, message: impl ToString) -> Self {
        CsvqlError::Row {
            table: table.into(),
            row,
            message: message.to_string(),
        }
    }

    pub fn export(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        CsvqlError::Export {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CsvqlError>;
