//! Source File - one delimited input and its derived table

use crate::error::{CsvqlError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref NON_ALPHANUMERIC: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Derives a table name from the file base name: extension dropped,
/// lower-cased, every non-alphanumeric character stripped.
pub fn table_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    NON_ALPHANUMERIC.replace_all(&stem, "").into_owned()
}

/// Builds a record reader; the header is read explicitly by the schema builder
pub fn csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_reader(reader)
}

#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub table_name: String,
    pub delimiter: u8,
    /// Header, filled in once the schema is built
    pub columns: Vec<String>,
    pub total_lines: u64,
    /// Data rows inserted so far
    pub current_line: u64,
    handle: Option<File>,
}

impl SourceFile {
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let handle = File::open(path).map_err(|source| CsvqlError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            table_name: table_name_for(path),
            delimiter,
            columns: Vec::new(),
            total_lines: 0,
            current_line: 0,
            handle: Some(handle),
        })
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Lends the read handle out for one streaming pass
    pub(crate) fn take_handle(&mut self) -> Option<File> {
        self.handle.take()
    }

    pub(crate) fn restore_handle(&mut self, handle: File) {
        self.handle = Some(handle);
    }

    /// Drops the read handle
    pub fn close(&mut self) {
        self.handle.take();
    }
}
