//! Export Module - writes a query result to a file
//!
//! Kinds are resolved by name through [`new_export`]; every exporter starts
//! from a fresh file and advances the shared progress tracker once per row.

pub mod csv;
pub mod jsonl;

pub use self::csv::CsvExport;
pub use self::jsonl::JsonlExport;

use crate::error::{CsvqlError, Result};
use crate::progress::ProgressTracker;
use crate::storage::RowStream;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CSV_EXPORT_TYPE: &str = "csv";
pub const JSONL_EXPORT_TYPE: &str = "jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Csv,
    Jsonl,
}

impl FromStr for ExportKind {
    type Err = CsvqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            CSV_EXPORT_TYPE => Ok(ExportKind::Csv),
            JSONL_EXPORT_TYPE => Ok(ExportKind::Jsonl),
            other => Err(CsvqlError::UnknownExportKind(other.to_string())),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Csv => write!(f, "{}", CSV_EXPORT_TYPE),
            ExportKind::Jsonl => write!(f, "{}", JSONL_EXPORT_TYPE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: u64,
}

pub trait Exporter {
    /// Drains the row stream into the destination file
    fn export(&mut self) -> Result<ExportSummary>;
}

pub enum Export<'a> {
    Csv(CsvExport<'a>),
    Jsonl(JsonlExport<'a>),
}

impl Exporter for Export<'_> {
    fn export(&mut self) -> Result<ExportSummary> {
        match self {
            Export::Csv(export) => export.export(),
            Export::Jsonl(export) => export.export(),
        }
    }
}

/// Resolves `kind` to an exporter over `rows`.
///
/// Unknown kinds fail here, before the destination is touched.
pub fn new_export<'a>(
    kind: &str,
    rows: &'a mut dyn RowStream,
    path: &Path,
    progress: &'a ProgressTracker,
) -> Result<Export<'a>> {
    let export = match kind.parse::<ExportKind>()? {
        ExportKind::Csv => Export::Csv(CsvExport::new(rows, path, progress)),
        ExportKind::Jsonl => Export::Jsonl(JsonlExport::new(rows, path, progress)),
    };
    Ok(export)
}

/// Creates the parent directories and removes a previous file at `path`
pub(crate) fn prepare_destination(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CsvqlError::export(path, format!("failed to create {}: {}", parent.display(), e))
        })?;
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CsvqlError::export(
            path,
            format!("failed to remove previous file: {}", e),
        )),
    }
}
