//! CSV exporter - header row then one record per result row

use crate::error::{CsvqlError, Result};
use crate::export::{prepare_destination, ExportSummary, Exporter};
use crate::progress::ProgressTracker;
use crate::storage::{cell_to_string, RowStream};
use std::path::{Path, PathBuf};

pub struct CsvExport<'a> {
    rows: &'a mut dyn RowStream,
    path: PathBuf,
    progress: &'a ProgressTracker,
}

impl<'a> CsvExport<'a> {
    pub fn new(rows: &'a mut dyn RowStream, path: &Path, progress: &'a ProgressTracker) -> Self {
        Self {
            rows,
            path: path.to_path_buf(),
            progress,
        }
    }
}

impl Exporter for CsvExport<'_> {
    fn export(&mut self) -> Result<ExportSummary> {
        prepare_destination(&self.path)?;

        let path = &self.path;
        let mut writer =
            ::csv::Writer::from_path(path).map_err(|e| CsvqlError::export(path, e))?;
        writer
            .write_record(self.rows.columns())
            .map_err(|e| CsvqlError::export(path, e))?;

        let mut written = 0u64;
        while let Some(row) = self.rows.next_row()? {
            writer
                .write_record(row.iter().map(cell_to_string))
                .map_err(|e| CsvqlError::export(path, e))?;
            written += 1;
            self.progress.advance(1);
        }

        writer.flush().map_err(|e| CsvqlError::export(path, e))?;

        Ok(ExportSummary {
            path: path.clone(),
            rows: written,
        })
    }
}
