//! JSON-Lines exporter - one compact object per result row

use crate::error::{CsvqlError, Result};
use crate::export::{prepare_destination, ExportSummary, Exporter};
use crate::progress::ProgressTracker;
use crate::storage::RowStream;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonlExport<'a> {
    rows: &'a mut dyn RowStream,
    path: PathBuf,
    progress: &'a ProgressTracker,
}

impl<'a> JsonlExport<'a> {
    pub fn new(rows: &'a mut dyn RowStream, path: &Path, progress: &'a ProgressTracker) -> Self {
        Self {
            rows,
            path: path.to_path_buf(),
            progress,
        }
    }
}

impl Exporter for JsonlExport<'_> {
    fn export(&mut self) -> Result<ExportSummary> {
        prepare_destination(&self.path)?;

        let path = &self.path;
        let file = File::create(path).map_err(|e| CsvqlError::export(path, e))?;
        let mut writer = BufWriter::new(file);
        let columns = self.rows.columns().to_vec();

        let mut written = 0u64;
        while let Some(row) = self.rows.next_row()? {
            let object: Map<String, Value> = columns.iter().cloned().zip(row).collect();
            serde_json::to_writer(&mut writer, &object)?;
            writer
                .write_all(b"\n")
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
