//! Run parameters collected from the command line

use crate::error::{CsvqlError, Result};
use crate::ingestion::IngestionOptions;
use std::path::PathBuf;

/// Environment variable holding the default storage location
pub const STORAGE_ENV: &str = "CSVQL_STORAGE";

#[derive(Debug, Clone)]
pub struct Params {
    pub file_inputs: Vec<PathBuf>,
    pub delimiter: char,
    pub query: Option<String>,
    pub export: Option<PathBuf>,
    pub export_type: Option<String>,
    /// SQLite file; in-memory when unset
    pub storage: Option<String>,
    /// Row cap for the whole run
    pub lines: Option<u64>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            file_inputs: Vec::new(),
            delimiter: ',',
            query: None,
            export: None,
            export_type: None,
            storage: None,
            lines: None,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.file_inputs.is_empty() {
            return Err(CsvqlError::Validation("at least one file is required".to_string()));
        }

        if !self.delimiter.is_ascii() {
            return Err(CsvqlError::Validation(format!(
                "delimiter {:?} must be a single ASCII character",
                self.delimiter
            )));
        }

        if self.export.is_some() && self.export_type.as_deref().map_or(true, str::is_empty) {
            return Err(CsvqlError::Validation(
                "export type is required when an export path is set".to_string(),
            ));
        }

        if self.lines == Some(0) {
            return Err(CsvqlError::Validation("lines must be greater than zero".to_string()));
        }

        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    /// Query text, if a non-blank one was given
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions::new(self.file_inputs.clone())
            .with_delimiter(self.delimiter_byte())
            .with_row_limit(self.lines)
    }
}
