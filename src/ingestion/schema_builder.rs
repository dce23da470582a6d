//! Schema Builder - header row to all-text table plus catalog entry

use crate::error::{CsvqlError, Result};
use crate::storage::Storage;
use csv::StringRecord;
use std::io::Read;

pub struct SchemaBuilder<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> SchemaBuilder<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Reads the header row from `reader` and creates `table_name` from it.
    /// Leaves the reader positioned on the first data record.
    pub fn build<R: Read>(
        &self,
        table_name: &str,
        reader: &mut csv::Reader<R>,
    ) -> Result<Vec<String>> {
        let mut header = StringRecord::new();
        let has_header = reader
            .read_record(&mut header)
            .map_err(|e| CsvqlError::schema(table_name, format!("failed to load headers: {}", e)))?;

        if !has_header {
            return Err(CsvqlError::schema(table_name, "file has no header row"));
        }

        let columns = header_columns(&header);
        if let Some(position) = columns.iter().position(|c| c.is_empty()) {
            return Err(CsvqlError::schema(
                table_name,
                format!("empty column name at position {}", position + 1),
            ));
        }

        self.storage
            .build_structure(table_name, &columns)
            .map_err(|e| match e {
                CsvqlError::Schema { .. } => e,
                other => CsvqlError::schema(table_name, other),
            })?;

        Ok(columns)
    }
}

fn header_columns(header: &StringRecord) -> Vec<String> {
    header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = if idx == 0 { name.trim_start_matches('\u{feff}') } else { name };
            name.trim().to_string()
        })
        .collect()
}
