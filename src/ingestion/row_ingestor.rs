//! Row Ingestor - streams data records into an existing table

use crate::error::{CsvqlError, Result};
use crate::progress::ProgressTracker;
use crate::storage::Storage;
use csv::StringRecord;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Row cap shared by every file of a run
#[derive(Debug, Default)]
pub struct RowBudget {
    limit: Option<u64>,
    used: AtomicU64,
}

impl RowBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Reserves one row, returns false once the cap is reached
    pub fn try_take(&self) -> bool {
        match self.limit {
            None => {
                self.used.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(limit) => self
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    (used < limit).then_some(used + 1)
                })
                .is_ok(),
        }
    }

    /// Hands back a row reserved by [`RowBudget::try_take`] that was not stored
    pub fn release(&self) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| used.checked_sub(1));
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }
}

pub struct RowIngestor<'a, S: Storage> {
    storage: &'a S,
    progress: &'a ProgressTracker,
    budget: &'a RowBudget,
}

impl<'a, S: Storage> RowIngestor<'a, S> {
    pub fn new(storage: &'a S, progress: &'a ProgressTracker, budget: &'a RowBudget) -> Self {
        Self {
            storage,
            progress,
            budget,
        }
    }

    /// Inserts every remaining record of `reader` into `table_name`.
    ///
    /// Stops at end of input or when the run's budget is spent, returning the
    /// number of rows inserted. The first bad record or rejected insert aborts
    /// the rest of this file.
    pub fn ingest<R: Read>(
        &self,
        table_name: &str,
        columns: &[String],
        reader: &mut csv::Reader<R>,
    ) -> Result<u64> {
        let mut record = StringRecord::new();
        let mut inserted = 0u64;

        loop {
            let row_number = inserted + 1;
            let has_record = reader.read_record(&mut record).map_err(|e| {
                CsvqlError::row(table_name, row_number, format!("failed to read line: {}", e))
            })?;
            if !has_record {
                break;
            }

            if !self.budget.try_take() {
                debug!(
                    "Row limit {:?} reached while loading {}",
                    self.budget.limit(),
                    table_name
                );
                break;
            }

            let values: Vec<String> = record.iter().map(String::from).collect();
            if let Err(e) = self.storage.insert_row(table_name, columns, &values) {
                self.budget.release();
                return Err(CsvqlError::row(table_name, row_number, e));
            }

            inserted = row_number;
            self.progress.advance(1);
        }

        Ok(inserted)
    }
}
