//! Ingestion Coordinator - open, count and load every input file
//!
//! Each phase fans out one unit per file on a `JoinSet` and is joined before
//! the next one starts. The load phase is serialised by a single async lock so
//! only one file writes to the shared connection at a time.

use crate::error::{CsvqlError, Result};
use crate::ingestion::line_counter::count_lines;
use crate::ingestion::row_ingestor::{RowBudget, RowIngestor};
use crate::ingestion::schema_builder::SchemaBuilder;
use crate::ingestion::source::{csv_reader, SourceFile};
use crate::progress::ProgressTracker;
use crate::storage::{Storage, CATALOG_TABLE};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub file_inputs: Vec<PathBuf>,
    pub delimiter: u8,
    /// Maximum number of data rows loaded by the whole run
    pub row_limit: Option<u64>,
}

impl IngestionOptions {
    pub fn new(file_inputs: Vec<PathBuf>) -> Self {
        Self {
            file_inputs,
            delimiter: b',',
            row_limit: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_row_limit(mut self, row_limit: Option<u64>) -> Self {
        self.row_limit = row_limit;
        self
    }
}

/// Outcome of loading one file
#[derive(Debug, Clone)]
pub struct TableLoad {
    pub table_name: String,
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub rows: u64,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub total_lines: u64,
    pub tables: Vec<TableLoad>,
}

impl IngestionReport {
    pub fn rows_ingested(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

pub struct IngestionCoordinator<S: Storage + 'static> {
    storage: Arc<S>,
    progress: Arc<ProgressTracker>,
    options: IngestionOptions,
    sources: Vec<SourceFile>,
    total_lines: u64,
    load_lock: Arc<Mutex<()>>,
    closed: bool,
}

impl<S: Storage + 'static> IngestionCoordinator<S> {
    pub fn new(storage: Arc<S>, progress: Arc<ProgressTracker>, options: IngestionOptions) -> Self {
        Self {
            storage,
            progress,
            options,
            sources: Vec::new(),
            total_lines: 0,
            load_lock: Arc::new(Mutex::new(())),
            closed: false,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    /// Line total of the inputs, clamped to the row limit
    pub fn lines(&self) -> u64 {
        self.total_lines
    }

    /// Loads every input file into its own table.
    ///
    /// Fails with the first error in input order. Tables and rows written
    /// before a failure stay in the store.
    pub async fn import(&mut self) -> Result<IngestionReport> {
        if self.closed {
            return Err(CsvqlError::StorageClosed);
        }
        if !self.sources.is_empty() {
            return Err(CsvqlError::Validation("files were already imported".to_string()));
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("import", %run_id, files = self.options.file_inputs.len());
        self.run_import(run_id).instrument(span).await
    }

    async fn run_import(&mut self, run_id: Uuid) -> Result<IngestionReport> {
        info!("Importing {} file(s)", self.options.file_inputs.len());

        self.open_files().await?;
        self.check_table_names()?;
        self.count_files().await?;
        self.progress.set_max(self.total_lines);

        let tables = self.load_files().await?;
        let report = IngestionReport {
            run_id,
            total_lines: self.total_lines,
            tables,
        };

        info!(
            "Imported {} row(s) into {} table(s)",
            report.rows_ingested(),
            report.tables.len()
        );
        Ok(report)
    }

    async fn open_files(&mut self) -> Result<()> {
        let mut join_set = JoinSet::new();
        for (idx, path) in self.options.file_inputs.iter().cloned().enumerate() {
            let delimiter = self.options.delimiter;
            join_set.spawn_blocking(move || (idx, SourceFile::open(&path, delimiter)));
        }

        let mut first_error = None;
        for (_, opened) in join_indexed(join_set).await? {
            match opened {
                Ok(source) => {
                    debug!("Opened {}", source.path.display());
                    self.sources.push(source);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn check_table_names(&self) -> Result<()> {
        let mut seen: HashMap<&str, &PathBuf> = HashMap::new();
        for source in &self.sources {
            if source.table_name.is_empty() {
                return Err(CsvqlError::Validation(format!(
                    "cannot derive a table name from {}",
                    source.path.display()
                )));
            }
            if source.table_name == CATALOG_TABLE {
                return Err(CsvqlError::Validation(format!(
                    "{} maps to the reserved table name {}",
                    source.path.display(),
                    CATALOG_TABLE
                )));
            }
            if let Some(previous) = seen.insert(&source.table_name, &source.path) {
                return Err(CsvqlError::Validation(format!(
                    "files {} and {} both map to table {}",
                    previous.display(),
                    source.path.display(),
                    source.table_name
                )));
            }
        }
        Ok(())
    }

    async fn count_files(&mut self) -> Result<()> {
        let mut join_set = JoinSet::new();
        for (idx, source) in self.sources.iter().enumerate() {
            let path = source.path.clone();
            join_set.spawn_blocking(move || (idx, count_lines(&path)));
        }

        let mut first_error = None;
        let mut total = 0u64;
        for (idx, counted) in join_indexed(join_set).await? {
            match counted {
                Ok(lines) => {
                    self.sources[idx].total_lines = lines;
                    total += lines;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        self.total_lines = match self.options.row_limit {
            Some(limit) if limit < total => limit,
            _ => total,
        };
        debug!("Counted {} line(s), progress sized to {}", total, self.total_lines);
        Ok(())
    }

    async fn load_files(&mut self) -> Result<Vec<TableLoad>> {
        let budget = Arc::new(RowBudget::new(self.options.row_limit));
        let mut join_set = JoinSet::new();

        for (idx, mut source) in std::mem::take(&mut self.sources).into_iter().enumerate() {
            let storage = Arc::clone(&self.storage);
            let progress = Arc::clone(&self.progress);
            let budget = Arc::clone(&budget);
            let load_lock = Arc::clone(&self.load_lock);

            join_set.spawn(
                async move {
                    let guard = load_lock.lock_owned().await;
                    let loaded = tokio::task::spawn_blocking(move || {
                        let _guard = guard;
                        let result =
                            load_source(&*storage, &progress, &budget, &mut source);
                        (source, result)
                    })
                    .await;
                    (idx, loaded)
                }
                .in_current_span(),
            );
        }

        let mut units = Vec::with_capacity(join_set.len());
        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, Ok((source, result)))) => units.push((idx, source, result)),
                Ok((_, Err(e))) | Err(e) => {
                    first_error.get_or_insert(unit_failure(e));
                }
            }
        }
        units.sort_by_key(|(idx, _, _)| *idx);

        let mut tables = Vec::with_capacity(units.len());
        for (_, source, result) in units {
            match result {
                Ok(table) => tables.push(table),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
            self.sources.push(source);
        }

        first_error.map_or(Ok(tables), Err)
    }

    /// Releases every file handle and the storage. Safe to call twice.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for source in &mut self.sources {
            source.close();
        }
        if let Err(e) = self.storage.close() {
            warn!("Failed to close storage: {}", e);
        }
    }
}

impl<S: Storage + 'static> Drop for IngestionCoordinator<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Schema then rows for one file, under the caller's load lock
fn load_source<S: Storage>(
    storage: &S,
    progress: &ProgressTracker,
    budget: &RowBudget,
    source: &mut SourceFile,
) -> Result<TableLoad> {
    let handle = source
        .take_handle()
        .ok_or_else(|| CsvqlError::schema(&source.table_name, "file is not open"))?;
    let mut reader = csv_reader(&handle, source.delimiter);

    debug!("Loading {} into {}", source.path.display(), source.table_name);
    let outcome = match SchemaBuilder::new(storage).build(&source.table_name, &mut reader) {
        Ok(columns) => {
            source.columns = columns;
            RowIngestor::new(storage, progress, budget).ingest(
                &source.table_name,
                &source.columns,
                &mut reader,
            )
        }
        Err(e) => Err(e),
    };

    drop(reader);
    source.restore_handle(handle);

    let rows = outcome?;
    source.current_line = rows;
    debug!("Loaded {} row(s) into {}", rows, source.table_name);

    Ok(TableLoad {
        table_name: source.table_name.clone(),
        path: source.path.clone(),
        columns: source.columns.clone(),
        rows,
    })
}

/// Drains a phase, ordering unit results by input position
async fn join_indexed<T: 'static>(mut join_set: JoinSet<(usize, T)>) -> Result<Vec<(usize, T)>> {
    let mut results = Vec::with_capacity(join_set.len());
    let mut failure = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => {
                failure.get_or_insert(unit_failure(e));
            }
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    results.sort_by_key(|(idx, _)| *idx);
    Ok(results)
}

fn unit_failure(e: JoinError) -> CsvqlError {
    CsvqlError::Unit(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{collect_rows, RowStream, SqliteStorage};
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct WriterLog {
        current_table: Option<String>,
        inserts: u64,
        interleaved: u64,
    }

    /// Records which table is being written and flags inserts that land in
    /// any other table than the one whose structure was built last
    #[derive(Default)]
    struct RecordingStorage {
        log: std::sync::Mutex<WriterLog>,
    }

    impl Storage for RecordingStorage {
        fn build_structure(&self, table_name: &str, _columns: &[String]) -> Result<()> {
            self.log.lock().unwrap().current_table = Some(table_name.to_string());
            Ok(())
        }

        fn insert_row(&self, table_name: &str, _columns: &[String], _values: &[String]) -> Result<()> {
            {
                let mut log = self.log.lock().unwrap();
                log.inserts += 1;
                if log.current_table.as_deref() != Some(table_name) {
                    log.interleaved += 1;
                }
            }
            std::thread::yield_now();
            Ok(())
        }

        fn query<T, F>(&self, _statement: &str, _consume: F) -> Result<T>
        where
            F: FnOnce(&mut dyn RowStream) -> Result<T>,
        {
            Err(CsvqlError::Query("not supported".to_string()))
        }

        fn show_tables<T, F>(&self, _consume: F) -> Result<T>
        where
            F: FnOnce(&mut dyn RowStream) -> Result<T>,
        {
            Err(CsvqlError::Query("not supported".to_string()))
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn coordinator(options: IngestionOptions) -> IngestionCoordinator<SqliteStorage> {
        IngestionCoordinator::new(
            Arc::new(SqliteStorage::in_memory().unwrap()),
            Arc::new(ProgressTracker::hidden()),
            options,
        )
    }

    fn count(storage: &SqliteStorage, table: &str) -> u64 {
        let rows = storage
            .query(&format!("select count(1) from {}", table), |rows| collect_rows(rows))
            .unwrap();
        rows[0][0].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_imports_each_file_into_its_own_table() {
        let temp_dir = TempDir::new().unwrap();
        let users = write(temp_dir.path(), "Users.csv", "id,name\n1,ana\n2,bia\n");
        let orders = write(temp_dir.path(), "orders.csv", "order,user,total\n10,1,9.5\n");

        let mut coordinator = coordinator(IngestionOptions::new(vec![users.clone(), orders]));
        let report = coordinator.import().await.unwrap();

        assert_eq!(report.total_lines, 5);
        assert_eq!(report.rows_ingested(), 3);
        assert_eq!(report.tables[0].table_name, "users");
        assert_eq!(report.tables[0].path, users);
        assert_eq!(report.tables[1].columns, vec!["order", "user", "total"]);

        let storage = coordinator.storage();
        assert_eq!(count(storage, "users"), 2);
        assert_eq!(count(storage, "orders"), 1);
        assert_eq!(storage.catalog().unwrap().len(), 2);
        assert_eq!(coordinator.progress().position(), 3);
        assert!(coordinator.sources().iter().all(|s| s.is_open()));
    }

    #[tokio::test]
    async fn test_row_limit_is_shared_by_the_run() {
        let temp_dir = TempDir::new().unwrap();
        let a = write(temp_dir.path(), "a.csv", "v\n1\n2\n3\n");
        let b = write(temp_dir.path(), "b.csv", "v\n4\n5\n6\n");

        let mut coordinator =
            coordinator(IngestionOptions::new(vec![a, b]).with_row_limit(Some(4)));
        let report = coordinator.import().await.unwrap();

        assert_eq!(coordinator.lines(), 4);
        assert_eq!(report.rows_ingested(), 4);
        let storage = coordinator.storage();
        assert_eq!(count(storage, "a") + count(storage, "b"), 4);
    }

    #[tokio::test]
    async fn test_missing_file_fails_in_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let present = write(temp_dir.path(), "present.csv", "v\n1\n");
        let first_missing = temp_dir.path().join("first.csv");
        let second_missing = temp_dir.path().join("second.csv");

        let mut coordinator = coordinator(IngestionOptions::new(vec![
            present,
            first_missing.clone(),
            second_missing,
        ]));
        match coordinator.import().await.unwrap_err() {
            CsvqlError::Open { path, .. } => assert_eq!(path, first_missing),
            other => panic!("unexpected error: {other}"),
        }
        assert!(coordinator.storage().catalog().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_table_names_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let upper = write(temp_dir.path(), "Data.csv", "v\n1\n");
        fs::create_dir(temp_dir.path().join("other")).unwrap();
        let lower = write(&temp_dir.path().join("other"), "data.tsv", "v\n1\n");

        let mut coordinator = coordinator(IngestionOptions::new(vec![upper, lower]));
        let err = coordinator.import().await.unwrap_err();
        assert!(matches!(err, CsvqlError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_file_writes_at_a_time() {
        let temp_dir = TempDir::new().unwrap();
        let body: String = (0..1500).map(|i| format!("{},{}\n", i, i * 2)).collect();
        let files: Vec<PathBuf> = ["w", "x", "y", "z"]
            .iter()
            .map(|name| write(temp_dir.path(), &format!("{}.csv", name), &format!("a,b\n{}", body)))
            .collect();

        let storage = Arc::new(RecordingStorage::default());
        let mut coordinator = IngestionCoordinator::new(
            Arc::clone(&storage),
            Arc::new(ProgressTracker::hidden()),
            IngestionOptions::new(files),
        );
        let report = coordinator.import().await.unwrap();
        assert_eq!(report.rows_ingested(), 6000);

        let log = storage.log.lock().unwrap();
        assert_eq!(log.inserts, 6000);
        assert_eq!(log.interleaved, 0);
    }

    #[tokio::test]
    async fn test_catalog_name_is_reserved() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "Tables.csv", "v\n1\n");

        let mut coordinator = coordinator(IngestionOptions::new(vec![path]));
        let err = coordinator.import().await.unwrap_err();
        assert!(matches!(err, CsvqlError::Validation(_)));
    }

    #[tokio::test]
    async fn test_failing_file_keeps_sibling_and_partial_tables() {
        let temp_dir = TempDir::new().unwrap();
        let good = write(temp_dir.path(), "good.csv", "a;b\n1;2\n3;4\n");
        let bad = write(temp_dir.path(), "bad.csv", "a;b\n1;2\n3\n");

        let mut coordinator =
            coordinator(IngestionOptions::new(vec![good, bad]).with_delimiter(b';'));
        match coordinator.import().await.unwrap_err() {
            CsvqlError::Row { table, row, .. } => {
                assert_eq!(table, "bad");
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let storage = coordinator.storage();
        assert_eq!(count(storage, "good"), 2);
        assert_eq!(count(storage, "bad"), 1);
        let rows = storage
            .query("select b from good where a = '3'", |rows| collect_rows(rows))
            .unwrap();
        assert_eq!(rows, vec![vec![json!("4")]]);
    }

    #[tokio::test]
    async fn test_close_releases_everything_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "t.csv", "v\n1\n");

        let mut coordinator = coordinator(IngestionOptions::new(vec![path]));
        coordinator.import().await.unwrap();
        coordinator.close();
        coordinator.close();

        assert!(coordinator.sources().iter().all(|s| !s.is_open()));
        assert!(matches!(
            coordinator.storage().catalog(),
            Err(CsvqlError::StorageClosed)
        ));
        assert!(matches!(
            coordinator.import().await,
            Err(CsvqlError::StorageClosed)
        ));
    }
}
