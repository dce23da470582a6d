//! csvql runner - import, then query, export or prompt

use crate::config::Params;
use crate::error::Result;
use crate::export::{new_export, ExportSummary, Exporter};
use crate::ingestion::{IngestionCoordinator, IngestionReport};
use crate::presenter::print_result;
use crate::progress::ProgressTracker;
use crate::repl::{CommandPrompt, CommandSource};
use crate::storage::{SqliteStorage, Storage};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const LOADING_DESCRIPTION: &str = "[1/1] loading data...";

pub struct Csvql {
    params: Params,
    coordinator: IngestionCoordinator<SqliteStorage>,
    progress: Arc<ProgressTracker>,
    out: Box<dyn Write + Send>,
}

impl Csvql {
    pub fn new(params: Params) -> Result<Self> {
        Self::with_progress(params, ProgressTracker::new(LOADING_DESCRIPTION))
    }

    pub fn with_progress(params: Params, progress: ProgressTracker) -> Result<Self> {
        params.validate()?;

        let storage = SqliteStorage::open(params.storage.as_deref())?;
        info!("Using storage {}", storage.data_source());

        let progress = Arc::new(progress);
        let coordinator = IngestionCoordinator::new(
            Arc::new(storage),
            Arc::clone(&progress),
            params.ingestion_options(),
        );

        Ok(Self {
            params,
            coordinator,
            progress,
            out: Box::new(io::stdout()),
        })
    }

    /// Redirects tables and messages, stdout by default
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    /// Imports the files, then runs the query, the export or the prompt
    pub async fn run(&mut self) -> Result<()> {
        self.import().await?;

        if self.params.query().is_some() {
            return self.execute();
        }

        let mut prompt = CommandPrompt::new()?;
        self.repl(&mut prompt)
    }

    /// Loads every input file and prints the resulting catalog
    pub async fn import(&mut self) -> Result<IngestionReport> {
        let imported = self.coordinator.import().await;
        self.progress.clear();
        let report = imported?;

        self.coordinator
            .storage()
            .show_tables(|rows| print_result(rows, &mut self.out))?;
        Ok(report)
    }

    /// Runs the configured query, exporting it when an export path is set
    pub fn execute(&mut self) -> Result<()> {
        let Some(query) = self.params.query().map(str::to_string) else {
            return Ok(());
        };

        match (self.params.export.clone(), self.params.export_type.clone()) {
            (Some(path), Some(kind)) => self.export_query(&query, &path, &kind).map(|_| ()),
            _ => self.print_query(&query).map(|_| ()),
        }
    }

    /// Prints each command's result; a failing command does not end the session
    pub fn repl(&mut self, commands: &mut dyn CommandSource) -> Result<()> {
        while let Some(command) = commands.next_command()? {
            if let Err(e) = self.print_query(&command) {
                debug!("Query failed: {}", e);
                eprintln!("{}", e);
            }
        }
        Ok(())
    }

    pub fn print_query(&mut self, query: &str) -> Result<usize> {
        let out = &mut self.out;
        self.coordinator
            .storage()
            .query(query, |rows| print_result(rows, out))
    }

    pub fn export_query(&mut self, query: &str, path: &Path, kind: &str) -> Result<ExportSummary> {
        self.progress.reset();
        self.progress.set_max(self.coordinator.lines());

        let progress = &*self.progress;
        let exported = self
            .coordinator
            .storage()
            .query(query, |rows| new_export(kind, rows, path, progress)?.export());

        self.progress.finish();
        self.progress.clear();
        let summary = exported?;

        info!("Exported {} row(s) to {}", summary.rows, summary.path.display());
        writeln!(self.out, "[{}] file successfully exported", path.display())?;
        self.out.flush()?;
        Ok(summary)
    }

    /// Releases the input files and the storage
    pub fn close(&mut self) {
        self.coordinator.close();
    }
}
