pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod presenter;
pub mod progress;
pub mod repl;
pub mod storage;

pub use app::Csvql;
pub use config::Params;
pub use error::{CsvqlError, Result};
pub use export::{new_export, Export, ExportKind, ExportSummary, Exporter};
pub use ingestion::{IngestionCoordinator, IngestionOptions, IngestionReport};
pub use presenter::print_result;
pub use progress::ProgressTracker;
pub use storage::{RowStream, SqliteStorage, Storage};
