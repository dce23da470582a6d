//! Ingestion Module - delimited files into relational tables
//!
//! Pipeline per file: open, count lines, read the header into a table, stream
//! the rows. The coordinator runs one unit per file for every phase.

pub mod coordinator;
pub mod line_counter;
pub mod row_ingestor;
pub mod schema_builder;
pub mod source;

pub use coordinator::{IngestionCoordinator, IngestionOptions, IngestionReport, TableLoad};
pub use line_counter::count_lines;
pub use row_ingestor::{RowBudget, RowIngestor};
pub use schema_builder::SchemaBuilder;
pub use source::{table_name_for, SourceFile};
