//! Catalog - metadata table recording every data table created by a run

pub const CATALOG_TABLE: &str = "tables";

pub(crate) const SQL_CREATE_CATALOG: &str = r#"
    CREATE TABLE IF NOT EXISTS tables (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        columns TEXT NOT NULL,
        total_columns INTEGER NOT NULL
    )
"#;

pub(crate) const SQL_INSERT_CATALOG: &str =
    "INSERT INTO tables (name, columns, total_columns) VALUES (?1, ?2, ?3)";

pub(crate) const SQL_SHOW_TABLES: &str =
    "SELECT id, name, columns, total_columns FROM tables ORDER BY id";

/// One catalog row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    /// Column list, stored as a JSON array in the catalog
    pub columns: Vec<String>,
    pub total_columns: i64,
}
