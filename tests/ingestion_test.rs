use csvql::ingestion::{IngestionCoordinator, IngestionOptions};
use csvql::storage::collect_rows;
use csvql::{CsvqlError, ProgressTracker, SqliteStorage, Storage};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Writes a CSV fixture with `rows` data rows under `header`
fn write_csv(dir: &Path, name: &str, header: &[&str], rows: usize) -> PathBuf {
    let mut content = header.join(",");
    content.push('\n');
    for i in 0..rows {
        let row: Vec<String> = header.iter().map(|col| format!("{}_{}", col, i)).collect();
        content.push_str(&row.join(","));
        content.push('\n');
    }
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

fn select(storage: &SqliteStorage, sql: &str) -> (Vec<String>, Vec<Vec<Value>>) {
    storage
        .query(sql, |rows| {
            let columns = rows.columns().to_vec();
            Ok((columns, collect_rows(rows)?))
        })
        .unwrap()
}

#[tokio::test]
async fn test_loads_every_row_with_header_order() {
    let temp_dir = TempDir::new().unwrap();
    let header = ["zeta", "alpha", "Mid Column"];
    let path = write_csv(temp_dir.path(), "ordered.csv", &header, 250);

    let mut coordinator = coordinator(IngestionOptions::new(vec![path]));
    let report = coordinator.import().await.unwrap();
    assert_eq!(report.rows_ingested(), 250);
    assert_eq!(report.total_lines, 251);

    let (columns, rows) = select(coordinator.storage(), "select * from ordered");
    assert_eq!(columns, vec!["zeta", "alpha", "Mid Column"]);
    assert_eq!(rows.len(), 250);
    assert_eq!(
        rows[249],
        vec![json!("zeta_249"), json!("alpha_249"), json!("Mid Column_249")]
    );
}

#[tokio::test]
async fn test_row_cap_across_files_is_exact() {
    let temp_dir = TempDir::new().unwrap();
    let files = vec![
        write_csv(temp_dir.path(), "first.csv", &["a"], 40),
        write_csv(temp_dir.path(), "second.csv", &["b"], 40),
        write_csv(temp_dir.path(), "third.csv", &["c"], 40),
    ];

    let mut coordinator = coordinator(IngestionOptions::new(files).with_row_limit(Some(55)));
    let report = coordinator.import().await.unwrap();
    assert_eq!(report.rows_ingested(), 55);
    assert_eq!(coordinator.lines(), 55);

    let (_, rows) = select(
        coordinator.storage(),
        "select (select count(1) from first) + (select count(1) from second) + (select count(1) from third)",
    );
    assert_eq!(rows, vec![vec![json!(55)]]);
}

#[tokio::test]
async fn test_row_cap_larger_than_input_loads_everything() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_csv(temp_dir.path(), "small.csv", &["a"], 3);

    let mut coordinator = coordinator(IngestionOptions::new(vec![path]).with_row_limit(Some(1000)));
    let report = coordinator.import().await.unwrap();
    assert_eq!(report.rows_ingested(), 3);
    assert_eq!(coordinator.lines(), 4);
}

#[tokio::test]
async fn test_distinct_headers_load_into_independent_tables() {
    let temp_dir = TempDir::new().unwrap();
    let users = write_csv(temp_dir.path(), "users.csv", &["id", "name"], 2);
    let events = write_csv(temp_dir.path(), "Event Log.csv", &["kind", "at", "user"], 5);

    let mut coordinator = coordinator(IngestionOptions::new(vec![users, events]));
    coordinator.import().await.unwrap();

    let storage = coordinator.storage();
    let (user_columns, user_rows) = select(storage, "select * from users");
    let (event_columns, event_rows) = select(storage, "select * from eventlog");
    assert_eq!(user_columns, vec!["id", "name"]);
    assert_eq!(user_rows.len(), 2);
    assert_eq!(event_columns, vec!["kind", "at", "user"]);
    assert_eq!(event_rows.len(), 5);

    let catalog = storage.catalog().unwrap();
    let names: Vec<&str> = catalog.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(catalog.len(), 2);
    assert!(names.contains(&"users") && names.contains(&"eventlog"));
}

#[tokio::test]
async fn test_group_by_counts_equal_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("values.csv");
    fs::write(&path, "name;kind\na;Value Test\nb;Value Test\nc;Value Test\n").unwrap();

    let mut coordinator = coordinator(IngestionOptions::new(vec![path]).with_delimiter(b';'));
    coordinator.import().await.unwrap();

    let (_, rows) = select(
        coordinator.storage(),
        "select kind, count(1) from \"values\" group by kind",
    );
    assert_eq!(rows, vec![vec![json!("Value Test"), json!(3)]]);
}

#[tokio::test]
async fn test_missing_file_fails_before_loading() {
    let temp_dir = TempDir::new().unwrap();
    let present = write_csv(temp_dir.path(), "present.csv", &["a"], 1);

    let mut coordinator = coordinator(IngestionOptions::new(vec![
        present,
        temp_dir.path().join("absent.csv"),
    ]));
    let err = coordinator.import().await.unwrap_err();
    assert!(matches!(err, CsvqlError::Open { .. }));
    assert!(err.to_string().contains("absent.csv"));
    assert!(coordinator.storage().catalog().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_file_is_a_schema_failure() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.csv");
    fs::write(&path, "").unwrap();

    let mut coordinator = coordinator(IngestionOptions::new(vec![path]));
    let err = coordinator.import().await.unwrap_err();
    assert!(matches!(err, CsvqlError::Schema { .. }));
}

#[tokio::test]
async fn test_mid_file_failure_keeps_partial_table() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.csv");
    fs::write(&path, "a,b\n1,2\n3,4\n5\n7,8\n").unwrap();

    let mut coordinator = coordinator(IngestionOptions::new(vec![path]));
    match coordinator.import().await.unwrap_err() {
        CsvqlError::Row { table, row, .. } => {
            assert_eq!(table, "broken");
            assert_eq!(row, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    let (_, rows) = select(coordinator.storage(), "select count(1) from broken");
    assert_eq!(rows, vec![vec![json!(2)]]);
}

#[tokio::test]
async fn test_file_backed_storage_survives_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_csv(temp_dir.path(), "kept.csv", &["a", "b"], 4);
    let db = temp_dir.path().join("csvql.db");
    let db_path = db.to_str().unwrap();

    {
        let mut coordinator = IngestionCoordinator::new(
            Arc::new(SqliteStorage::open(Some(db_path)).unwrap()),
            Arc::new(ProgressTracker::hidden()),
            IngestionOptions::new(vec![path]),
        );
        coordinator.import().await.unwrap();
        coordinator.close();
    }

    let reopened = SqliteStorage::open(Some(db_path)).unwrap();
    let (_, rows) = select(&reopened, "select count(1) from kept");
    assert_eq!(rows, vec![vec![json!(4)]]);
    assert_eq!(reopened.catalog().unwrap()[0].columns, vec!["a", "b"]);
}
