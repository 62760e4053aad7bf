// Tests for database functionality

use sitemapwalk_core::data::{Database, SqliteSink};
use sitemapwalk_core::error::SinkError;
use sitemapwalk_core::sink::{RunStatus, UrlSink};
use sitemapwalk_scanner::UrlRecord;
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn record(location: &str, lastmod: Option<&str>) -> UrlRecord {
    UrlRecord {
        location: location.to_string(),
        lastmod: lastmod.map(str::to_string),
    }
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_reopening_keeps_schema_and_rows() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let run_id = {
        let db = Database::new(&db_path).unwrap();
        db.create_run("sitemaps.xml").unwrap()
    };

    let db = Database::new(&db_path).unwrap();
    assert!(db.get_run(&run_id).unwrap().is_some());
}

// ============================================================================
// Run Tests
// ============================================================================

#[test]
fn test_create_run() {
    let (_temp_dir, db) = create_test_db();

    let run_id = db.create_run("sitemaps.xml").unwrap();
    let run = db.get_run(&run_id).unwrap().unwrap();

    assert_eq!(run.input, "sitemaps.xml");
    assert_eq!(run.status, "running");
    assert!(run.end_time.is_none());
    assert_eq!(run.url_count, 0);
}

#[test]
fn test_finish_run() {
    let (_temp_dir, db) = create_test_db();

    let run_id = db.create_run("sitemaps.xml").unwrap();
    db.finish_run(&run_id, RunStatus::Cancelled, 7).unwrap();

    let run = db.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, "cancelled");
    assert!(run.end_time.is_some());
    assert_eq!(run.url_count, 7);
}

#[test]
fn test_get_unknown_run() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.get_run("no-such-run").unwrap().is_none());
}

#[test]
fn test_list_runs() {
    let (_temp_dir, db) = create_test_db();

    let first = db.create_run("a.xml").unwrap();
    let second = db.create_run("b.xml").unwrap();
    assert_ne!(first, second);

    let runs = db.list_runs().unwrap();
    assert_eq!(runs.len(), 2);
}

// ============================================================================
// URL Storage Tests
// ============================================================================

#[test]
fn test_urls_come_back_in_delivery_order() {
    let (_temp_dir, db) = create_test_db();
    let run_id = db.create_run("sitemaps.xml").unwrap();

    db.insert_url(&run_id, 0, &record("https://example.com/b", None))
        .unwrap();
    db.insert_url(&run_id, 1, &record("https://example.com/a", Some("2021-01-01")))
        .unwrap();

    let urls = db.get_urls(&run_id).unwrap();
    assert_eq!(
        urls,
        vec![
            record("https://example.com/b", None),
            record("https://example.com/a", Some("2021-01-01"))
        ]
    );
    assert_eq!(db.count_urls(&run_id).unwrap(), 2);
}

#[test]
fn test_duplicate_locations_are_kept() {
    let (_temp_dir, db) = create_test_db();
    let run_id = db.create_run("sitemaps.xml").unwrap();

    db.insert_url(&run_id, 0, &record("https://example.com/a", None))
        .unwrap();
    db.insert_url(&run_id, 1, &record("https://example.com/a", None))
        .unwrap();

    assert_eq!(db.count_urls(&run_id).unwrap(), 2);
}

#[test]
fn test_urls_are_scoped_to_their_run() {
    let (_temp_dir, db) = create_test_db();
    let run_a = db.create_run("a.xml").unwrap();
    let run_b = db.create_run("b.xml").unwrap();

    db.insert_url(&run_a, 0, &record("https://example.com/a", None))
        .unwrap();

    assert_eq!(db.count_urls(&run_a).unwrap(), 1);
    assert_eq!(db.count_urls(&run_b).unwrap(), 0);
}

#[test]
fn test_insert_url_for_unknown_run_fails() {
    let (_temp_dir, db) = create_test_db();
    let result = db.insert_url("no-such-run", 0, &record("https://example.com/a", None));
    assert!(result.is_err());
}

// ============================================================================
// SQLite Sink Tests
// ============================================================================

#[test]
fn test_sqlite_sink_records_run() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let mut sink = SqliteSink::new(Database::new(&db_path).unwrap(), "sitemaps.xml").unwrap();
    let run_id = sink.run_id().unwrap().to_string();

    sink.write(&record("https://example.com/a", None)).unwrap();
    sink.write(&record("https://example.com/b", Some("2021-02-03")))
        .unwrap();
    sink.finish(RunStatus::Completed).unwrap();
    assert_eq!(sink.written(), 2);

    let db = sink.database();
    let run = db.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, "completed");
    assert_eq!(run.url_count, 2);
    assert_eq!(db.get_urls(&run_id).unwrap().len(), 2);
}

#[test]
fn test_sqlite_sink_custom_statement_with_lastmod() {
    let (_temp_dir, db) = create_test_db();
    db.connection()
        .execute_batch("CREATE TABLE pages (loc TEXT NOT NULL, modified TEXT);")
        .unwrap();

    let mut sink =
        SqliteSink::with_statement(db, "INSERT INTO pages (loc, modified) VALUES (?1, ?2);")
            .unwrap();
    assert!(sink.run_id().is_none());

    sink.write(&record("https://example.com/a", Some("2021-02-03")))
        .unwrap();
    sink.write(&record("https://example.com/b", None)).unwrap();
    sink.finish(RunStatus::Completed).unwrap();

    let conn = sink.database().connection();
    let mut stmt = conn
        .prepare("SELECT loc, modified FROM pages ORDER BY rowid")
        .unwrap();
    let rows: Vec<(String, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            ("https://example.com/a".to_string(), Some("2021-02-03".to_string())),
            ("https://example.com/b".to_string(), None)
        ]
    );
}

#[test]
fn test_sqlite_sink_custom_statement_location_only() {
    let (_temp_dir, db) = create_test_db();
    db.connection()
        .execute_batch("CREATE TABLE pages (loc TEXT NOT NULL);")
        .unwrap();

    let mut sink = SqliteSink::with_statement(db, "INSERT INTO pages (loc) VALUES (?1)").unwrap();
    sink.write(&record("https://example.com/a", Some("ignored")))
        .unwrap();

    let count: i64 = sink
        .database()
        .connection()
        .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_sqlite_sink_rejects_statement_without_parameters() {
    let (_temp_dir, db) = create_test_db();
    let result = SqliteSink::with_statement(db, "DELETE FROM urls");
    assert!(matches!(result, Err(SinkError::Statement(_))));
}

#[test]
fn test_sqlite_sink_rejects_invalid_sql() {
    let (_temp_dir, db) = create_test_db();
    let result = SqliteSink::with_statement(db, "INSERT INTO nowhere VALUES (?1)");
    assert!(matches!(result, Err(SinkError::Database(_))));
}
