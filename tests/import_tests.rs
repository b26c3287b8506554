//! Integration tests for importing an archive into SQLite.

use std::path::Path;

use gmail_mbox::import::run_import;
use gmail_mbox::parser::mbox::MboxScanner;
use gmail_mbox::parser::mime::DEFAULT_MAX_DEPTH;
use gmail_mbox::store::{MessageSink, SqliteStore};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_import_fixture_into_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("out.db");

    let scanner = MboxScanner::open(fixture("takeout.mbox")).unwrap();
    let mut store = SqliteStore::open(&db_path, true).unwrap();
    let summary = run_import(&scanner, &mut store, DEFAULT_MAX_DEPTH, None).unwrap();

    assert_eq!(summary.expected, 5);
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.persisted, 3);
    assert_eq!(summary.missing(), 2);

    assert_eq!(
        store.labels("18b83caf87818401").unwrap(),
        vec!["Inbox", "Important", "Opened"]
    );
    assert_eq!(store.labels("18ccb308359f8002").unwrap(), vec![""]);
    assert_eq!(
        store.html("18ccb308359f8001").unwrap().unwrap(),
        b"<p>Hi Bob,</p>"
    );
    // Rejected at insert time: nothing stored for it.
    assert!(store.labels("18ccb308359f8004").unwrap().is_empty());
}

#[test]
fn test_reimport_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("out.db");

    for _ in 0..2 {
        let scanner = MboxScanner::open(fixture("takeout.mbox")).unwrap();
        let mut store = SqliteStore::open(&db_path, false).unwrap();
        let summary = run_import(&scanner, &mut store, DEFAULT_MAX_DEPTH, None).unwrap();
        assert_eq!(summary.persisted, 3);
    }

    let store = SqliteStore::open(&db_path, false).unwrap();
    assert_eq!(store.count().unwrap(), 3);
    assert_eq!(store.labels("18b83caf87818401").unwrap().len(), 3);
}
