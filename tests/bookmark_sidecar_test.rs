// Bookmark persistence next to the log file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use loglens::bookmarks::BookmarkEntry;
use loglens::{Category, LoadStatus, LoadSource, Session, ViewerConfig};
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

fn write_fixture(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("run.log");
    let lines = [
        "Index   LogID   Level   Module   SFN   Time   Context",
        "100   9   INFO   RRC   1   t1   boot",
        "101   1   RRC   MAC   1   t2   setup",
        "102   2   RRC   PHY   2   t3   ota-msg",
        "103   9   WARN   MAC   2   t4   retry",
    ];
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn open(path: &Path) -> Session {
    let config = ViewerConfig::default().with_workers(1);
    let cancel = AtomicBool::new(false);
    let status = loglens::loader::load(
        &LoadSource::Path(path.to_path_buf()),
        &config,
        &cancel,
        &mut |_| {},
    )
    .unwrap();
    match status {
        LoadStatus::Loaded(outcome) => Session::from_outcome(outcome, config, Category::Trace),
        other => panic!("unexpected load status: {other:?}"),
    }
}

#[test]
fn test_sidecar_round_trip() {
    let dir = TempDir::new().unwrap();
    let log = write_fixture(&dir);

    let mut session = open(&log);
    assert!(session.bookmarks().is_empty());

    session.select(1, false);
    assert!(session.toggle_bookmarks().unwrap());
    session.switch_to(Category::Ota, Instant::now());
    session.select(0, false);
    assert!(session.toggle_bookmarks().unwrap());

    let sidecar = dir.path().join("run.mark");
    let saved: Vec<BookmarkEntry> =
        serde_json::from_str(&fs::read_to_string(&sidecar).unwrap()).unwrap();
    assert_eq!(
        saved,
        vec![
            BookmarkEntry { source: Category::Trace, index: 103 },
            BookmarkEntry { source: Category::Ota, index: 102 },
        ]
    );

    let reopened = open(&log);
    let restored: Vec<Option<i64>> = reopened
        .records(Category::Bookmarks)
        .iter()
        .map(|r| r.stable_index)
        .collect();
    assert_eq!(restored, vec![Some(103), Some(102)]);
}

#[test]
fn test_unresolved_entries_are_dropped_silently() {
    let dir = TempDir::new().unwrap();
    let log = write_fixture(&dir);
    fs::write(
        dir.path().join("run.mark"),
        r#"[{"sourcePageId":"messages","index":101},
            {"sourcePageId":"trace","index":9999},
            {"sourcePageId":"ota","index":100}]"#,
    )
    .unwrap();

    let session = open(&log);
    let indices: Vec<i64> = session.bookmarks().entries().iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![101]);
}

#[test]
fn test_corrupt_sidecar_does_not_block_loading() {
    let dir = TempDir::new().unwrap();
    let log = write_fixture(&dir);
    fs::write(dir.path().join("run.mark"), "{not json").unwrap();

    let session = open(&log);
    assert_eq!(session.counts().total(), 4);
    assert!(session.bookmarks().is_empty());
}

#[test]
fn test_marked_row_syncs_the_next_tab() {
    let dir = TempDir::new().unwrap();
    let mut session = open(&write_fixture(&dir));
    let t0 = Instant::now();

    // trace = [100, 103]
    assert!(session.mark(1, t0));
    assert!(session.is_flashing(1, t0));

    let pos = session.switch_to(Category::Ota, t0 + Duration::from_secs(2));
    assert_eq!(pos, Some(0));
    assert_eq!(session.take_scroll_request(), Some(0));
}
