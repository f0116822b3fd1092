// End-to-end loading through the background loader.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use loglens::{Category, LoadEvent, LoadOutcome, LoadSource, Loader, ViewerConfig};
use tempfile::TempDir;

const HEADER: &str = "Index   LogID   Level   Module   SFN   Time   Context";

fn write_log(dir: &TempDir, name: &str, lines: &[String]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Polls until a terminal event arrives. Returns every event seen.
fn drain(loader: &mut Loader) -> Vec<LoadEvent> {
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut events = Vec::new();
    while loader.is_running() {
        assert!(Instant::now() < deadline, "load did not finish in time");
        events.extend(loader.poll());
        thread::sleep(Duration::from_millis(5));
    }
    events
}

fn finished(events: Vec<LoadEvent>) -> LoadOutcome {
    for event in events {
        if let LoadEvent::Finished(outcome) = event {
            return *outcome;
        }
    }
    panic!("no Finished event");
}

fn load_path(path: &Path, config: &ViewerConfig) -> Vec<LoadEvent> {
    let mut loader = Loader::new();
    loader.start(LoadSource::Path(path.to_path_buf()), config);
    drain(&mut loader)
}

#[test]
fn test_three_line_file_is_partitioned() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        "device.log",
        &[
            HEADER.to_string(),
            "1   1   INFO   RRC   10   00:00:01   first".to_string(),
            "2   2   INFO   MAC   11   00:00:02   second".to_string(),
            "3   9   WARN   PHY   12   00:00:03   third".to_string(),
        ],
    );

    let events = load_path(&path, &ViewerConfig::default());
    assert!(
        events.iter().any(|e| matches!(e, LoadEvent::Progress(p) if *p >= 40.0)),
        "read progress not reported"
    );

    let outcome = finished(events);
    let store = &outcome.store;
    let idx = |c: Category| -> Vec<Option<i64>> {
        store.records(c).iter().map(|r| r.stable_index).collect()
    };
    assert_eq!(idx(Category::Messages), vec![Some(1)]);
    assert_eq!(idx(Category::Ota), vec![Some(2)]);
    assert_eq!(idx(Category::Trace), vec![Some(3)]);
    assert_eq!(store.counts().total(), 3);
    assert_eq!(outcome.source_path.as_deref(), Some(path.as_path()));
    assert!(outcome.status().starts_with("Loaded: Messages 1, OTA 1, Trace 1 records in "));
}

#[test]
fn test_large_file_keeps_file_order_across_workers() {
    let dir = TempDir::new().unwrap();
    let mut lines = vec![HEADER.to_string()];
    for i in 1..=5000 {
        lines.push(format!("{i}   {}   INFO   MOD   0   t   line {i}", i % 5));
    }
    let path = write_log(&dir, "big.log", &lines);

    let config = ViewerConfig::default().with_workers(4).with_batch_size(1000);
    let outcome = finished(load_path(&path, &config));

    assert_eq!(outcome.store.counts().total(), 5000);
    let ota: Vec<i64> = outcome
        .store
        .records(Category::Ota)
        .iter()
        .filter_map(|r| r.stable_index)
        .collect();
    assert_eq!(ota.len(), 3000);
    assert!(ota.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_empty_file_reports_empty() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "empty.log", &[]);

    let events = load_path(&path, &ViewerConfig::default());
    assert!(events.iter().any(|e| matches!(e, LoadEvent::Empty)));
    assert!(!events.iter().any(|e| matches!(e, LoadEvent::Finished(_))));
}

#[test]
fn test_missing_file_fails_with_read_error() {
    let dir = TempDir::new().unwrap();
    let events = load_path(&dir.path().join("absent.log"), &ViewerConfig::default());

    let failure = events.iter().find_map(|e| match e {
        LoadEvent::Failed(msg) => Some(msg.clone()),
        _ => None,
    });
    assert!(failure.unwrap().starts_with("Failed to read file: "));
}

#[test]
fn test_dropped_text_loads_without_a_path() {
    let text = format!("{HEADER}\n\n7   1   x\n   \n8   3   y\n");
    let mut loader = Loader::new();
    loader.start(LoadSource::Text(text), &ViewerConfig::default());

    let outcome = finished(drain(&mut loader));
    assert!(outcome.source_path.is_none());
    assert_eq!(outcome.store.records(Category::Messages).len(), 1);
    assert_eq!(outcome.store.records(Category::Ota).len(), 1);
}

#[test]
fn test_new_load_supersedes_the_running_one() {
    let dir = TempDir::new().unwrap();
    let mut lines = vec![HEADER.to_string()];
    for i in 1..=20_000 {
        lines.push(format!("{i}   9   INFO   MOD   0   t   filler"));
    }
    let first = write_log(&dir, "first.log", &lines);
    let second = write_log(
        &dir,
        "second.log",
        &[HEADER.to_string(), "1   1   a".to_string()],
    );

    let config = ViewerConfig::default();
    let mut loader = Loader::new();
    loader.start(LoadSource::Path(first), &config);
    loader.start(LoadSource::Path(second.clone()), &config);

    let events = drain(&mut loader);
    let finished_count = events
        .iter()
        .filter(|e| matches!(e, LoadEvent::Finished(_)))
        .count();
    assert_eq!(finished_count, 1);

    let outcome = finished(events);
    assert_eq!(outcome.source_path.as_deref(), Some(second.as_path()));
    assert_eq!(outcome.store.counts().total(), 1);
}

#[test]
fn test_cancel_leaves_loader_idle() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, "a.log", &[HEADER.to_string(), "1   1   a".to_string()]);

    let mut loader = Loader::new();
    loader.start(LoadSource::Path(path), &ViewerConfig::default());
    loader.cancel();

    assert!(!loader.is_running());
    assert!(loader.poll().is_empty());
}
