//! Background loading of a log file into a [`RecordStore`].
//!
//! A load runs on its own coordinator thread. The coordinator reads the file,
//! takes line 0 as the header and deals the data lines out in fixed-size
//! batches to parser workers over bounded channels. Workers answer on a shared
//! channel; answers are put back into batch order before they are appended,
//! so every category keeps file order regardless of how many workers run.
//!
//! The UI side holds a [`Loader`] and drains [`LoadEvent`]s once per frame.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use memmap2::Mmap;

use crate::config::{READ_PROGRESS_SHARE, ViewerConfig, WORKER_QUEUE_DEPTH};
use crate::error::{Result, ViewerError};
use crate::parser::split_fields;
use crate::record::{Category, Record, classify};
use crate::store::RecordStore;

const CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub enum LoadSource {
    Path(PathBuf),
    /// Content dropped without a usable path.
    Text(String),
}

impl LoadSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            LoadSource::Path(p) => Some(p),
            LoadSource::Text(_) => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            LoadSource::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            LoadSource::Text(_) => "dropped content".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub store: RecordStore,
    pub elapsed: Duration,
    pub source_path: Option<PathBuf>,
}

impl LoadOutcome {
    pub fn status(&self) -> String {
        let counts = self.store.counts();
        format!(
            "Loaded: Messages {}, OTA {}, Trace {} records in {:.3}s",
            counts.messages,
            counts.ota,
            counts.trace,
            self.elapsed.as_secs_f64()
        )
    }
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded(LoadOutcome),
    Empty,
    Cancelled,
}

#[derive(Debug)]
pub enum LoadEvent {
    /// Percentage in `0.0..=100.0`.
    Progress(f32),
    Finished(Box<LoadOutcome>),
    Empty,
    Failed(String),
}

/// UI-side handle on the load in flight, if any.
#[derive(Default)]
pub struct Loader {
    receiver: Option<mpsc::Receiver<LoadEvent>>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts loading `source`, cancelling whatever load is still running.
    pub fn start(&mut self, source: LoadSource, config: &ViewerConfig) {
        self.cancel();

        let (sender, receiver) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        self.receiver = Some(receiver);
        self.cancel_flag = Some(Arc::clone(&cancel));

        let config = config.clone();
        log::info!("loading {}", source.label());

        thread::spawn(move || {
            let guard = sender.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run_load(source, config, cancel, sender);
            }));
            if result.is_err() {
                log::error!("load thread panicked");
                let _ = guard.send(LoadEvent::Failed(ViewerError::WorkerFault.load_status()));
            }
        });
    }

    /// Abandons the current load. Events it may still produce are never seen.
    pub fn cancel(&mut self) {
        if let Some(flag) = self.cancel_flag.take() {
            flag.store(true, Ordering::SeqCst);
            log::debug!("cancelled in-flight load");
        }
        self.receiver = None;
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    /// Drains pending events. The handle goes idle after a terminal event.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        let Some(receiver) = &self.receiver else {
            return events;
        };

        let mut done = false;
        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    let terminal = !matches!(event, LoadEvent::Progress(_));
                    events.push(event);
                    if terminal {
                        done = true;
                        break;
                    }
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    // Cancelled loads exit without a terminal event.
                    done = true;
                    break;
                }
            }
        }

        if done {
            self.receiver = None;
            self.cancel_flag = None;
        }
        events
    }
}

fn run_load(
    source: LoadSource,
    config: ViewerConfig,
    cancel: Arc<AtomicBool>,
    sender: mpsc::Sender<LoadEvent>,
) {
    let mut report = |pct: f32| {
        let _ = sender.send(LoadEvent::Progress(pct));
    };

    let event = match load(&source, &config, &cancel, &mut report) {
        Ok(LoadStatus::Loaded(outcome)) => {
            log::info!("{}", outcome.status());
            LoadEvent::Finished(Box::new(outcome))
        }
        Ok(LoadStatus::Empty) => {
            log::info!("{} has no content", source.label());
            LoadEvent::Empty
        }
        Ok(LoadStatus::Cancelled) => return,
        Err(e) => {
            log::error!("loading {} failed: {}", source.label(), e);
            LoadEvent::Failed(e.load_status())
        }
    };
    let _ = sender.send(event);
}

/// Reads and parses `source` on the calling thread. `progress` receives
/// percentages as work completes.
pub fn load(
    source: &LoadSource,
    config: &ViewerConfig,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(f32),
) -> Result<LoadStatus> {
    let start = Instant::now();
    progress(0.0);

    let lines = match source {
        LoadSource::Path(path) => read_lines(path)?,
        LoadSource::Text(text) => non_blank_lines(text.as_bytes()),
    };
    progress(READ_PROGRESS_SHARE);
    log::debug!("{} non-blank lines read", lines.len());

    if lines.is_empty() {
        return Ok(LoadStatus::Empty);
    }

    let Some(store) = parse_lines(lines, config, cancel, progress)? else {
        return Ok(LoadStatus::Cancelled);
    };

    Ok(LoadStatus::Loaded(LoadOutcome {
        store,
        elapsed: start.elapsed(),
        source_path: source.path().map(Path::to_path_buf),
    }))
}

pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }

    // The map is only read while this function holds it.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| ViewerError::Map {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(non_blank_lines(&mmap))
}

/// Start offset of every line plus the end of the buffer.
fn line_offsets(bytes: &[u8]) -> Vec<usize> {
    let mut offsets = vec![0];

    let mut chunk_start = 0;
    while chunk_start < bytes.len() {
        let chunk_end = std::cmp::min(chunk_start + CHUNK_SIZE, bytes.len());
        for nl in memchr::memchr_iter(b'\n', &bytes[chunk_start..chunk_end]) {
            offsets.push(chunk_start + nl + 1);
        }
        chunk_start = chunk_end;
    }

    if offsets.last().is_none_or(|&off| off < bytes.len()) {
        offsets.push(bytes.len());
    }
    offsets
}

/// Lines with surrounding whitespace removed; blank lines are dropped.
pub fn non_blank_lines(bytes: &[u8]) -> Vec<String> {
    line_offsets(bytes)
        .windows(2)
        .filter_map(|w| {
            let line = String::from_utf8_lossy(&bytes[w[0]..w[1]]);
            let trimmed = line.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

struct Batch {
    seq: usize,
    first_sequence: usize,
    lines: Vec<String>,
}

struct ParsedBatch {
    seq: usize,
    records: Vec<(Category, Record)>,
}

/// Parses `lines` (header first). Returns `None` when cancelled.
pub fn parse_lines(
    mut lines: Vec<String>,
    config: &ViewerConfig,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(f32),
) -> Result<Option<RecordStore>> {
    let mut store = RecordStore::new();
    if lines.is_empty() {
        return Ok(Some(store));
    }

    let data = lines.split_off(1);
    let header = split_fields(&lines[0]);
    store.set_file_headers(&header);

    let total = data.len();
    if total == 0 {
        progress(100.0);
        return Ok(Some(store));
    }

    let batch_size = config.batch_size.max(1);
    let workers = config.workers.max(1).min(total.div_ceil(batch_size));

    let (reply_tx, reply_rx) = mpsc::channel::<ParsedBatch>();
    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let (tx, rx) = mpsc::sync_channel::<Batch>(WORKER_QUEUE_DEPTH);
        let reply = reply_tx.clone();
        let handle = thread::Builder::new()
            .name(format!("parse-worker-{id}"))
            .spawn(move || parse_worker(rx, reply))?;
        senders.push(tx);
        handles.push(handle);
    }
    drop(reply_tx);

    let mut collector = Collector {
        pending: BTreeMap::new(),
        next_seq: 0,
        processed: 0,
        total,
        store,
    };

    let mut data = data.into_iter();
    let mut seq = 0;
    let mut first_sequence = 1;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let lines: Vec<String> = data.by_ref().take(batch_size).collect();
        if lines.is_empty() {
            break;
        }
        let len = lines.len();
        let batch = Batch {
            seq,
            first_sequence,
            lines,
        };
        senders[seq % workers]
            .send(batch)
            .map_err(|_| ViewerError::WorkerFault)?;
        log::trace!("dispatched batch {seq} ({len} lines)");
        seq += 1;
        first_sequence += len;

        while let Ok(parsed) = reply_rx.try_recv() {
            collector.accept(parsed, progress);
        }
    }
    drop(senders);

    let batches = seq;
    while collector.next_seq < batches {
        if cancel.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match reply_rx.recv() {
            Ok(parsed) => collector.accept(parsed, progress),
            Err(_) => return Err(ViewerError::WorkerFault),
        }
    }

    for handle in handles {
        if handle.join().is_err() {
            return Err(ViewerError::WorkerFault);
        }
    }

    Ok(Some(collector.store))
}

fn parse_worker(rx: mpsc::Receiver<Batch>, reply: mpsc::Sender<ParsedBatch>) {
    while let Ok(batch) = rx.recv() {
        let records = batch
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let fields = split_fields(line);
                let category = classify(&fields);
                (category, Record::new(fields, batch.first_sequence + i))
            })
            .collect();

        if reply
            .send(ParsedBatch {
                seq: batch.seq,
                records,
            })
            .is_err()
        {
            break;
        }
    }
}

struct Collector {
    pending: BTreeMap<usize, ParsedBatch>,
    next_seq: usize,
    processed: usize,
    total: usize,
    store: RecordStore,
}

impl Collector {
    fn accept(&mut self, parsed: ParsedBatch, progress: &mut dyn FnMut(f32)) {
        self.pending.insert(parsed.seq, parsed);

        while let Some(batch) = self.pending.remove(&self.next_seq) {
            self.processed += batch.records.len();
            for (category, record) in batch.records {
                self.store.push(category, record);
            }
            self.next_seq += 1;

            let share = 100.0 - READ_PROGRESS_SHARE;
            progress(READ_PROGRESS_SHARE + share * self.processed as f32 / self.total as f32);
        }
    }
}
