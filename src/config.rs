use std::time::Duration;

pub const ROW_HEIGHT: f32 = 24.0;
pub const BATCH_SIZE: usize = 1000;
pub const WORKER_QUEUE_DEPTH: usize = 2;
pub const MAX_DEFAULT_WORKERS: usize = 4;
pub const MARK_FRESHNESS: Duration = Duration::from_secs(30);
pub const HIGHLIGHT_WINDOW: Duration = Duration::from_secs(30);
pub const MARK_FLASH: Duration = Duration::from_secs(10);
pub const BOOKMARK_EXTENSION: &str = "mark";

/// Share of the progress bar reserved for reading the file.
pub const READ_PROGRESS_SHARE: f32 = 40.0;

/// Tunables shared by the loader, the table and the correlator.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub row_height: f32,
    pub batch_size: usize,
    pub workers: usize,
    pub mark_freshness: Duration,
    pub highlight_window: Duration,
    pub mark_flash: Duration,
    pub bookmark_extension: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_DEFAULT_WORKERS);

        Self {
            row_height: ROW_HEIGHT,
            batch_size: BATCH_SIZE,
            workers,
            mark_freshness: MARK_FRESHNESS,
            highlight_window: HIGHLIGHT_WINDOW,
            mark_flash: MARK_FLASH,
            bookmark_extension: BOOKMARK_EXTENSION.to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}
