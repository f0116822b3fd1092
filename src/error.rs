use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("cannot map '{path}': {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker error")]
    WorkerFault,

    #[error("bookmark file is not valid JSON: {0}")]
    BookmarkFormat(#[from] serde_json::Error),

    #[error("clipboard export failed: {0}")]
    Export(#[from] csv::Error),
}

impl ViewerError {
    /// Text for the status bar when a load ends in this error.
    pub fn load_status(&self) -> String {
        match self {
            ViewerError::WorkerFault => format!("Processing failed: {}", self),
            _ => format!("Failed to read file: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_status_distinguishes_worker_faults() {
        let io = ViewerError::Io(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        assert_eq!(io.load_status(), "Failed to read file: no such file");
        assert_eq!(
            ViewerError::WorkerFault.load_status(),
            "Processing failed: worker error"
        );
    }
}
