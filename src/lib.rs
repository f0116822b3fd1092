//! LogLens: a viewer for tab-aligned device logs split into Trace,
//! Messages and OTA tables, with cross-table sync and persistent bookmarks.

pub mod app;
pub mod bookmarks;
pub mod config;
pub mod correlate;
pub mod error;
pub mod loader;
pub mod parser;
pub mod record;
pub mod search;
pub mod session;
pub mod store;
pub mod viewport;

pub use app::LogViewer;
pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use loader::{LoadEvent, LoadOutcome, LoadSource, LoadStatus, Loader};
pub use record::{Category, Record};
pub use session::Session;
pub use store::RecordStore;
