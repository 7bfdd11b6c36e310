//! File discovery, content-hash incremental indexing, and filesystem
//! watching for one project (§4.6, §4.7).

mod discovery;
mod error;
mod indexer;
mod watcher;

pub use discovery::FileDiscovery;
pub use error::{IndexerError, Result};
pub use indexer::{FileIndexOutcome, IndexSummary, Indexer};
pub use watcher::{FileWatcher, DEFAULT_DEBOUNCE};
