//! Per-project persistent chunk storage (§4.5): a SQLite database under
//! the project's cache directory holding every chunk's text, embedding,
//! and position, searchable by vector similarity, full text, or both
//! fused by reciprocal rank.

mod chunk;
mod error;
mod escape;
mod fusion;
mod paths;
mod store;

pub use chunk::{decode_embedding, encode_embedding, Chunk};
pub use error::{Result, StoreError};
pub use escape::escape_sql_string;
pub use fusion::{rrf_fuse, DEFAULT_RRF_K};
pub use paths::{has_disk_cache, project_cache_dir, project_hash};
pub use store::{ChunkStore, MatchType, SearchResult, SearchResults, STORE_FILE_NAME};
