//! Source-to-chunk splitting.
//!
//! ```text
//! (path, content)
//!     │
//!     ├─ recognized language w/ tree-sitter grammar ──> AST chunking
//!     │        └─ parse failure ─────────────────────────┐
//!     └─ everything else ─────────────────────────────────┴─> line-based fallback
//!                                                               │
//!                                                               v
//!                                                 line-number remap + tiny-chunk filter
//! ```
//!
//! The only type that crosses this crate's boundary is [`ChunkInfo`]:
//! `{text, token_count, chunk_index, start_line, end_line}`. Nothing about
//! tree-sitter or the fallback splitter ever escapes it.

mod ast;
mod chunker;
mod error;
mod fallback;
mod language;
mod lines;
mod types;

pub use chunker::Chunker;
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use types::{estimate_tokens, ChunkInfo, DEFAULT_CHUNK_TOKEN_BUDGET, MIN_CHUNK_TOKENS};
