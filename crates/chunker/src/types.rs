use serde::Serialize;

/// The only shape that crosses the chunker's public boundary. No caller
/// ever sees a tree-sitter node or a raw byte offset.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkInfo {
    pub text: String,
    pub token_count: usize,
    pub chunk_index: usize,
    pub start_line: u32,
    pub end_line: u32,
}

/// Rough token estimate when the syntax tool doesn't report one: a
/// whitespace split, which is close enough for the batching/skip
/// decisions that consume it.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count().max(1)
}

pub const MIN_CHUNK_TOKENS: usize = 10;
pub const DEFAULT_CHUNK_TOKEN_BUDGET: usize = 500;
