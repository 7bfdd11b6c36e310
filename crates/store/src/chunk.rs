use serde::{Deserialize, Serialize};

/// §3 data model: identity, file position, text, embedding, file hash,
/// and indexing timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub file_path: String,
    pub chunk_index: u32,
    pub start_line: u32,
    pub end_line: u32,
    pub text: String,
    pub embedding: Vec<f32>,
    pub file_hash: String,
    pub indexed_at_unix_ms: i64,
}

impl Chunk {
    /// Deterministic id: `(file_path, chunk_index)` is unique per project
    /// (§3 invariant), so derive the id from it instead of a random UUID —
    /// `upsert` then naturally replaces the right row on re-index.
    pub fn make_id(file_path: &str, chunk_index: u32) -> String {
        format!("{file_path}#{chunk_index}")
    }
}

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
