use crate::ast;
use crate::error::Result;
use crate::fallback::chunk_by_lines_default;
use crate::language::Language;
use crate::lines::LineIndex;
use crate::types::{estimate_tokens, ChunkInfo, MIN_CHUNK_TOKENS};
use std::path::Path;

/// Split a file's bytes into semantically coherent chunks (§4.3). Syntax
/// aware for the four tree-sitter-backed languages, line-based for
/// everything else (recognized or not).
#[derive(Debug, Default, Clone, Copy)]
pub struct Chunker;

impl Chunker {
    pub fn new() -> Self {
        Self
    }

    pub fn chunk_file(&self, path: &Path, content: &str) -> Result<Vec<ChunkInfo>> {
        let language = Language::from_path(path);
        self.chunk(content, language)
    }

    pub fn chunk(&self, content: &str, language: Option<Language>) -> Result<Vec<ChunkInfo>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let raw_texts = match language.filter(|l| l.supports_ast()) {
            Some(lang) => match ast::chunk_source(lang, content) {
                Ok(texts) if !texts.is_empty() => texts,
                Ok(_) => return Ok(Vec::new()),
                Err(err) => {
                    log::warn!(
                        "AST chunking failed for {}: {err}, falling back to line-based chunking",
                        lang.as_str()
                    );
                    chunk_by_lines_default(content)
                }
            },
            None => chunk_by_lines_default(content),
        };

        Ok(self.post_process(content, raw_texts))
    }

    fn post_process(&self, content: &str, raw_texts: Vec<String>) -> Vec<ChunkInfo> {
        let index = LineIndex::new(content);
        let mut out = Vec::with_capacity(raw_texts.len());
        let mut chunk_index = 0usize;

        for text in raw_texts {
            let token_count = estimate_tokens(&text);
            if token_count < MIN_CHUNK_TOKENS {
                continue;
            }
            let (start_line, end_line) = index.locate_chunk(content, &text);
            out.push(ChunkInfo {
                text,
                token_count,
                chunk_index,
                start_line,
                end_line,
            });
            chunk_index += 1;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_content_yields_no_chunks_no_error() {
        let chunker = Chunker::new();
        let chunks = chunker.chunk_file(&PathBuf::from("empty.rs"), "").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn whitespace_only_yields_no_chunks() {
        let chunker = Chunker::new();
        let chunks = chunker
            .chunk_file(&PathBuf::from("blank.py"), "   \n\n  \t\n")
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn tiny_chunks_are_dropped() {
        let chunker = Chunker::new();
        let chunks = chunker.chunk_file(&PathBuf::from("x.rs"), "fn a(){}\n").unwrap();
        assert!(chunks.is_empty(), "a 3-token chunk must be filtered out");
    }

    #[test]
    fn unrecognized_extension_uses_line_fallback() {
        let chunker = Chunker::new();
        let content = "some plain text file with more than ten words in it to pass the filter\n";
        let chunks = chunker
            .chunk_file(&PathBuf::from("notes.xyz"), content)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn rust_function_chunk_has_correct_line_range() {
        let chunker = Chunker::new();
        let content = "fn login(username: &str, password: &str) -> bool {\n    username == \"admin\" && password == \"hunter2\"\n}\n";
        let chunks = chunker.chunk_file(&PathBuf::from("auth.rs"), content).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }
}
