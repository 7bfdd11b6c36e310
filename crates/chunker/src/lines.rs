//! Line-number policy (§4.3): locate a chunk's first 50 characters in the
//! source, map to a line via cumulative newline offsets. Failures default
//! to 1/1 and are logged — they never fail the chunk.

/// Precomputed byte-offset -> line-number index for one source file.
pub struct LineIndex {
    /// Byte offset where each line starts, 0-indexed by line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-indexed line number containing `byte_offset`.
    pub fn line_at(&self, byte_offset: usize) -> u32 {
        match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx as u32 + 1,
            Err(idx) => idx.max(1) as u32,
        }
    }

    /// Locate `(start_line, end_line)` for `chunk_text` within `content` by
    /// searching for the chunk's first 50 characters, then finding the
    /// line containing the last character of the matched span. Falls back
    /// to `(1, 1)` (logged) when the needle can't be found verbatim — this
    /// happens when upstream chunking normalizes whitespace.
    pub fn locate_chunk(&self, content: &str, chunk_text: &str) -> (u32, u32) {
        let needle: String = chunk_text.chars().take(50).collect();
        if needle.trim().is_empty() {
            log::warn!("chunk line mapping failed: empty needle, defaulting to 1/1");
            return (1, 1);
        }
        let Some(start_byte) = content.find(needle.as_str()) else {
            log::warn!("chunk line mapping failed: needle not found, defaulting to 1/1");
            return (1, 1);
        };
        let end_byte = (start_byte + chunk_text.len().max(1) - 1).min(content.len().saturating_sub(1));
        let start_line = self.line_at(start_byte);
        let end_line = self.line_at(end_byte).max(start_line);
        (start_line, end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_chunk_on_second_line() {
        let content = "line one\nline two and more\nline three\n";
        let idx = LineIndex::new(content);
        let (start, end) = idx.locate_chunk(content, "line two and more");
        assert_eq!((start, end), (2, 2));
    }

    #[test]
    fn multi_line_chunk_spans_correctly() {
        let content = "a\nb\nc\nd\n";
        let idx = LineIndex::new(content);
        let (start, end) = idx.locate_chunk(content, "b\nc");
        assert_eq!((start, end), (2, 3));
    }

    #[test]
    fn missing_needle_falls_back_to_one_one() {
        let content = "hello world\n";
        let idx = LineIndex::new(content);
        let (start, end) = idx.locate_chunk(content, "not present at all");
        assert_eq!((start, end), (1, 1));
    }
}
