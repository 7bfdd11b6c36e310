/// Coarse 4-chars-per-token heuristic used only for batching decisions,
/// never for the skip/embed decision in the indexer (that uses the
/// chunker's own token count).
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Pack texts into batches bounded by both `max_count` (128) and
/// `max_tokens` (100 000), preserving order. A single text that alone
/// exceeds `max_tokens` still becomes its own batch (the provider, not
/// this function, is the source of truth on whether it actually fits).
pub fn pack_batches(texts: &[String], max_count: usize, max_tokens: usize) -> Vec<Vec<String>> {
    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for text in texts {
        let tokens = estimate_tokens(text);
        let would_overflow_count = current.len() + 1 > max_count;
        let would_overflow_tokens = current_tokens > 0 && current_tokens + tokens > max_tokens;

        if !current.is_empty() && (would_overflow_count || would_overflow_tokens) {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        current.push(text.clone());
        current_tokens += tokens;
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// Split a batch into two halves for the max-tokens-split-retry path.
/// Returns `None` when the batch can't be split further (single item).
pub fn split_in_half(batch: &[String]) -> Option<(Vec<String>, Vec<String>)> {
    if batch.len() < 2 {
        return None;
    }
    let mid = batch.len() / 2;
    Some((batch[..mid].to_vec(), batch[mid..].to_vec()))
}

pub const MAX_BATCH_SIZE: usize = 128;
pub const MAX_BATCH_TOKENS: usize = 100_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_respecting_count_cap() {
        let texts: Vec<String> = (0..300).map(|i| format!("text{i}")).collect();
        let batches = pack_batches(&texts, MAX_BATCH_SIZE, MAX_BATCH_TOKENS);
        assert!(batches.iter().all(|b| b.len() <= MAX_BATCH_SIZE));
        let total: usize = batches.iter().map(Vec::len).sum();
        assert_eq!(total, 300);
    }

    #[test]
    fn packs_respecting_token_cap() {
        let big_text = "a".repeat(4 * 90_000);
        let texts = vec![big_text.clone(), big_text.clone()];
        let batches = pack_batches(&texts, MAX_BATCH_SIZE, MAX_BATCH_TOKENS);
        assert_eq!(batches.len(), 2, "each ~90k-token text needs its own batch");
    }

    #[test]
    fn single_oversized_text_still_forms_one_batch() {
        let huge = "a".repeat(4 * 500_000);
        let batches = pack_batches(&[huge], MAX_BATCH_SIZE, MAX_BATCH_TOKENS);
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn split_in_half_splits_evenly() {
        let batch: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        let (a, b) = split_in_half(&batch).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn split_in_half_refuses_single_item() {
        assert!(split_in_half(&["only".to_string()]).is_none());
    }
}
