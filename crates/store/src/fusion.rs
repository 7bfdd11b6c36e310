use std::collections::HashMap;

/// Reciprocal-rank fusion: each ranking contributes `1/(k + rank)` per id
/// (rank 1-indexed), scores sum across rankings, result sorted
/// descending. `k` defaults to 60.0, the standard RRF constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

pub fn rrf_fuse(rankings: &[&[String]], k: f64, limit: usize) -> Vec<(String, f64)> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for ranking in rankings {
        for (idx, id) in ranking.iter().enumerate() {
            let rank = idx + 1;
            let entry = scores.entry(id.as_str()).or_insert_with(|| {
                order.push(id.as_str());
                0.0
            });
            *entry += 1.0 / (k + rank as f64);
        }
    }

    let mut fused: Vec<(String, f64)> = order
        .into_iter()
        .map(|id| (id.to_string(), scores[id]))
        .collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused
}
