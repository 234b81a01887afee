use std::collections::HashSet;

use ragpipe_core::types::ScoredResult;

/// Merges per-sub-query result lists in sub-query order.
///
/// The first occurrence of an `item_id` wins; later duplicates are dropped
/// with their scores. Scores from different sub-queries are never combined.
pub fn fuse_first_seen(per_sub_query: Vec<Vec<ScoredResult>>) -> Vec<ScoredResult> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut fused = Vec::new();
    for hits in per_sub_query {
        for hit in hits {
            if seen.insert(hit.item_id.clone()) {
                fused.push(hit);
            }
        }
    }
    fused
}
