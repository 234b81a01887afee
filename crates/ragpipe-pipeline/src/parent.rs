//! Small-to-big resolution: chunk hits become parent-document hits.

use std::collections::HashMap;

use ragpipe_core::types::ScoredResult;

use crate::index::IndexSnapshot;

/// Replaces each chunk hit with its parent document.
///
/// Parents appear once, at the position of their first chunk. A parent carries
/// the highest score among its chunks and points at that chunk through
/// `origin_chunk_id`. Hits naming unknown chunks are skipped.
pub fn resolve_parents(hits: Vec<ScoredResult>, snapshot: &IndexSnapshot) -> Vec<ScoredResult> {
    let mut out: Vec<ScoredResult> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for hit in hits {
        let Some(parent) = snapshot.chunk(&hit.item_id).and_then(|c| snapshot.parent_of(c)) else {
            tracing::warn!(item = %hit.item_id, "no parent for hit; skipping");
            continue;
        };
        match position.get(&parent.id) {
            Some(&i) => {
                let best = &mut out[i];
                if hit.score > best.score {
                    best.score = hit.score;
                    best.source_sub_query = hit.source_sub_query;
                    best.origin_chunk_id = Some(hit.item_id);
                }
            }
            None => {
                position.insert(parent.id.clone(), out.len());
                out.push(ScoredResult {
                    item_id: parent.id.clone(),
                    score: hit.score,
                    source_sub_query: hit.source_sub_query,
                    origin_chunk_id: Some(hit.item_id),
                    payload: parent.content.clone(),
                });
            }
        }
    }
    out
}
