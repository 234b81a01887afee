use std::collections::HashSet;

use ragpipe_core::traits::SimilarityScorer;

/// Lowercased, whitespace-delimited word set.
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// `|A ∩ B| / |A ∪ B|`, or `0.0` when either set is empty.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() { return 0.0; }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

/// Keyword-overlap similarity. Needs no embedding model.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalJaccardScorer;

impl SimilarityScorer for LexicalJaccardScorer {
    fn name(&self) -> &str { "jaccard" }

    fn similarity(&self, a: &str, b: &str) -> f32 { jaccard(&word_set(a), &word_set(b)) }
}
