//! Second-stage reranking of a small candidate set.

use ragpipe_core::error::{Error, Result};
use ragpipe_core::traits::Reranker;
use ragpipe_core::types::{sort_by_score, ScoredResult};

/// Words longer than this many chars earn a per-occurrence bonus.
const KEYWORD_MIN_CHARS: usize = 3;
const PHRASE_WEIGHT: f64 = 2.0;
const KEYWORD_WEIGHT: f64 = 0.5;
const DENSITY_WEIGHT: f64 = 0.1;

/// Lexical reranker rewarding exact phrase overlap.
///
/// For a lowercased query `w1..wn` and candidate text:
/// - every contiguous run `wi..wj` found in the text adds `2 * (j - i + 1)`
/// - every query word longer than three chars adds `0.5` per occurrence
/// - the sum is boosted by `1 + 0.1 * score / (len / 100)`
///
/// Matches are substring matches, so `"rag"` also hits `"fragment"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseReranker;

impl Reranker for PhraseReranker {
    fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let doc = candidate.to_lowercase();
        if doc.trim().is_empty() {
            return Err(Error::MalformedCandidate("candidate text is empty".to_string()));
        }
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();

        let mut score = 0.0_f64;
        for start in 0..words.len() {
            for end in start + 1..=words.len() {
                // a longer run contains the shorter one
                if !doc.contains(&words[start..end].join(" ")) { break; }
                score += PHRASE_WEIGHT * (end - start) as f64;
            }
        }
        for word in words.iter().filter(|w| w.chars().count() > KEYWORD_MIN_CHARS) {
            score += KEYWORD_WEIGHT * doc.matches(word).count() as f64;
        }

        let len = doc.chars().count() as f64;
        let density = score / (len / 100.0);
        score *= 1.0 + density * DENSITY_WEIGHT;
        Ok(score as f32)
    }
}

/// Rescores `candidates` against `query` and keeps the best `top_k`.
///
/// Candidates the reranker rejects are dropped with a warning. Ties keep the
/// stage-1 order.
pub fn rerank(reranker: &dyn Reranker, query: &str, candidates: Vec<ScoredResult>, top_k: usize) -> Vec<ScoredResult> {
    let mut rescored: Vec<ScoredResult> = candidates
        .into_iter()
        .filter_map(|mut c| match reranker.score(query, &c.payload) {
            Ok(score) => {
                c.score = score;
                Some(c)
            }
            Err(e) => {
                tracing::warn!(item = %c.item_id, error = %e, "dropping candidate during rerank");
                None
            }
        })
        .collect();
    sort_by_score(&mut rescored);
    rescored.truncate(top_k);
    rescored
}
