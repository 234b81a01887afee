//! Domain types shared by the chunker, scorers and the retrieval pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::filter::FilterSpec;

pub type DocumentId = String;
pub type ChunkId = String;
pub type Metadata = BTreeMap<String, MetaValue>;

/// Fixed-length vector produced by one embedding provider. Vectors from
/// different providers are never compared with each other.
pub type EmbeddingVector = Vec<f32>;

/// A metadata scalar.
///
/// Deserializes untagged: numbers become `Number`, `YYYY-MM-DD` strings
/// become `Date`, anything else stays `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl MetaValue {
    /// Orders two scalars of the same kind. Mixed kinds are unordered.
    /// Text that reads as `YYYY-MM-DD` becomes `Date`, the same way the
    /// untagged deserializer types it; anything else stays `Text`.
    pub fn from_text(v: impl Into<String>) -> Self {
        let v = v.into();
        match v.parse::<NaiveDate>() {
            Ok(date) => MetaValue::Date(date),
            Err(_) => MetaValue::Text(v),
        }
    }

    pub fn compare(&self, other: &MetaValue) -> Option<Ordering> {
        match (self, other) {
            (MetaValue::Number(a), MetaValue::Number(b)) => a.partial_cmp(b),
            (MetaValue::Date(a), MetaValue::Date(b)) => Some(a.cmp(b)),
            (MetaValue::Text(a), MetaValue::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialOrd for MetaValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { self.compare(other) }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self { MetaValue::from_text(v) }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self { MetaValue::from_text(v) }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self { MetaValue::Number(v) }
}

impl From<i64> for MetaValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self { MetaValue::Number(v as f64) }
}

impl From<NaiveDate> for MetaValue {
    fn from(v: NaiveDate) -> Self { MetaValue::Date(v) }
}

/// A source document. Immutable once handed to the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: Metadata::new() }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous run of sentences from one document.
///
/// - `id`: `"{parent_id}:{index}"`, unique within a snapshot
/// - `parent_id`: back-reference to the owning `Document::id`
/// - `index`: position within the parent, increasing from 0
/// - `text`: member sentences joined by single spaces
/// - `char_count`: number of chars in `text`
/// - `topic`: dominant keyword of the chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub parent_id: DocumentId,
    pub index: usize,
    pub text: String,
    pub sentence_count: usize,
    pub char_count: usize,
    pub topic: String,
}

/// One ranked hit.
///
/// `score` is scorer-specific but higher is always better. Reranked scores are
/// unbounded and only comparable within the candidate set they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub item_id: String,
    pub score: f32,
    pub source_sub_query: Option<String>,
    /// Chunk that produced this hit when `item_id` names a parent document.
    pub origin_chunk_id: Option<ChunkId>,
    pub payload: String,
}

/// Stable descending sort: equal scores keep their first-seen order.
pub fn sort_by_score(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn default_chunk_threshold() -> f32 { 0.3 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Minimum similarity between neighbouring sentences to keep them together.
    #[serde(default = "default_chunk_threshold")]
    pub similarity_threshold: f32,
}

impl Default for ChunkerConfig {
    fn default() -> Self { Self { similarity_threshold: default_chunk_threshold() } }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("chunker.similarity_threshold", self.similarity_threshold)
    }
}

fn default_top_k() -> usize { 5 }
fn default_candidate_multiplier() -> usize { 3 }

/// Per-query knobs. Created and discarded with each `retrieve` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum bulk score for a chunk to become a candidate.
    #[serde(default)]
    pub similarity_threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default)]
    pub filters: Option<FilterSpec>,
    #[serde(default)]
    pub rerank: bool,
    #[serde(default)]
    pub decompose: bool,
    #[serde(default)]
    pub hyde: bool,
    #[serde(default)]
    pub resolve_parents: bool,
    #[serde(default)]
    pub sub_query_deadline_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.0,
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
            filters: None,
            rerank: false,
            decompose: false,
            hyde: false,
            resolve_parents: false,
            sub_query_deadline_ms: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("pipeline.similarity_threshold", self.similarity_threshold)?;
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("pipeline.top_k must be > 0".to_string()));
        }
        if self.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("pipeline.candidate_multiplier must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Size of the stage-1 candidate list.
    pub fn candidate_count(&self) -> usize {
        if self.rerank { self.top_k.saturating_mul(self.candidate_multiplier) } else { self.top_k }
    }
}

fn check_unit_interval(name: &str, v: f32) -> Result<()> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {v}")))
    }
}
