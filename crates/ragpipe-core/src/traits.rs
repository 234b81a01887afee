use async_trait::async_trait;

use crate::error::Result;
use crate::types::EmbeddingVector;

/// Scores how alike two texts are, in `[0, 1]`.
///
/// Implementations must be symmetric and return `1.0` for two identical
/// non-empty texts. Degenerate inputs score `0.0`, never NaN.
pub trait SimilarityScorer: Send + Sync {
    fn name(&self) -> &str;
    fn similarity(&self, a: &str, b: &str) -> f32;
}

pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `keyword:d10`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Deterministic for a fixed provider id.
    fn embed(&self, text: &str) -> anyhow::Result<EmbeddingVector>;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<EmbeddingVector>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// A text generation service, typically network-backed and fallible.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Writes a plausible answer to `query` whose vocabulary resembles the documents.
    async fn generate_hypothesis(&self, query: &str) -> anyhow::Result<String>;
    /// Splits `query` into narrower sub-queries.
    async fn decompose(&self, query: &str) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
pub trait QueryDecomposer: Send + Sync {
    /// Returns a non-empty, ordered list of sub-queries.
    async fn decompose(&self, query: &str) -> Result<Vec<String>>;
}

/// Rescores one candidate against a query. Scores only order a single
/// candidate set; they mean nothing across queries.
pub trait Reranker: Send + Sync {
    fn score(&self, query: &str, candidate: &str) -> Result<f32>;
}
