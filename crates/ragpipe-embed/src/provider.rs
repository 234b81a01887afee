use std::sync::Arc;

use ragpipe_core::traits::{EmbeddingProvider, SimilarityScorer};

use crate::cosine::cosine;

/// Uses any [`EmbeddingProvider`] as a text-to-text [`SimilarityScorer`].
///
/// A provider failure scores the pair `0.0` and is logged; the chunker that
/// consumes this treats it as a topic boundary.
pub struct EmbeddingScorer {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingScorer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self { Self { provider } }
}

impl SimilarityScorer for EmbeddingScorer {
    fn name(&self) -> &str { self.provider.embedder_id() }

    fn similarity(&self, a: &str, b: &str) -> f32 {
        match (self.provider.embed(a), self.provider.embed(b)) {
            (Ok(va), Ok(vb)) => cosine(&va, &vb),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(embedder = self.provider.embedder_id(), error = %e, "embedding failed, scoring 0");
                0.0
            }
        }
    }
}
