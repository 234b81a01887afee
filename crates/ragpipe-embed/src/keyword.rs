use ragpipe_core::config::KeywordConfig;
use ragpipe_core::error::{Error, Result};
use ragpipe_core::traits::{EmbeddingProvider, SimilarityScorer};
use ragpipe_core::types::EmbeddingVector;

use crate::cosine::cosine;

/// Keyword-presence embedding compared by cosine.
///
/// Dimension `i` is `min(count(keyword_i) / normalization, 1)` over the
/// lowercased text, where `count` is the number of non-overlapping substring
/// occurrences. The vocabulary fixes the dimension.
#[derive(Debug, Clone)]
pub struct VectorKeywordScorer {
    keywords: Vec<String>,
    normalization: f32,
    id: String,
}

impl VectorKeywordScorer {
    pub fn new<I, S>(keywords: I, normalization: f32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords.into_iter().map(|k| k.as_ref().trim().to_lowercase()).collect();
        if keywords.is_empty() || keywords.iter().any(String::is_empty) {
            return Err(Error::InvalidConfig("keyword vocabulary must be non-empty and contain no blank entries".to_string()));
        }
        if normalization <= 0.0 || !normalization.is_finite() {
            return Err(Error::InvalidConfig(format!("normalization must be a positive number, got {normalization}")));
        }
        let id = format!("keyword:d{}:n{}", keywords.len(), normalization);
        Ok(Self { keywords, normalization, id })
    }

    pub fn from_config(config: &KeywordConfig) -> Result<Self> { Self::new(&config.keywords, config.normalization) }

    pub fn keywords(&self) -> &[String] { &self.keywords }

    #[allow(clippy::cast_precision_loss)]
    pub fn embed_text(&self, text: &str) -> EmbeddingVector {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| (lower.matches(k.as_str()).count() as f32 / self.normalization).clamp(0.0, 1.0))
            .collect()
    }
}

impl Default for VectorKeywordScorer {
    fn default() -> Self {
        let config = KeywordConfig::default();
        let keywords: Vec<String> = config.keywords;
        let id = format!("keyword:d{}:n{}", keywords.len(), config.normalization);
        Self { keywords, normalization: config.normalization, id }
    }
}

impl SimilarityScorer for VectorKeywordScorer {
    fn name(&self) -> &str { &self.id }

    fn similarity(&self, a: &str, b: &str) -> f32 { cosine(&self.embed_text(a), &self.embed_text(b)) }
}

impl EmbeddingProvider for VectorKeywordScorer {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.keywords.len() }
    fn embed(&self, text: &str) -> anyhow::Result<EmbeddingVector> { Ok(self.embed_text(text)) }
}
