use anyhow::{anyhow, Result};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ragpipe_core::traits::EmbeddingProvider;
use ragpipe_core::types::EmbeddingVector;

/// Model-free embedder for tests and offline development.
///
/// Each lowercased token is hashed with xxHash64 into one of `dim` buckets;
/// the vector is L2-normalized. Deterministic across runs and platforms.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dim: usize,
    id: String,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 { return Err(anyhow!("embedding dimension must be > 0")); }
        Ok(Self { dim, id: format!("hashed:xxh64:d{dim}") })
    }
}

impl EmbeddingProvider for HashedEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        Ok(v)
    }
}
