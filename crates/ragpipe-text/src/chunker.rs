//! Topic-boundary chunking.
//!
//! Sentences are walked in order. Each one is compared with the last sentence
//! of the open chunk (not the chunk as a whole); a similarity below the
//! threshold closes the chunk and seeds a new one. Raising the threshold makes
//! merging harder, so chunk count never decreases as it grows.

use std::sync::Arc;

use ragpipe_core::traits::SimilarityScorer;
use ragpipe_core::types::{Chunk, ChunkerConfig, Document};

use crate::lexical::LexicalJaccardScorer;
use crate::sentence::split_sentences;
use crate::topic::extract_topic;

#[derive(Clone)]
pub struct SemanticChunker {
    scorer: Arc<dyn SimilarityScorer>,
    config: ChunkerConfig,
}

impl SemanticChunker {
    /// Chunker backed by [`LexicalJaccardScorer`].
    pub fn new(config: ChunkerConfig) -> Self { Self::with_scorer(config, Arc::new(LexicalJaccardScorer)) }

    pub fn with_scorer(config: ChunkerConfig, scorer: Arc<dyn SimilarityScorer>) -> Self { Self { scorer, config } }

    pub fn config(&self) -> &ChunkerConfig { &self.config }

    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> { self.chunk_text(&doc.id, &doc.content) }

    pub fn chunk_text(&self, parent_id: &str, text: &str) -> Vec<Chunk> {
        self.chunk_sentences(parent_id, &split_sentences(text))
    }

    pub fn chunk_sentences(&self, parent_id: &str, sentences: &[String]) -> Vec<Chunk> {
        let Some((first, rest)) = sentences.split_first() else { return Vec::new(); };
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = vec![first.as_str()];
        for sentence in rest {
            let last = current.last().copied().unwrap_or_default();
            let similarity = self.scorer.similarity(last, sentence);
            if similarity >= self.config.similarity_threshold {
                current.push(sentence);
            } else {
                chunks.push(build_chunk(parent_id, chunks.len(), &current));
                current = vec![sentence.as_str()];
            }
        }
        chunks.push(build_chunk(parent_id, chunks.len(), &current));
        tracing::debug!(parent_id, sentences = sentences.len(), chunks = chunks.len(), "chunked document");
        chunks
    }
}

impl Default for SemanticChunker {
    fn default() -> Self { Self::new(ChunkerConfig::default()) }
}

fn build_chunk(parent_id: &str, index: usize, sentences: &[&str]) -> Chunk {
    let text = sentences.join(" ");
    Chunk {
        id: format!("{parent_id}:{index}"),
        parent_id: parent_id.to_string(),
        index,
        char_count: text.chars().count(),
        sentence_count: sentences.len(),
        topic: extract_topic(sentences),
        text,
    }
}
