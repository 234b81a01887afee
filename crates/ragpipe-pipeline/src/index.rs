//! Immutable chunk index built once from a document snapshot.
//!
//! Documents are chunked (and optionally embedded) in one batch pass. The
//! resulting [`IndexSnapshot`] is never mutated; a changed document set means
//! building a new snapshot and swapping it in through [`SnapshotCell`].

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use ragpipe_core::error::{Error, Result};
use ragpipe_core::traits::{EmbeddingProvider, SimilarityScorer};
use ragpipe_core::types::{Chunk, ChunkId, ChunkerConfig, Document, DocumentId, EmbeddingVector};
use ragpipe_text::SemanticChunker;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    #[serde(default)]
    embeddings: HashMap<ChunkId, EmbeddingVector>,
    #[serde(default)]
    embedder_id: Option<String>,
    chunker: ChunkerConfig,
    #[serde(skip)]
    doc_pos: HashMap<DocumentId, usize>,
    #[serde(skip)]
    chunk_pos: HashMap<ChunkId, usize>,
}

impl IndexSnapshot {
    fn assemble(
        documents: Vec<Document>,
        chunks: Vec<Chunk>,
        embeddings: HashMap<ChunkId, EmbeddingVector>,
        embedder_id: Option<String>,
        chunker: ChunkerConfig,
    ) -> Result<Self> {
        let mut snapshot = Self { documents, chunks, embeddings, embedder_id, chunker, doc_pos: HashMap::new(), chunk_pos: HashMap::new() };
        snapshot.build_lookups()?;
        Ok(snapshot)
    }

    fn build_lookups(&mut self) -> Result<()> {
        self.doc_pos.clear();
        for (i, doc) in self.documents.iter().enumerate() {
            if self.doc_pos.insert(doc.id.clone(), i).is_some() {
                return Err(Error::DuplicateDocument(doc.id.clone()));
            }
        }
        self.chunk_pos.clear();
        for (i, chunk) in self.chunks.iter().enumerate() {
            if !self.doc_pos.contains_key(&chunk.parent_id) {
                return Err(Error::NotFound(format!("parent '{}' of chunk '{}'", chunk.parent_id, chunk.id)));
            }
            self.chunk_pos.insert(chunk.id.clone(), i);
        }
        Ok(())
    }

    pub fn documents(&self) -> &[Document] { &self.documents }
    pub fn chunks(&self) -> &[Chunk] { &self.chunks }
    pub fn chunker_config(&self) -> &ChunkerConfig { &self.chunker }
    pub fn embedder_id(&self) -> Option<&str> { self.embedder_id.as_deref() }
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn document(&self, id: &str) -> Option<&Document> { self.doc_pos.get(id).map(|&i| &self.documents[i]) }
    pub fn chunk(&self, id: &str) -> Option<&Chunk> { self.chunk_pos.get(id).map(|&i| &self.chunks[i]) }
    pub fn parent_of(&self, chunk: &Chunk) -> Option<&Document> { self.document(&chunk.parent_id) }
    pub fn embedding(&self, chunk_id: &str) -> Option<&EmbeddingVector> { self.embeddings.get(chunk_id) }

    /// Writes `{documents, chunks, embeddings, embedder_id, chunker}` as JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| Error::Persist(format!("{}: {e}", dir.display())))?;
            }
        }
        let json = serde_json::to_string(self).map_err(|e| Error::Persist(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::Persist(format!("{}: {e}", path.display())))
    }

    /// Reads a snapshot written by [`save_json`](Self::save_json) and rebuilds the id lookups.
    pub fn load_json(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Persist(format!("{}: {e}", path.display())))?;
        let mut snapshot: Self = serde_json::from_str(&raw).map_err(|e| Error::Persist(e.to_string()))?;
        snapshot.build_lookups()?;
        snapshot.check_embeddings()?;
        Ok(snapshot)
    }

    /// An embedded snapshot needs one vector per chunk, all of one dimension.
    fn check_embeddings(&self) -> Result<()> {
        let Some(id) = &self.embedder_id else { return Ok(()) };
        let mut dim = None;
        for chunk in &self.chunks {
            let Some(vector) = self.embeddings.get(&chunk.id) else {
                return Err(Error::Persist(format!("chunk '{}' has no '{id}' embedding", chunk.id)));
            };
            match dim {
                None => dim = Some(vector.len()),
                Some(d) if d != vector.len() => {
                    return Err(Error::Persist(format!(
                        "chunk '{}' has a {}-d '{id}' embedding, expected {d}",
                        chunk.id,
                        vector.len()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

pub struct Indexer {
    chunker: SemanticChunker,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl Indexer {
    pub fn new(config: ChunkerConfig) -> Self { Self { chunker: SemanticChunker::new(config), embedder: None } }

    pub fn with_scorer(config: ChunkerConfig, scorer: Arc<dyn SimilarityScorer>) -> Self {
        Self { chunker: SemanticChunker::with_scorer(config, scorer), embedder: None }
    }

    /// Precompute one vector per chunk with `embedder`.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(&self, documents: Vec<Document>) -> Result<IndexSnapshot> {
        self.chunker.config().validate()?;
        let mut seen = HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) { return Err(Error::DuplicateDocument(doc.id.clone())); }
        }

        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk_document(d)).collect();

        let (embeddings, embedder_id) = match &self.embedder {
            Some(embedder) => (embed_chunks(embedder.as_ref(), &chunks)?, Some(embedder.embedder_id().to_string())),
            None => (HashMap::new(), None),
        };

        tracing::info!(documents = documents.len(), chunks = chunks.len(), embedder = ?embedder_id, "built index snapshot");
        IndexSnapshot::assemble(documents, chunks, embeddings, embedder_id, self.chunker.config().clone())
    }
}

fn embed_chunks(embedder: &dyn EmbeddingProvider, chunks: &[Chunk]) -> Result<HashMap<ChunkId, EmbeddingVector>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts)?;
    if vectors.len() != chunks.len() {
        return Err(Error::Other(anyhow::anyhow!("embedder returned {} vectors for {} chunks", vectors.len(), chunks.len())));
    }
    let dim = embedder.dim();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::Other(anyhow::anyhow!("embedder '{}' returned a {}-d vector, expected {dim}", embedder.embedder_id(), bad.len())));
    }
    Ok(chunks.iter().map(|c| c.id.clone()).zip(vectors).collect())
}

/// Chunks `documents` with the lexical scorer and no precomputed embeddings.
pub fn index(documents: Vec<Document>, config: &ChunkerConfig) -> Result<IndexSnapshot> {
    Indexer::new(config.clone()).index(documents)
}

/// Shared holder for the live snapshot. Readers get a cheap `Arc` clone that
/// stays valid while a rebuild is swapped in.
pub struct SnapshotCell {
    inner: RwLock<Arc<IndexSnapshot>>,
}

impl SnapshotCell {
    pub fn new(snapshot: IndexSnapshot) -> Self { Self { inner: RwLock::new(Arc::new(snapshot)) } }

    pub fn current(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the whole snapshot and returns the previous one.
    pub fn replace(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }
}
