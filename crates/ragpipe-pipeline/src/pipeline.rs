//! The retrieval orchestrator.
//!
//! One `retrieve` call runs, in order: optional decomposition, then for every
//! sub-query concurrently (optional HyDE rewrite, metadata pre-filter, bulk
//! scoring, optional rerank), then first-seen fusion and optional parent
//! resolution. A failed sub-query is logged and skipped; only when every
//! sub-query fails does the call fail.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use ragpipe_core::error::{Error, Result, SubQueryFailure};
use ragpipe_core::traits::{EmbeddingProvider, QueryDecomposer, Reranker, SimilarityScorer, TextGenerator};
use ragpipe_core::types::{sort_by_score, Chunk, PipelineConfig, ScoredResult};
use ragpipe_embed::cosine;
use ragpipe_text::LexicalJaccardScorer;

use crate::decompose::RuleDecomposer;
use crate::fusion::fuse_first_seen;
use crate::index::IndexSnapshot;
use crate::parent::resolve_parents;
use crate::rerank::{rerank, PhraseReranker};

/// What happened to one sub-query.
#[derive(Debug, Clone)]
pub struct SubQueryReport {
    pub sub_query: String,
    /// Text actually scored against the chunks: the sub-query or its hypothesis.
    pub scored_text: String,
    /// Stage-1 list, sorted and cut to `PipelineConfig::candidate_count`.
    pub candidates: Vec<ScoredResult>,
    /// Final per-sub-query list handed to fusion.
    pub hits: Vec<ScoredResult>,
}

#[derive(Debug, Clone)]
pub struct RetrievalReport {
    pub sub_queries: Vec<SubQueryReport>,
    pub failures: Vec<SubQueryFailure>,
    pub results: Vec<ScoredResult>,
}

pub struct RetrievalPipeline {
    scorer: Arc<dyn SimilarityScorer>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    reranker: Arc<dyn Reranker>,
    decomposer: Arc<dyn QueryDecomposer>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Default for RetrievalPipeline {
    fn default() -> Self {
        Self {
            scorer: Arc::new(LexicalJaccardScorer),
            embedder: None,
            reranker: Arc::new(PhraseReranker),
            decomposer: Arc::new(RuleDecomposer::default()),
            generator: None,
        }
    }
}

impl RetrievalPipeline {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Score with precomputed chunk vectors instead of the text scorer. The
    /// snapshot must have been indexed with the same provider.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    #[must_use]
    pub fn with_decomposer(mut self, decomposer: Arc<dyn QueryDecomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    /// Required for `hyde`.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub async fn retrieve(&self, query: &str, config: &PipelineConfig, snapshot: &IndexSnapshot) -> Result<Vec<ScoredResult>> {
        Ok(self.retrieve_detailed(query, config, snapshot).await?.results)
    }

    /// Plain single-query retrieval: no decomposition, HyDE or rerank.
    pub async fn retrieve_single(&self, query: &str, config: &PipelineConfig, snapshot: &IndexSnapshot) -> Result<Vec<ScoredResult>> {
        let baseline = PipelineConfig { decompose: false, hyde: false, rerank: false, ..config.clone() };
        self.retrieve(query, &baseline, snapshot).await
    }

    pub async fn retrieve_detailed(&self, query: &str, config: &PipelineConfig, snapshot: &IndexSnapshot) -> Result<RetrievalReport> {
        self.check(config, snapshot)?;

        let sub_queries = if config.decompose {
            self.decomposer.decompose(query).await?
        } else {
            vec![query.to_string()]
        };
        if sub_queries.is_empty() {
            return Err(Error::EmptyDecomposition(query.to_string()));
        }
        tracing::debug!(query, sub_queries = sub_queries.len(), "retrieving");

        let outcomes = join_all(sub_queries.iter().map(|sq| self.run_bounded(sq, config, snapshot))).await;

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (sub_query, outcome) in sub_queries.iter().zip(outcomes) {
            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(sub_query = %sub_query, error = %e, "sub-query failed");
                    failures.push(SubQueryFailure { sub_query: sub_query.clone(), reason: e.to_string() });
                }
            }
        }
        if reports.is_empty() {
            return Err(Error::AllSubQueriesFailed(failures));
        }

        let fused = fuse_first_seen(reports.iter().map(|r| r.hits.clone()).collect());
        let results = if config.resolve_parents { resolve_parents(fused, snapshot) } else { fused };
        tracing::info!(query, results = results.len(), failed = failures.len(), "retrieval complete");
        Ok(RetrievalReport { sub_queries: reports, failures, results })
    }

    fn check(&self, config: &PipelineConfig, snapshot: &IndexSnapshot) -> Result<()> {
        config.validate()?;
        if config.hyde && self.generator.is_none() {
            return Err(Error::InvalidConfig("hyde requires a text generator".to_string()));
        }
        if let Some(embedder) = &self.embedder {
            if snapshot.embedder_id() != Some(embedder.embedder_id()) {
                return Err(Error::EmbedderMismatch {
                    expected: snapshot.embedder_id().unwrap_or("<none>").to_string(),
                    actual: embedder.embedder_id().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn run_bounded(&self, sub_query: &str, config: &PipelineConfig, snapshot: &IndexSnapshot) -> Result<SubQueryReport> {
        let run = self.run_sub_query(sub_query, config, snapshot);
        match config.sub_query_deadline_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), run)
                .await
                .map_err(|_| Error::SubQueryTimeout(format!("exceeded {ms} ms")))?,
            None => run.await,
        }
    }

    async fn run_sub_query(&self, sub_query: &str, config: &PipelineConfig, snapshot: &IndexSnapshot) -> Result<SubQueryReport> {
        let scored_text = match (&self.generator, config.hyde) {
            (Some(generator), true) => generator.generate_hypothesis(sub_query).await?,
            _ => sub_query.to_string(),
        };
        let query_vec = match &self.embedder {
            Some(embedder) => Some(embedder.embed(&scored_text)?),
            None => None,
        };
        let tag = config.decompose.then(|| sub_query.to_string());

        let mut candidates: Vec<ScoredResult> = snapshot
            .chunks()
            .iter()
            .filter(|chunk| passes_filters(chunk, config, snapshot))
            .filter_map(|chunk| {
                let score = match &query_vec {
                    Some(q) => match snapshot.embedding(&chunk.id) {
                        Some(v) => cosine(q, v),
                        None => {
                            tracing::warn!(chunk = %chunk.id, "chunk has no embedding; scoring 0");
                            0.0
                        }
                    },
                    None => self.scorer.similarity(&scored_text, &chunk.text),
                };
                (score >= config.similarity_threshold).then(|| ScoredResult {
                    item_id: chunk.id.clone(),
                    score,
                    source_sub_query: tag.clone(),
                    origin_chunk_id: None,
                    payload: chunk.text.clone(),
                })
            })
            .collect();
        sort_by_score(&mut candidates);
        candidates.truncate(config.candidate_count());

        // rerank against the sub-query, not the hypothesis
        let hits = if config.rerank {
            rerank(self.reranker.as_ref(), sub_query, candidates.clone(), config.top_k)
        } else {
            candidates.clone()
        };
        Ok(SubQueryReport { sub_query: sub_query.to_string(), scored_text, candidates, hits })
    }
}

fn passes_filters(chunk: &Chunk, config: &PipelineConfig, snapshot: &IndexSnapshot) -> bool {
    match &config.filters {
        Some(spec) => snapshot.parent_of(chunk).is_some_and(|doc| spec.matches(&doc.metadata)),
        None => true,
    }
}
