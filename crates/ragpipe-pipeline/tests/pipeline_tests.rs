use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use ragpipe_core::error::Error;
use ragpipe_core::traits::{QueryDecomposer, TextGenerator};
use ragpipe_core::{ChunkerConfig, Document, FilterSpec, PipelineConfig, ScoredResult};
use ragpipe_embed::HashedEmbedder;
use ragpipe_pipeline::{
    fuse_first_seen, index, resolve_parents, GeneratorDecomposer, IndexSnapshot, Indexer, RetrievalPipeline, RuleDecomposer,
    SnapshotCell, TemplateGenerator,
};

fn sample_documents() -> Vec<Document> {
    let doc = |id: &str, content: &str, version: &str, language: &str, kind: &str, date: &str| {
        Document::new(id, content)
            .with_meta("version", version)
            .with_meta("language", language)
            .with_meta("type", kind)
            .with_meta("date", date)
    };
    vec![
        doc("doc1", "API authentication using OAuth2 tokens. Generate tokens from dashboard.", "v3", "python", "api", "2024-03-15"),
        doc("doc2", "API authentication using API keys. This version is deprecated.", "v2", "python", "api", "2022-06-10"),
        doc("doc3", "Getting started with the JavaScript SDK. Install via npm.", "v3", "javascript", "sdk", "2024-02-20"),
        doc("doc4", "Using the Python SDK to interact with databases. Query examples included.", "v3", "python", "sdk", "2024-01-10"),
        doc("doc5", "Complete API reference documentation. All endpoints and parameters.", "v3", "python", "api", "2024-04-01"),
        doc("doc6", "Legacy API documentation. No longer supported.", "v1", "python", "api", "2020-01-15"),
    ]
}

fn sample_snapshot() -> IndexSnapshot { index(sample_documents(), &ChunkerConfig::default()).unwrap() }

fn hit(id: &str, score: f32) -> ScoredResult {
    ScoredResult { item_id: id.into(), score, source_sub_query: None, origin_chunk_id: None, payload: String::new() }
}

fn ids(results: &[ScoredResult]) -> Vec<&str> { results.iter().map(|r| r.item_id.as_str()).collect() }

struct ScriptedDecomposer(Vec<&'static str>);

#[async_trait]
impl QueryDecomposer for ScriptedDecomposer {
    async fn decompose(&self, _query: &str) -> ragpipe_core::Result<Vec<String>> {
        Ok(self.0.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Fails hypotheses for queries containing "fail" and stalls on "slow".
struct FlakyGenerator {
    parts: Vec<String>,
}

#[async_trait]
impl TextGenerator for FlakyGenerator {
    async fn generate_hypothesis(&self, query: &str) -> anyhow::Result<String> {
        if query.contains("fail") {
            anyhow::bail!("generator unavailable");
        }
        if query.contains("slow") {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(format!("{query} authentication tokens"))
    }

    async fn decompose(&self, _query: &str) -> anyhow::Result<Vec<String>> { Ok(self.parts.clone()) }
}

#[test]
fn fusion_keeps_first_occurrence() {
    let fused = fuse_first_seen(vec![vec![hit("A", 0.9), hit("B", 0.5)], vec![hit("B", 0.99), hit("C", 0.4)]]);
    assert_eq!(ids(&fused), vec!["A", "B", "C"]);
    assert_eq!(fused[1].score, 0.5);
}

#[test]
fn parent_resolution_keeps_best_chunk_score() {
    let docs = vec![
        Document::new("d1", "Cats sleep all day long. Quantum computers manipulate qubits."),
        Document::new("d2", "Bread needs flour."),
    ];
    let snapshot = index(docs, &ChunkerConfig::default()).unwrap();
    assert_eq!(snapshot.chunks().len(), 3);

    let resolved = resolve_parents(vec![hit("d1:0", 0.7), hit("d2:0", 0.5), hit("d1:1", 0.9), hit("ghost:0", 1.0)], &snapshot);
    assert_eq!(ids(&resolved), vec!["d1", "d2"]);
    assert_eq!(resolved[0].score, 0.9);
    assert_eq!(resolved[0].origin_chunk_id.as_deref(), Some("d1:1"));
    assert!(resolved[0].payload.starts_with("Cats sleep"));
}

#[test]
fn indexing_rejects_duplicate_ids() {
    let docs = vec![Document::new("a", "One."), Document::new("a", "Two.")];
    assert!(matches!(index(docs, &ChunkerConfig::default()), Err(Error::DuplicateDocument(id)) if id == "a"));
}

#[test]
fn indexing_rejects_bad_threshold() {
    let bad = ChunkerConfig { similarity_threshold: -0.1 };
    assert!(matches!(index(sample_documents(), &bad), Err(Error::InvalidConfig(_))));
}

#[test]
fn chunks_point_back_to_their_parents() {
    let snapshot = sample_snapshot();
    for chunk in snapshot.chunks() {
        let parent = snapshot.parent_of(chunk).expect("parent");
        assert_eq!(parent.id, chunk.parent_id);
        assert_eq!(snapshot.chunk(&chunk.id), Some(chunk));
    }
}

#[tokio::test]
async fn filters_restrict_to_matching_parents() {
    let snapshot = sample_snapshot();
    let filters = FilterSpec::new().eq("version", "v3").eq("language", "python").eq("type", "api");
    let config = PipelineConfig { filters: Some(filters), resolve_parents: true, ..PipelineConfig::default() };

    let results = RetrievalPipeline::new()
        .retrieve("How do I authenticate with the Python API?", &config, &snapshot)
        .await
        .unwrap();
    let found: BTreeSet<&str> = ids(&results).into_iter().collect();
    assert_eq!(found, BTreeSet::from(["doc1", "doc5"]));
}

#[tokio::test]
async fn unknown_filter_key_matches_nothing() {
    let snapshot = sample_snapshot();
    let config = PipelineConfig { filters: Some(FilterSpec::new().eq("category", "authentication")), ..PipelineConfig::default() };
    let results = RetrievalPipeline::new().retrieve("authentication", &config, &snapshot).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn date_range_filter() {
    let snapshot = sample_snapshot();
    let filters = FilterSpec::new().gte("date", "2024-01-01").eq("language", "python");
    let config = PipelineConfig { filters: Some(filters), top_k: 10, resolve_parents: true, ..PipelineConfig::default() };
    let results = RetrievalPipeline::new().retrieve("python", &config, &snapshot).await.unwrap();
    let found: BTreeSet<&str> = ids(&results).into_iter().collect();
    assert_eq!(found, BTreeSet::from(["doc1", "doc4", "doc5"]));
}

#[tokio::test]
async fn two_stage_counts_follow_the_multiplier() {
    let snapshot = sample_snapshot();
    let total = snapshot.chunks().len();
    for (top_k, multiplier) in [(1, 1), (2, 3), (3, 2), (20, 3)] {
        let config = PipelineConfig { top_k, candidate_multiplier: multiplier, rerank: true, ..PipelineConfig::default() };
        let report = RetrievalPipeline::new().retrieve_detailed("API authentication tokens", &config, &snapshot).await.unwrap();
        let sub = &report.sub_queries[0];
        assert_eq!(sub.candidates.len(), (top_k * multiplier).min(total));
        assert_eq!(sub.hits.len(), top_k.min(sub.candidates.len()));
    }
}

#[tokio::test]
async fn threshold_floor_can_empty_the_result() {
    let snapshot = sample_snapshot();
    let config = PipelineConfig { similarity_threshold: 1.0, ..PipelineConfig::default() };
    let results = RetrievalPipeline::new().retrieve("nothing like this exists", &config, &snapshot).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn retrieval_is_deterministic() {
    let snapshot = sample_snapshot();
    let config = PipelineConfig { rerank: true, decompose: true, ..PipelineConfig::default() };
    let pipeline = RetrievalPipeline::new();
    let q = "What are the API authentication tokens and how are API keys deprecated";
    let first = pipeline.retrieve(q, &config, &snapshot).await.unwrap();
    let second = pipeline.retrieve(q, &config, &snapshot).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn decomposed_hits_are_tagged_and_fused() {
    let snapshot = sample_snapshot();
    let pipeline = RetrievalPipeline::new().with_decomposer(Arc::new(ScriptedDecomposer(vec!["OAuth2 tokens", "JavaScript SDK npm"])));
    let config = PipelineConfig { decompose: true, top_k: 2, ..PipelineConfig::default() };

    let report = pipeline.retrieve_detailed("ignored", &config, &snapshot).await.unwrap();
    assert_eq!(report.sub_queries.len(), 2);
    assert!(report.failures.is_empty());
    assert!(report.results.iter().all(|r| r.source_sub_query.is_some()));
    assert_eq!(report.results[0].source_sub_query.as_deref(), Some("OAuth2 tokens"));
    let unique: BTreeSet<&str> = ids(&report.results).into_iter().collect();
    assert_eq!(unique.len(), report.results.len());
}

#[tokio::test]
async fn undecomposed_hits_carry_no_tag() {
    let snapshot = sample_snapshot();
    let results = RetrievalPipeline::new().retrieve("API", &PipelineConfig::default(), &snapshot).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.source_sub_query.is_none() && r.origin_chunk_id.is_none()));
}

#[tokio::test]
async fn failed_sub_queries_are_skipped() {
    let snapshot = sample_snapshot();
    let generator = Arc::new(FlakyGenerator { parts: vec![] });
    let pipeline = RetrievalPipeline::new()
        .with_generator(generator)
        .with_decomposer(Arc::new(ScriptedDecomposer(vec!["OAuth2 tokens", "please fail"])));
    let config = PipelineConfig { decompose: true, hyde: true, ..PipelineConfig::default() };

    let report = pipeline.retrieve_detailed("q", &config, &snapshot).await.unwrap();
    assert_eq!(report.sub_queries.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].sub_query, "please fail");
    assert_eq!(report.sub_queries[0].scored_text, "OAuth2 tokens authentication tokens");
    assert!(!report.results.is_empty());
}

#[tokio::test]
async fn all_failures_surface_one_aggregate_error() {
    let snapshot = sample_snapshot();
    let pipeline = RetrievalPipeline::new()
        .with_generator(Arc::new(FlakyGenerator { parts: vec![] }))
        .with_decomposer(Arc::new(ScriptedDecomposer(vec!["fail one", "fail two"])));
    let config = PipelineConfig { decompose: true, hyde: true, ..PipelineConfig::default() };

    match pipeline.retrieve("q", &config, &snapshot).await {
        Err(Error::AllSubQueriesFailed(failures)) => {
            let names: Vec<&str> = failures.iter().map(|f| f.sub_query.as_str()).collect();
            assert_eq!(names, vec!["fail one", "fail two"]);
        }
        other => panic!("expected aggregate failure, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_sub_query_hits_the_deadline() {
    let snapshot = sample_snapshot();
    let pipeline = RetrievalPipeline::new()
        .with_generator(Arc::new(FlakyGenerator { parts: vec![] }))
        .with_decomposer(Arc::new(ScriptedDecomposer(vec!["slow query", "OAuth2 tokens"])));
    let config = PipelineConfig { decompose: true, hyde: true, sub_query_deadline_ms: Some(50), ..PipelineConfig::default() };

    let report = pipeline.retrieve_detailed("q", &config, &snapshot).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].sub_query, "slow query");
    assert!(report.failures[0].reason.contains("50 ms"), "{}", report.failures[0].reason);
}

#[tokio::test]
async fn hyde_without_generator_is_a_config_error() {
    let snapshot = sample_snapshot();
    let config = PipelineConfig { hyde: true, ..PipelineConfig::default() };
    assert!(matches!(RetrievalPipeline::new().retrieve("q", &config, &snapshot).await, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn empty_generated_decomposition_is_an_error() {
    let decomposer = GeneratorDecomposer::new(Arc::new(FlakyGenerator { parts: vec!["  ".to_string()] }));
    assert!(matches!(decomposer.decompose("q").await, Err(Error::EmptyDecomposition(_))));

    let pipeline = RetrievalPipeline::new().with_decomposer(Arc::new(ScriptedDecomposer(vec![])));
    let config = PipelineConfig { decompose: true, ..PipelineConfig::default() };
    assert!(matches!(pipeline.retrieve("q", &config, &sample_snapshot()).await, Err(Error::EmptyDecomposition(_))));
}

#[tokio::test]
async fn rule_decomposer_templates() {
    let d = RuleDecomposer::default();
    assert_eq!(
        d.decompose("Compare asyncio vs threading").await.unwrap(),
        vec![
            "What is asyncio and how does it work?",
            "What is threading and how does it work?",
            "What are the key differences between asyncio and threading?",
        ]
    );
    assert_eq!(
        d.decompose("What are the benefits and drawbacks?").await.unwrap(),
        vec!["What are the benefits of RAG systems?", "What are the drawbacks of RAG systems?", "When should you use RAG systems?"]
    );
    assert_eq!(
        d.decompose("How do I install and configure it").await.unwrap(),
        vec!["How do I set up the feature?", "How do I use the feature?", "What are common issues?"]
    );
    assert_eq!(d.decompose("What is RAG and what is HyDE?").await.unwrap(), vec!["What is RAG?", "what is HyDE?"]);
    assert_eq!(d.decompose("Plain question").await.unwrap(), vec!["Plain question"]);
}

#[tokio::test]
async fn template_generator_feeds_hyde() {
    let snapshot = sample_snapshot();
    let pipeline = RetrievalPipeline::new().with_generator(Arc::new(TemplateGenerator::default()));
    let config = PipelineConfig { hyde: true, ..PipelineConfig::default() };
    let report = pipeline.retrieve_detailed("OAuth2 tokens?", &config, &snapshot).await.unwrap();
    assert!(report.sub_queries[0].scored_text.starts_with("OAuth2 tokens. "));
}

#[tokio::test]
async fn embedding_snapshot_requires_matching_provider() {
    let embedder = Arc::new(HashedEmbedder::new(256).unwrap());
    let snapshot = Indexer::new(ChunkerConfig::default()).with_embedder(embedder.clone()).index(sample_documents()).unwrap();
    assert_eq!(snapshot.embedder_id(), Some("hashed:xxh64:d256"));
    assert_eq!(snapshot.embedding("doc1:0").map(Vec::len), Some(256));

    let query = snapshot.chunk("doc1:0").unwrap().text.clone();
    let results = RetrievalPipeline::new()
        .with_embedder(embedder)
        .retrieve(&query, &PipelineConfig { resolve_parents: true, ..PipelineConfig::default() }, &snapshot)
        .await
        .unwrap();
    assert_eq!(results[0].item_id, "doc1");
    assert_eq!(results[0].origin_chunk_id.as_deref(), Some("doc1:0"));
    assert!((results[0].score - 1.0).abs() < 1e-5);

    let other = RetrievalPipeline::new().with_embedder(Arc::new(HashedEmbedder::new(32).unwrap()));
    assert!(matches!(
        other.retrieve("q", &PipelineConfig::default(), &snapshot).await,
        Err(Error::EmbedderMismatch { .. })
    ));
    let lexical_only = sample_snapshot();
    assert!(matches!(
        other.retrieve("q", &PipelineConfig::default(), &lexical_only).await,
        Err(Error::EmbedderMismatch { .. })
    ));
}

#[tokio::test]
async fn snapshot_survives_persistence() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("nested/snapshot.json");
    let snapshot = sample_snapshot();
    snapshot.save_json(&path).unwrap();

    let loaded = IndexSnapshot::load_json(&path).unwrap();
    assert_eq!(loaded.chunks(), snapshot.chunks());
    assert_eq!(loaded.documents(), snapshot.documents());
    assert!(loaded.document("doc4").is_some());

    let config = PipelineConfig { rerank: true, ..PipelineConfig::default() };
    let pipeline = RetrievalPipeline::new();
    assert_eq!(
        pipeline.retrieve("Python SDK", &config, &loaded).await.unwrap(),
        pipeline.retrieve("Python SDK", &config, &snapshot).await.unwrap()
    );
}

#[tokio::test]
async fn date_filters_match_before_and_after_persistence() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("snapshot.json");
    let snapshot = sample_snapshot();
    snapshot.save_json(&path).unwrap();
    let loaded = IndexSnapshot::load_json(&path).unwrap();
    assert_eq!(loaded.document("doc1").unwrap().metadata, snapshot.document("doc1").unwrap().metadata);

    let from_json: FilterSpec = serde_json::from_str(r#"{"date": {"gte": "2024-01-01"}, "language": "python"}"#).unwrap();
    let built = FilterSpec::new().gte("date", "2024-01-01").eq("language", "python");
    let pipeline = RetrievalPipeline::new();
    for filters in [from_json, built] {
        let config = PipelineConfig { filters: Some(filters), top_k: 10, resolve_parents: true, ..PipelineConfig::default() };
        for snap in [&snapshot, &loaded] {
            let results = pipeline.retrieve("python", &config, snap).await.unwrap();
            let found: BTreeSet<&str> = ids(&results).into_iter().collect();
            assert_eq!(found, BTreeSet::from(["doc1", "doc4", "doc5"]));
        }
    }
}

#[test]
fn loading_embeddings_checks_coverage_and_dimension() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("snapshot.json");
    let embedder = Arc::new(HashedEmbedder::new(8).unwrap());
    Indexer::new(ChunkerConfig::default()).with_embedder(embedder).index(sample_documents()).unwrap().save_json(&path).unwrap();
    assert!(IndexSnapshot::load_json(&path).is_ok());

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let mut missing = saved.clone();
    missing["embeddings"].as_object_mut().unwrap().remove("doc1:0");
    std::fs::write(&path, missing.to_string()).unwrap();
    assert!(matches!(IndexSnapshot::load_json(&path), Err(Error::Persist(msg)) if msg.contains("doc1:0")));

    let mut ragged = saved;
    ragged["embeddings"]["doc3:0"] = serde_json::json!([0.5, 0.5]);
    std::fs::write(&path, ragged.to_string()).unwrap();
    assert!(matches!(IndexSnapshot::load_json(&path), Err(Error::Persist(_))));
}

#[tokio::test]
async fn single_retrieval_ignores_multi_stage_switches() {
    let snapshot = sample_snapshot();
    let pipeline = RetrievalPipeline::new().with_decomposer(Arc::new(ScriptedDecomposer(vec!["JavaScript SDK", "Legacy API"])));
    let config = PipelineConfig { hyde: true, decompose: true, rerank: true, top_k: 3, ..PipelineConfig::default() };
    assert!(pipeline.retrieve("OAuth2 tokens", &config, &snapshot).await.is_err());

    let single = pipeline.retrieve_single("OAuth2 tokens", &config, &snapshot).await.unwrap();
    assert_eq!(single.len(), 3);
    assert!(single.iter().all(|r| r.source_sub_query.is_none()));

    let plain = PipelineConfig { top_k: 3, ..PipelineConfig::default() };
    assert_eq!(single, pipeline.retrieve("OAuth2 tokens", &plain, &snapshot).await.unwrap());
}

#[test]
fn loading_garbage_is_a_persist_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("snapshot.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(IndexSnapshot::load_json(&path), Err(Error::Persist(_))));
    assert!(matches!(IndexSnapshot::load_json(&tmp.path().join("missing.json")), Err(Error::Persist(_))));
}

#[test]
fn snapshot_cell_swaps_whole_snapshots() {
    let cell = SnapshotCell::new(sample_snapshot());
    let held = cell.current();
    let previous = cell.replace(index(vec![Document::new("only", "Just one.")], &ChunkerConfig::default()).unwrap());
    assert_eq!(previous.documents().len(), 6);
    assert_eq!(held.documents().len(), 6);
    assert_eq!(cell.current().documents().len(), 1);
}

mod fusion_props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn fused_ids_are_unique_and_first_seen(lists in prop::collection::vec(prop::collection::vec(0u8..8, 0..6), 0..4)) {
            let input: Vec<Vec<ScoredResult>> = lists
                .iter()
                .map(|l| l.iter().map(|n| hit(&format!("c{n}"), 0.5)).collect())
                .collect();
            let fused = fuse_first_seen(input);

            let mut expected: Vec<String> = Vec::new();
            for n in lists.iter().flatten() {
                let id = format!("c{n}");
                if !expected.contains(&id) { expected.push(id); }
            }
            let got: Vec<String> = fused.iter().map(|r| r.item_id.clone()).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
