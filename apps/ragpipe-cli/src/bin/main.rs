use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use ragpipe_core::config::{expand_path, Config, Settings};
use ragpipe_core::traits::EmbeddingProvider;
use ragpipe_core::{FilterSpec, PipelineConfig};
use ragpipe_embed::{HashedEmbedder, VectorKeywordScorer};
use ragpipe_pipeline::{Indexer, IndexSnapshot, RetrievalPipeline, RuleDecomposer, TemplateGenerator};
use ragpipe_text::{CorpusLoader, SemanticChunker};

const HASHED_DIM: usize = 256;

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {prog} <command> [args...]");
    eprintln!("  index [data_dir] [--embed keyword|hashed] [--limit N]");
    eprintln!("  query \"<query>\" [--top-k N] [--rerank] [--decompose] [--hyde] [--parents] [--filter '<json>']");
    eprintln!("  decompose \"<query>\"");
    eprintln!("  chunk <file.txt>");
    std::process::exit(1);
}

fn parse_args() -> (String, String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() { usage(&prog); }
    let cmd = args.remove(0);
    (prog, cmd, args)
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).map(String::as_str)
}

fn positional(args: &[String]) -> Option<&str> {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--embed" | "--limit" | "--top-k" | "--filter" => i += 2,
            a if a.starts_with('-') => i += 1,
            a => return Some(a),
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let settings = config.settings()?;
    let (prog, cmd, args) = parse_args();
    match cmd.as_str() {
        "index" => run_index(&settings, &args),
        "query" => {
            let query = positional(&args).unwrap_or_else(|| usage(&prog)).to_string();
            tokio::runtime::Runtime::new()?.block_on(run_query(&settings, &query, &args))
        }
        "decompose" => {
            let query = positional(&args).unwrap_or_else(|| usage(&prog));
            for (i, sub) in RuleDecomposer::from_config(&settings.decomposer).split(query).iter().enumerate() {
                println!("{}. {sub}", i + 1);
            }
            Ok(())
        }
        "chunk" => {
            let file = positional(&args).map(PathBuf::from).unwrap_or_else(|| usage(&prog));
            run_chunk(&settings, &file)
        }
        _ => { eprintln!("Unknown command: {cmd}"); usage(&prog) }
    }
}

fn embedder_named(name: &str, settings: &Settings) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match name {
        "keyword" => Ok(Arc::new(VectorKeywordScorer::from_config(&settings.keywords)?)),
        "hashed" => Ok(Arc::new(HashedEmbedder::new(HASHED_DIM)?)),
        other => bail!("unknown embedder '{other}' (expected keyword or hashed)"),
    }
}

/// Rebuilds the provider a snapshot was indexed with from its id.
fn embedder_for_snapshot(snapshot: &IndexSnapshot, settings: &Settings) -> anyhow::Result<Option<Arc<dyn EmbeddingProvider>>> {
    let Some(id) = snapshot.embedder_id() else { return Ok(None) };
    let provider: Arc<dyn EmbeddingProvider> = if id.starts_with("keyword:") {
        Arc::new(VectorKeywordScorer::from_config(&settings.keywords)?)
    } else if let Some(dim) = id.strip_prefix("hashed:xxh64:d") {
        Arc::new(HashedEmbedder::new(dim.parse().with_context(|| format!("bad embedder id '{id}'"))?)?)
    } else {
        bail!("snapshot uses unknown embedder '{id}'");
    };
    Ok(Some(provider))
}

fn run_index(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let data_dir = positional(args).map(expand_path).unwrap_or_else(|| expand_path(&settings.data.raw_txt_dir));
    let limit = flag_value(args, "--limit").map(str::parse::<usize>).transpose().context("--limit requires a number")?;
    println!("Data directory: {}", data_dir.display());

    let loader = match limit {
        Some(limit) => CorpusLoader::limited(limit),
        None => CorpusLoader::new(),
    };
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let documents = loader.load_dir_with(&data_dir, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;
    pb.finish_with_message("loaded");

    let mut indexer = Indexer::new(settings.chunker.clone());
    if let Some(name) = flag_value(args, "--embed") {
        indexer = indexer.with_embedder(embedder_named(name, settings)?);
    }
    let snapshot = indexer.index(documents)?;
    let out = expand_path(&settings.data.snapshot_path);
    snapshot.save_json(&out)?;
    println!("Indexed {} documents into {} chunks -> {}", snapshot.documents().len(), snapshot.chunks().len(), out.display());
    Ok(())
}

async fn run_query(settings: &Settings, query: &str, args: &[String]) -> anyhow::Result<()> {
    let path = expand_path(&settings.data.snapshot_path);
    let snapshot = IndexSnapshot::load_json(&path).with_context(|| format!("run `index` first to create {}", path.display()))?;

    let has = |flag: &str| args.iter().any(|a| a == flag);
    let mut config = PipelineConfig {
        rerank: settings.pipeline.rerank || has("--rerank"),
        decompose: settings.pipeline.decompose || has("--decompose"),
        hyde: settings.pipeline.hyde || has("--hyde"),
        resolve_parents: settings.pipeline.resolve_parents || has("--parents"),
        ..settings.pipeline.clone()
    };
    if let Some(k) = flag_value(args, "--top-k") {
        config.top_k = k.parse().map_err(|_| anyhow!("--top-k requires a number"))?;
    }
    if let Some(raw) = flag_value(args, "--filter") {
        config.filters = Some(serde_json::from_str::<FilterSpec>(raw).context("--filter must be a JSON object")?);
    }

    let decomposer = RuleDecomposer::from_config(&settings.decomposer);
    let mut pipeline = RetrievalPipeline::new()
        .with_decomposer(Arc::new(decomposer))
        .with_generator(Arc::new(TemplateGenerator::new(RuleDecomposer::from_config(&settings.decomposer))));
    if let Some(embedder) = embedder_for_snapshot(&snapshot, settings)? {
        pipeline = pipeline.with_embedder(embedder);
    }

    let report = pipeline.retrieve_detailed(query, &config, &snapshot).await?;
    println!("Query: {query}");
    for sub in &report.sub_queries {
        println!("  sub-query: {} ({} candidates)", sub.sub_query, sub.candidates.len());
    }
    for failure in &report.failures {
        println!("  failed: {failure}");
    }
    println!("\nFound {} results", report.results.len());
    for (i, hit) in report.results.iter().enumerate() {
        println!("\n  {}. score={:.4}  id={}", i + 1, hit.score, hit.item_id);
        if let Some(chunk) = &hit.origin_chunk_id { println!("     via chunk {chunk}"); }
        println!("     {}", preview(&hit.payload, 160));
    }
    Ok(())
}

fn run_chunk(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let id = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "doc".to_string());
    let chunks = SemanticChunker::new(settings.chunker.clone()).chunk_text(&id, &text);
    println!("{} chunks (threshold {})", chunks.len(), settings.chunker.similarity_threshold);
    for chunk in &chunks {
        println!("\n[{}] topic={} sentences={} chars={}", chunk.id, chunk.topic, chunk.sentence_count, chunk.char_count);
        println!("  {}", preview(&chunk.text, 200));
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars { return text.to_string(); }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}
