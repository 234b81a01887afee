#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! ragpipe-pipeline
//!
//! Index snapshots and the composable retrieval pipeline built on them.

pub mod decompose;
pub mod fusion;
pub mod generator;
pub mod index;
pub mod parent;
pub mod pipeline;
pub mod rerank;

pub use decompose::{DecompositionRule, GeneratorDecomposer, RuleDecomposer};
pub use fusion::fuse_first_seen;
pub use generator::TemplateGenerator;
pub use index::{index, IndexSnapshot, Indexer, SnapshotCell};
pub use parent::resolve_parents;
pub use pipeline::{RetrievalPipeline, RetrievalReport, SubQueryReport};
pub use rerank::{rerank, PhraseReranker};
