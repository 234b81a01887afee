#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! ragpipe-core
//!
//! Data model, capability traits, metadata filtering and configuration shared
//! by every stage of the retrieval pipeline.

pub mod config;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use error::{Error, Result, SubQueryFailure};
pub use filter::{Condition, FilterSpec, MetadataFilter};
pub use types::{Chunk, ChunkerConfig, Document, MetaValue, Metadata, PipelineConfig, ScoredResult};
