//! ragpipe-embed
//!
//! Embedding providers and vector similarity: a keyword-presence embedder with
//! a fixed vocabulary, a hashing embedder for tests, and an adapter that turns
//! any provider into a text scorer.

pub mod cosine;
pub mod hashed;
pub mod keyword;
pub mod provider;

pub use cosine::cosine;
pub use hashed::HashedEmbedder;
pub use keyword::VectorKeywordScorer;
pub use provider::EmbeddingScorer;
