//! ragpipe-text
//!
//! Sentence splitting, lexical similarity and topic-boundary chunking, plus a
//! loader that turns a directory of `.txt` files into documents.

pub mod chunker;
pub mod corpus;
pub mod lexical;
pub mod sentence;
pub mod topic;

pub use chunker::SemanticChunker;
pub use corpus::CorpusLoader;
pub use lexical::LexicalJaccardScorer;
pub use sentence::split_sentences;
