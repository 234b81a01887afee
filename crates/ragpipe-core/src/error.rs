use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why one sub-query of a fan-out produced no hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQueryFailure {
    pub sub_query: String,
    pub reason: String,
}

impl fmt::Display for SubQueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.sub_query, self.reason)
    }
}

struct FailureList<'a>(&'a [SubQueryFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 { f.write_str("; ")?; }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate document id: {0}")]
    DuplicateDocument(String),

    #[error("Embedder mismatch: snapshot was built with '{expected}', pipeline uses '{actual}'")]
    EmbedderMismatch { expected: String, actual: String },

    /// A decomposer broke its contract by returning no sub-queries.
    #[error("Decomposer returned no sub-queries for '{0}'")]
    EmptyDecomposition(String),

    #[error("Malformed candidate: {0}")]
    MalformedCandidate(String),

    #[error("Sub-query timed out: {0}")]
    SubQueryTimeout(String),

    #[error("All sub-queries failed: {}", FailureList(.0))]
    AllSubQueriesFailed(Vec<SubQueryFailure>),

    #[error("Persistence failed: {0}")]
    Persist(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
