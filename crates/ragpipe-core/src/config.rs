//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `ragpipe.toml` + `ragpipe.<env>.toml` + `RAGPIPE_*`
//! env vars (`__` separates nested keys, e.g. `RAGPIPE_PIPELINE__TOP_K=10`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{ChunkerConfig, PipelineConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposerConfig {
    /// Subject pairs recognised by the comparison rule.
    pub comparison_pairs: Vec<(String, String)>,
    pub benefit_markers: Vec<String>,
    pub drawback_markers: Vec<String>,
    /// Subject filled into the benefits/drawbacks templates.
    pub subject: String,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            comparison_pairs: vec![("asyncio".to_string(), "threading".to_string())],
            benefit_markers: vec!["benefit".to_string(), "advantage".to_string()],
            drawback_markers: vec!["drawback".to_string(), "disadvantage".to_string()],
            subject: "RAG systems".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub keywords: Vec<String>,
    /// Occurrence count that saturates a dimension at 1.0.
    pub normalization: f32,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        let keywords = ["rag", "retrieval", "semantic", "vector", "embedding", "search", "llm", "context", "query", "rerank"];
        Self { keywords: keywords.iter().map(|k| (*k).to_string()).collect(), normalization: 2.0 }
    }
}

/// Paths may use `~` and `$VAR`; run them through [`expand_path`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_txt_dir: String,
    pub snapshot_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { raw_txt_dir: "./data/txt".to_string(), snapshot_path: "./data/snapshot.json".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunker: ChunkerConfig,
    pub pipeline: PipelineConfig,
    pub decomposer: DecomposerConfig,
    pub keywords: KeywordConfig,
    pub data: DataConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        self.pipeline.validate()?;
        if self.keywords.keywords.is_empty() {
            return Err(Error::InvalidConfig("keywords.keywords must not be empty".to_string()));
        }
        if self.keywords.normalization <= 0.0 {
            return Err(Error::InvalidConfig(format!("keywords.normalization must be > 0, got {}", self.keywords.normalization)));
        }
        if self.decomposer.subject.trim().is_empty() {
            return Err(Error::InvalidConfig("decomposer.subject must not be empty".to_string()));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(Path::new("."), &env_name)
    }

    /// Loads `ragpipe.toml` and the env-specific overlay from `dir`.
    pub fn load_for_env(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("ragpipe.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("ragpipe.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("ragpipe.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("ragpipe.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("RAGPIPE_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to extract settings: {e}")))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
