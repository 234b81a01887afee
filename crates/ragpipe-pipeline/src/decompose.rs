//! Query decomposition.
//!
//! [`RuleDecomposer`] walks an ordered list of [`DecompositionRule`]s and
//! returns the output of the first one that fires, falling back to the query
//! itself. [`GeneratorDecomposer`] asks a [`TextGenerator`] instead.

use async_trait::async_trait;
use std::sync::Arc;

use ragpipe_core::config::DecomposerConfig;
use ragpipe_core::error::{Error, Result};
use ragpipe_core::traits::{QueryDecomposer, TextGenerator};

pub trait DecompositionRule: Send + Sync {
    fn name(&self) -> &str;
    /// `lower` is `query` lowercased. `None` (or an empty list) passes to the next rule.
    fn apply(&self, query: &str, lower: &str) -> Option<Vec<String>>;
}

/// `"compare"` or `" vs "` plus both subjects of a configured pair.
pub struct ComparisonRule {
    pairs: Vec<(String, String)>,
}

impl ComparisonRule {
    pub fn new(pairs: Vec<(String, String)>) -> Self { Self { pairs } }
}

impl DecompositionRule for ComparisonRule {
    fn name(&self) -> &str { "comparison" }

    fn apply(&self, _query: &str, lower: &str) -> Option<Vec<String>> {
        if !(lower.contains("compare") || lower.contains(" vs ")) {
            return None;
        }
        let (a, b) = self
            .pairs
            .iter()
            .find(|(a, b)| lower.contains(&a.to_lowercase()) && lower.contains(&b.to_lowercase()))?;
        Some(vec![
            format!("What is {a} and how does it work?"),
            format!("What is {b} and how does it work?"),
            format!("What are the key differences between {a} and {b}?"),
        ])
    }
}

/// Benefit and drawback markers both present.
pub struct TradeoffRule {
    benefit_markers: Vec<String>,
    drawback_markers: Vec<String>,
    subject: String,
}

impl TradeoffRule {
    pub fn new(benefit_markers: Vec<String>, drawback_markers: Vec<String>, subject: impl Into<String>) -> Self {
        Self { benefit_markers, drawback_markers, subject: subject.into() }
    }
}

impl DecompositionRule for TradeoffRule {
    fn name(&self) -> &str { "tradeoff" }

    fn apply(&self, _query: &str, lower: &str) -> Option<Vec<String>> {
        let mentions = |markers: &[String]| markers.iter().any(|m| lower.contains(&m.to_lowercase()));
        if !(mentions(&self.benefit_markers) && mentions(&self.drawback_markers)) {
            return None;
        }
        let s = &self.subject;
        Some(vec![
            format!("What are the benefits of {s}?"),
            format!("What are the drawbacks of {s}?"),
            format!("When should you use {s}?"),
        ])
    }
}

/// Multi-step "how ... and ..." questions.
pub struct ProceduralRule;

impl DecompositionRule for ProceduralRule {
    fn name(&self) -> &str { "procedural" }

    fn apply(&self, _query: &str, lower: &str) -> Option<Vec<String>> {
        if !(lower.contains("how") && lower.contains(" and ")) {
            return None;
        }
        Some(vec![
            "How do I set up the feature?".to_string(),
            "How do I use the feature?".to_string(),
            "What are common issues?".to_string(),
        ])
    }
}

/// Splits the query as given on `" and "` and makes each part a question.
///
/// The split is case-sensitive on the raw text even though the match is
/// not, so `"X AND Y"` fires but yields a single part.
pub struct ConjunctionRule;

impl DecompositionRule for ConjunctionRule {
    fn name(&self) -> &str { "conjunction" }

    fn apply(&self, query: &str, lower: &str) -> Option<Vec<String>> {
        if !lower.contains(" and ") {
            return None;
        }
        let parts: Vec<String> = query
            .split(" and ")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| if p.ends_with('?') { p.to_string() } else { format!("{p}?") })
            .collect();
        (!parts.is_empty()).then_some(parts)
    }
}

pub struct RuleDecomposer {
    rules: Vec<Box<dyn DecompositionRule>>,
}

impl RuleDecomposer {
    /// No rules: every query passes through unchanged.
    pub fn empty() -> Self { Self { rules: Vec::new() } }

    pub fn from_config(config: &DecomposerConfig) -> Self {
        Self::empty()
            .with_rule(ComparisonRule::new(config.comparison_pairs.clone()))
            .with_rule(TradeoffRule::new(
                config.benefit_markers.clone(),
                config.drawback_markers.clone(),
                config.subject.clone(),
            ))
            .with_rule(ProceduralRule)
            .with_rule(ConjunctionRule)
    }

    /// Appends a rule after the existing ones.
    #[must_use]
    pub fn with_rule(mut self, rule: impl DecompositionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Inserts a rule at `position` (clamped to the end).
    #[must_use]
    pub fn with_rule_at(mut self, position: usize, rule: impl DecompositionRule + 'static) -> Self {
        let at = position.min(self.rules.len());
        self.rules.insert(at, Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&str> { self.rules.iter().map(|r| r.name()).collect() }

    pub fn split(&self, query: &str) -> Vec<String> {
        let lower = query.to_lowercase();
        for rule in &self.rules {
            if let Some(parts) = rule.apply(query, &lower).filter(|p| !p.is_empty()) {
                tracing::debug!(rule = rule.name(), parts = parts.len(), "decomposed query");
                return parts;
            }
        }
        vec![query.to_string()]
    }
}

impl Default for RuleDecomposer {
    fn default() -> Self { Self::from_config(&DecomposerConfig::default()) }
}

#[async_trait]
impl QueryDecomposer for RuleDecomposer {
    async fn decompose(&self, query: &str) -> Result<Vec<String>> { Ok(self.split(query)) }
}

pub struct GeneratorDecomposer {
    generator: Arc<dyn TextGenerator>,
}

impl GeneratorDecomposer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self { Self { generator } }
}

#[async_trait]
impl QueryDecomposer for GeneratorDecomposer {
    async fn decompose(&self, query: &str) -> Result<Vec<String>> {
        let parts: Vec<String> = self
            .generator
            .decompose(query)
            .await?
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            return Err(Error::EmptyDecomposition(query.to_string()));
        }
        Ok(parts)
    }
}
