//! Offline [`TextGenerator`] built from fixed templates.

use async_trait::async_trait;

use ragpipe_core::traits::TextGenerator;

use crate::decompose::RuleDecomposer;

/// Writes a hypothetical answer by restating the question as prose and
/// decomposes with a [`RuleDecomposer`]. Useful when no model is available.
#[derive(Default)]
pub struct TemplateGenerator {
    rules: RuleDecomposer,
}

impl TemplateGenerator {
    pub fn new(rules: RuleDecomposer) -> Self { Self { rules } }

    pub fn hypothesis_for(query: &str) -> String {
        let topic = query.trim().trim_end_matches('?').trim();
        format!("{topic}. This passage explains {topic} in detail and describes how {topic} works in practice.")
    }
}

#[async_trait]
impl TextGenerator for TemplateGenerator {
    async fn generate_hypothesis(&self, query: &str) -> anyhow::Result<String> { Ok(Self::hypothesis_for(query)) }

    async fn decompose(&self, query: &str) -> anyhow::Result<Vec<String>> { Ok(self.rules.split(query)) }
}
