//! Structured metadata pre-filtering.
//!
//! A [`FilterSpec`] maps metadata keys to a list of [`Condition`]s. Every key
//! must be present on the document and every condition must hold: there is no
//! OR or NOT composition. On the wire a filter uses the familiar map form:
//!
//! ```json
//! { "version": "v3", "date": { "gte": "2024-01-01" }, "language": { "in": ["python", "rust"] } }
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::{MetaValue, Metadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Eq(MetaValue),
    Gte(MetaValue),
    Lte(MetaValue),
    In(Vec<MetaValue>),
    Ne(MetaValue),
}

impl Condition {
    pub fn holds(&self, value: &MetaValue) -> bool {
        match self {
            Condition::Eq(expected) => value == expected,
            Condition::Ne(unwanted) => value != unwanted,
            Condition::Gte(bound) => matches!(value.compare(bound), Some(Ordering::Greater | Ordering::Equal)),
            Condition::Lte(bound) => matches!(value.compare(bound), Some(Ordering::Less | Ordering::Equal)),
            Condition::In(options) => options.contains(value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, RawCondition>", into = "BTreeMap<String, RawCondition>")]
pub struct FilterSpec {
    clauses: BTreeMap<String, Vec<Condition>>,
}

impl FilterSpec {
    pub fn new() -> Self { Self::default() }

    /// Adds `condition` for `key`, keeping any conditions already present.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, condition: Condition) -> Self {
        self.clauses.entry(key.into()).or_default().push(condition);
        self
    }

    /// Requires `key` to exist without constraining its value.
    #[must_use]
    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.clauses.entry(key.into()).or_default();
        self
    }

    #[must_use]
    pub fn eq(self, key: impl Into<String>, v: impl Into<MetaValue>) -> Self { self.with(key, Condition::Eq(v.into())) }
    #[must_use]
    pub fn ne(self, key: impl Into<String>, v: impl Into<MetaValue>) -> Self { self.with(key, Condition::Ne(v.into())) }
    #[must_use]
    pub fn gte(self, key: impl Into<String>, v: impl Into<MetaValue>) -> Self { self.with(key, Condition::Gte(v.into())) }
    #[must_use]
    pub fn lte(self, key: impl Into<String>, v: impl Into<MetaValue>) -> Self { self.with(key, Condition::Lte(v.into())) }
    #[must_use]
    pub fn one_of<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MetaValue>,
    {
        self.with(key, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn is_empty(&self) -> bool { self.clauses.is_empty() }
    pub fn len(&self) -> usize { self.clauses.len() }
    pub fn keys(&self) -> impl Iterator<Item = &str> { self.clauses.keys().map(String::as_str) }

    pub fn matches(&self, metadata: &Metadata) -> bool { MetadataFilter::matches(metadata, self) }
}

pub struct MetadataFilter;

impl MetadataFilter {
    /// A missing key fails the document; it is never a wildcard.
    pub fn matches(metadata: &Metadata, spec: &FilterSpec) -> bool {
        spec.clauses.iter().all(|(key, conditions)| match metadata.get(key) {
            Some(value) => conditions.iter().all(|c| c.holds(value)),
            None => false,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct OperatorSet {
    #[serde(default, alias = "$eq", skip_serializing_if = "Option::is_none")]
    eq: Option<MetaValue>,
    #[serde(default, alias = "$gte", skip_serializing_if = "Option::is_none")]
    gte: Option<MetaValue>,
    #[serde(default, alias = "$lte", skip_serializing_if = "Option::is_none")]
    lte: Option<MetaValue>,
    #[serde(default, rename = "in", alias = "$in", skip_serializing_if = "Option::is_none")]
    one_of: Option<Vec<MetaValue>>,
    #[serde(default, alias = "$ne", skip_serializing_if = "Option::is_none")]
    ne: Option<MetaValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Operators(OperatorSet),
    Literal(MetaValue),
}

impl From<RawCondition> for Vec<Condition> {
    fn from(raw: RawCondition) -> Self {
        match raw {
            RawCondition::Literal(v) => vec![Condition::Eq(v)],
            RawCondition::Operators(ops) => {
                let mut out = Vec::new();
                if let Some(v) = ops.eq { out.push(Condition::Eq(v)); }
                if let Some(v) = ops.gte { out.push(Condition::Gte(v)); }
                if let Some(v) = ops.lte { out.push(Condition::Lte(v)); }
                if let Some(v) = ops.one_of { out.push(Condition::In(v)); }
                if let Some(v) = ops.ne { out.push(Condition::Ne(v)); }
                out
            }
        }
    }
}

impl From<BTreeMap<String, RawCondition>> for FilterSpec {
    fn from(raw: BTreeMap<String, RawCondition>) -> Self {
        Self { clauses: raw.into_iter().map(|(k, c)| (k, c.into())).collect() }
    }
}

// A repeated operator on one key collapses to its last occurrence.
impl From<FilterSpec> for BTreeMap<String, RawCondition> {
    fn from(spec: FilterSpec) -> Self {
        spec.clauses
            .into_iter()
            .map(|(key, conditions)| {
                let raw = match conditions.as_slice() {
                    [Condition::Eq(v)] => RawCondition::Literal(v.clone()),
                    _ => {
                        let mut ops = OperatorSet::default();
                        for c in conditions {
                            match c {
                                Condition::Eq(v) => ops.eq = Some(v),
                                Condition::Gte(v) => ops.gte = Some(v),
                                Condition::Lte(v) => ops.lte = Some(v),
                                Condition::In(v) => ops.one_of = Some(v),
                                Condition::Ne(v) => ops.ne = Some(v),
                            }
                        }
                        RawCondition::Operators(ops)
                    }
                };
                (key, raw)
            })
            .collect()
    }
}
