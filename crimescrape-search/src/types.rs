//! Core data model: queries, risk levels, notices and results.
//!
//! The serialized form of [`SourceResult`] and [`AggregateResult`] is a
//! contract other tooling matches on byte for byte:
//!
//! ```text
//! { "risk": "Low"|"Medium"|"High"|"Dangerous",
//!   "notices": { "<key>": { "id": "<string>", "charges": ["<string>", ...] } } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// A person lookup: a whitespace-normalised first/last name pair.
///
/// The original casing is kept for modules that forward it upstream;
/// [`Query::cache_key`] is case-folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawQuery")]
pub struct Query {
    first_name: String,
    last_name: String,
}

/// Wire shape accepted for queries. `fname`/`lname` is the query-file format.
#[derive(Deserialize)]
struct RawQuery {
    #[serde(alias = "fname")]
    first_name: String,
    #[serde(alias = "lname")]
    last_name: String,
}

impl TryFrom<RawQuery> for Query {
    type Error = SearchError;

    fn try_from(raw: RawQuery) -> Result<Self, Self::Error> {
        Self::new(&raw.first_name, &raw.last_name)
    }
}

impl Query {
    /// Build a query, trimming and collapsing whitespace in both names.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] if either name is empty after
    /// normalisation.
    pub fn new(first_name: &str, last_name: &str) -> Result<Self, SearchError> {
        let first_name = normalise_whitespace(first_name);
        let last_name = normalise_whitespace(last_name);
        if first_name.is_empty() {
            return Err(SearchError::InvalidQuery("first name is empty".into()));
        }
        if last_name.is_empty() {
            return Err(SearchError::InvalidQuery("last name is empty".into()));
        }
        Ok(Self {
            first_name,
            last_name,
        })
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// `"First Last"` as given, whitespace-normalised.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Case-folded key used by the cache layer.
    pub fn cache_key(&self) -> String {
        format!(
            "{} {}",
            self.first_name.to_lowercase(),
            self.last_name.to_lowercase()
        )
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

fn normalise_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Risk rating attached to a source result.
///
/// Ordered from least to most severe. The serialized spelling is
/// case-sensitive and part of the output contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Dangerous,
}

impl RiskLevel {
    /// The exact literal used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Dangerous => "Dangerous",
        }
    }

    /// All levels, least severe first.
    pub fn all() -> &'static [RiskLevel] {
        &[Self::Low, Self::Medium, Self::High, Self::Dangerous]
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::all().iter().map(RiskLevel::as_str).collect();
                SearchError::Schema(format!(
                    "invalid risk level: {s:?} (expected one of {})",
                    valid.join(", ")
                ))
            })
    }
}

/// One identified record within a source result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Upstream identifier; empty when the source exposes none.
    pub id: String,
    /// Charges or listing reasons, in source order.
    pub charges: Vec<String>,
}

impl Notice {
    pub fn new(id: impl Into<String>, charges: Vec<String>) -> Self {
        Self {
            id: id.into(),
            charges,
        }
    }
}

/// A single source module's answer for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResult {
    pub risk: RiskLevel,
    /// Notices keyed by notice type.
    ///
    /// Iteration and serialized output follow key order, not the order in
    /// which notices were added.
    pub notices: BTreeMap<String, Notice>,
}

impl SourceResult {
    /// A result with the given risk and no notices yet.
    pub fn new(risk: RiskLevel) -> Self {
        Self {
            risk,
            notices: BTreeMap::new(),
        }
    }

    /// Add (or replace) a notice under `key`.
    pub fn with_notice(mut self, key: impl Into<String>, notice: Notice) -> Self {
        self.notices.insert(key.into(), notice);
        self
    }
}

/// Union of every module's result for one query, keyed by module identifier.
///
/// An empty aggregate is a valid outcome: no source found anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateResult(BTreeMap<String, SourceResult>);

impl AggregateResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `result` for `module`, replacing any earlier entry.
    pub fn insert(&mut self, module: impl Into<String>, result: SourceResult) {
        self.0.insert(module.into(), result);
    }

    pub fn get(&self, module: &str) -> Option<&SourceResult> {
        self.0.get(module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.0.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Module identifiers present, in sorted order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SourceResult)> {
        self.0.iter()
    }

    /// Highest risk reported by any module, if any module reported.
    pub fn highest_risk(&self) -> Option<RiskLevel> {
        self.0.values().map(|r| r.risk).max()
    }

    pub fn into_inner(self) -> BTreeMap<String, SourceResult> {
        self.0
    }
}

impl FromIterator<(String, SourceResult)> for AggregateResult {
    fn from_iter<I: IntoIterator<Item = (String, SourceResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a lookup was satisfied, as reported to transport consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Produced by a live orchestrator run.
    Fresh,
    /// Served from the cache (fresh or stale).
    Cached,
    /// No usable result could be produced.
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Cached => "cached",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
