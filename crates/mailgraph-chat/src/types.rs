//! Data types shared across the query engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailgraph_core::{Entity, PathNode};

// =============================================================================
// Intent classification
// =============================================================================

/// Query shape recognised by the pattern matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    EntityLookup,
    Relationship,
    PathFinding,
    ConceptSearch,
    Aggregation,
    Ambiguous,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::EntityLookup => "entity_lookup",
            Intent::Relationship => "relationship",
            Intent::PathFinding => "path_finding",
            Intent::ConceptSearch => "concept_search",
            Intent::Aggregation => "aggregation",
            Intent::Ambiguous => "ambiguous",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`PatternMatcher::classify`](crate::patterns::PatternMatcher::classify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub intent: Intent,
    /// Extracted arguments (`name`, `entity`, `source`, `target`, `concept`,
    /// `relationship_type`, `direction`, `entity_type`).
    pub args: BTreeMap<String, String>,
    pub ambiguous: bool,
    /// Disambiguation candidates, non-empty only when `ambiguous`.
    pub options: Vec<String>,
}

impl MatchResult {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            args: BTreeMap::new(),
            ambiguous: false,
            options: Vec::new(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(Intent::Unknown)
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

// =============================================================================
// Conversation state
// =============================================================================

/// One completed query/response turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// An entity referenced earlier in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    /// Upsert order within the owning context; breaks timestamp ties.
    #[serde(default)]
    pub sequence: u64,
}

// =============================================================================
// Results
// =============================================================================

/// Human-readable text plus the entities it describes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormattedResponse {
    pub text: String,
    pub entities: Vec<Entity>,
}

impl FormattedResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

/// Outcome of one successfully processed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub text: String,
    /// Name of the operation that produced the answer.
    pub action: String,
    pub entities: Vec<Entity>,
    /// Populated for path-finding answers.
    pub path: Vec<PathNode>,
}

impl QueryResult {
    pub fn from_formatted(action: &str, formatted: FormattedResponse) -> Self {
        Self {
            text: formatted.text,
            action: action.to_string(),
            entities: formatted.entities,
            path: Vec::new(),
        }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: "answer".to_string(),
            entities: Vec::new(),
            path: Vec::new(),
        }
    }
}
