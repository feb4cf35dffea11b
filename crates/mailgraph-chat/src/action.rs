//! Structured action envelopes returned by the language model.

use serde::{Deserialize, Serialize};

use crate::types::{Intent, MatchResult};

/// The `{action, ...params}` object the model is asked to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// `outgoing`, `incoming` or `both`, relative to `entity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// Normalised action names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    EntityLookup,
    Traverse,
    FindPath,
    SemanticSearch,
    Count,
    Answer,
    Unknown(String),
}

impl Action {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "entity_lookup" | "lookup" | "find_entity" => Action::EntityLookup,
            "relationship" | "relationships" | "traverse" => Action::Traverse,
            "path_finding" | "find_path" | "path" => Action::FindPath,
            "semantic_search" | "concept_search" | "search" => Action::SemanticSearch,
            "count" | "aggregation" | "aggregate" => Action::Count,
            "answer" | "respond" => Action::Answer,
            other => Action::Unknown(other.to_string()),
        }
    }

    /// Canonical name reported in results.
    pub fn as_str(&self) -> &str {
        match self {
            Action::EntityLookup => "entity_lookup",
            Action::Traverse => "relationship",
            Action::FindPath => "path_finding",
            Action::SemanticSearch => "semantic_search",
            Action::Count => "count",
            Action::Answer => "answer",
            Action::Unknown(name) => name,
        }
    }
}

impl ActionEnvelope {
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> Action {
        Action::parse(&self.action)
    }

    /// Decode an envelope from model output.
    ///
    /// Accepts bare JSON, a fenced code block, or an object embedded in
    /// prose (first `{` to last `}`). Returns `None` otherwise.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(envelope) = serde_json::from_str::<ActionEnvelope>(trimmed) {
            return Some(envelope);
        }

        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<ActionEnvelope>(&trimmed[start..=end]).ok()
    }

    /// The envelope equivalent to a pattern-matcher classification.
    ///
    /// Ambiguous and unknown results have no envelope.
    pub fn from_match(result: &MatchResult) -> Option<Self> {
        let arg = |key: &str| result.arg(key).map(str::to_string);

        let envelope = match result.intent {
            Intent::EntityLookup => Self {
                entity: arg("name"),
                ..Self::new("entity_lookup")
            },
            Intent::Relationship => Self {
                entity: arg("entity"),
                relationship: arg("relationship_type"),
                entity_type: arg("entity_type"),
                direction: arg("direction"),
                ..Self::new("relationship")
            },
            Intent::PathFinding => Self {
                source: arg("source"),
                target: arg("target"),
                ..Self::new("path_finding")
            },
            Intent::ConceptSearch => Self {
                concept: arg("concept"),
                ..Self::new("semantic_search")
            },
            Intent::Aggregation => Self {
                entity: arg("entity"),
                relationship: arg("relationship_type"),
                entity_type: arg("entity_type"),
                direction: arg("direction"),
                ..Self::new("count")
            },
            Intent::Ambiguous | Intent::Unknown => return None,
        };
        Some(envelope)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!(r#"{{"action":"{}"}}"#, self.action))
    }
}
