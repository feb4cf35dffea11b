//! Conversation context management.
//!
//! Keeps a bounded window of recent turns and a registry of entities the
//! conversation has touched, resolves pronouns against that registry, and
//! renders both into the context block of an LLM prompt.

use std::collections::{BTreeMap, VecDeque};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChatError;
use crate::types::{HistoryEntry, TrackedEntity};

/// Turns retained when no explicit window is configured.
pub const DEFAULT_MAX_HISTORY: usize = 5;

static PRONOUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:he|she|it|they|him|her|them|his|hers|their)\b")
        .expect("Invalid pronoun regex")
});

/// Whether `word` is one of the pronouns the context can resolve.
pub fn is_pronoun(word: &str) -> bool {
    let trimmed = word.trim();
    PRONOUN_RE
        .find(trimmed)
        .is_some_and(|m| m.start() == 0 && m.end() == trimmed.len())
}

// =============================================================================
// ConversationContext
// =============================================================================

/// Per-conversation state: turn history plus tracked entities.
///
/// Not internally synchronized. Hosts serving concurrent turns against one
/// conversation must serialize access (e.g. `tokio::sync::Mutex`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    id: Uuid,
    max_history: usize,
    history: VecDeque<HistoryEntry>,
    entities: BTreeMap<String, TrackedEntity>,
    next_sequence: u64,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationContext {
    /// Create an empty context with the default five-turn window.
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Create an empty context retaining at most `max_history` turns.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            max_history,
            history: VecDeque::with_capacity(max_history),
            entities: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Recent turns, oldest first.
    pub fn history(&self) -> &VecDeque<HistoryEntry> {
        &self.history
    }

    /// Tracked entities ordered by name.
    pub fn tracked_entities(&self) -> Vec<&TrackedEntity> {
        self.entities.values().collect()
    }

    pub fn get_entity(&self, name: &str) -> Option<&TrackedEntity> {
        self.entities.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.entities.is_empty()
    }

    /// Append a turn, evicting the oldest once the window is full.
    pub fn add_turn(&mut self, query: &str, response: &str) {
        self.history.push_back(HistoryEntry {
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// Record that `name` was mentioned. Re-tracking a name overwrites its
    /// type, id, and timestamp in place.
    pub fn track_entity(&mut self, name: &str, entity_type: &str, id: i64) {
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!("Ignoring blank entity name");
            return;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.entities.insert(
            name.to_string(),
            TrackedEntity {
                name: name.to_string(),
                entity_type: entity_type.to_string(),
                id,
                timestamp: Utc::now(),
                sequence,
            },
        );
    }

    /// Resolve a pronoun in `query` to the most recently tracked entity.
    ///
    /// Returns `None` when the query has no pronoun or nothing is tracked.
    pub fn resolve_pronoun(&self, query: &str) -> Option<&TrackedEntity> {
        if !PRONOUN_RE.is_match(query) {
            return None;
        }
        self.most_recent_entity()
    }

    /// The entity with the latest timestamp (latest upsert on ties).
    pub fn most_recent_entity(&self) -> Option<&TrackedEntity> {
        self.entities
            .values()
            .max_by_key(|e| (e.timestamp, e.sequence))
    }

    /// Render history, tracked entities, a pronoun hint, and the query.
    ///
    /// Each section is omitted when it has nothing to show; the query line
    /// is always present.
    pub fn build_prompt_context(&self, query: &str) -> String {
        let mut out = String::new();

        if !self.history.is_empty() {
            out.push_str("Previous conversation:\n");
            for entry in &self.history {
                out.push_str(&format!("User: {}\n", entry.query));
                out.push_str(&format!("Assistant: {}\n", entry.response));
            }
            out.push('\n');
        }

        if !self.entities.is_empty() {
            out.push_str("Mentioned entities:\n");
            for entity in self.entities.values() {
                out.push_str(&format!(
                    "- {} ({}, ID: {})\n",
                    entity.name, entity.entity_type, entity.id
                ));
            }
            out.push('\n');
        }

        if let Some(entity) = self.resolve_pronoun(query) {
            out.push_str(&format!(
                "Note: pronouns in the current query most likely refer to {} ({}, ID: {}).\n\n",
                entity.name, entity.entity_type, entity.id
            ));
        }

        out.push_str(&format!("Current query: {}\n", query));
        out
    }

    /// Forget all turns and tracked entities.
    pub fn clear(&mut self) {
        self.history.clear();
        self.entities.clear();
        self.next_sequence = 0;
    }

    /// Encode the whole context, including its window size, as bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, ChatError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Replace this context's contents with a previously serialized one.
    ///
    /// On error the context is left untouched.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), ChatError> {
        *self = Self::from_bytes(bytes)?;
        Ok(())
    }

    /// Decode a context from bytes produced by [`serialize`](Self::serialize).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChatError> {
        let mut ctx: ConversationContext = serde_json::from_slice(bytes)?;
        while ctx.history.len() > ctx.max_history {
            ctx.history.pop_front();
        }
        let max_seq = ctx.entities.values().map(|e| e.sequence).max();
        if let Some(max_seq) = max_seq {
            ctx.next_sequence = ctx.next_sequence.max(max_seq + 1);
        }
        Ok(ctx)
    }
}

// =============================================================================
// Tests
// =============================================================================
