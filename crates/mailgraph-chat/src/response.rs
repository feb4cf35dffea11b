//! Response formatting for graph results.
//!
//! Turns entity lists, paths, and counts into readable text while keeping
//! the underlying entities for re-display, and maps domain-level failures
//! (missing entity, no path, unparseable query) to user-facing phrases.

use mailgraph_core::{Entity, PathNode};

use crate::types::FormattedResponse;

/// Failure phrases shown to the user.
///
/// All but `Other` are domain outcomes reported as successful turns;
/// `Other` words a turn that failed outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EntityNotFound,
    NoPath,
    InvalidQuery,
    Ambiguous,
    Other,
}

// =============================================================================
// ResponseFormatter
// =============================================================================

/// Formats graph results for display.
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    /// Maximum number of entities listed line by line.
    pub max_listed: usize,
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new(20)
    }
}

impl ResponseFormatter {
    pub fn new(max_listed: usize) -> Self {
        Self { max_listed }
    }

    /// Summarise a list of entities.
    ///
    /// The returned `entities` always mirror the input, even when the text
    /// lists only the first `max_listed`.
    pub fn format_entities(&self, entities: &[Entity]) -> FormattedResponse {
        if entities.is_empty() {
            return FormattedResponse::text_only("No entities found.");
        }
        FormattedResponse {
            text: self.entity_listing(&found_summary(entities.len()), entities),
            entities: entities.to_vec(),
        }
    }

    /// Summarise similarity-search hits for `concept`.
    pub fn format_similar(&self, concept: &str, entities: &[Entity]) -> FormattedResponse {
        let header = format!(
            "Found {} semantically similar {} for \"{}\".",
            entities.len(),
            if entities.len() == 1 { "result" } else { "results" },
            concept
        );
        if entities.is_empty() {
            return FormattedResponse::text_only(header);
        }
        FormattedResponse {
            text: self.entity_listing(&header, entities),
            entities: entities.to_vec(),
        }
    }

    /// Summarise the neighbours of `root` along `relationship`.
    pub fn format_relationships(
        &self,
        root: &Entity,
        relationship: Option<&str>,
        related: &[Entity],
    ) -> FormattedResponse {
        let label = relationship.unwrap_or("any");
        if related.is_empty() {
            return FormattedResponse {
                text: format!("No relationships found for {} ({}).", root.name, label),
                entities: vec![root.clone()],
            };
        }

        let header = format!(
            "{} has {} {} relationship{}:",
            root.name,
            related.len(),
            label,
            if related.len() == 1 { "" } else { "s" }
        );
        let mut entities = Vec::with_capacity(related.len() + 1);
        entities.push(root.clone());
        entities.extend_from_slice(related);
        FormattedResponse {
            text: self.entity_listing(&header, related),
            entities,
        }
    }

    /// Render a path as `A --[REL]--> B <--[REL]-- C`, with each arrow
    /// following the stored edge direction.
    pub fn format_path(&self, path: &[PathNode]) -> FormattedResponse {
        if path.is_empty() {
            return FormattedResponse::text_only(self.format_error(ErrorKind::NoPath, ""));
        }

        let mut chain = String::new();
        for node in path {
            chain.push_str(&node.entity.name);
            if node.relationship.is_empty() {
                continue;
            }
            if node.reversed {
                chain.push_str(&format!(" <--[{}]-- ", node.relationship));
            } else {
                chain.push_str(&format!(" --[{}]--> ", node.relationship));
            }
        }

        let hops = path.len().saturating_sub(1);
        FormattedResponse {
            text: format!(
                "Found a connection ({} hop{}):\n{}",
                hops,
                if hops == 1 { "" } else { "s" },
                chain.trim_end()
            ),
            entities: path.iter().map(|n| n.entity.clone()).collect(),
        }
    }

    /// Render a count with its description.
    pub fn format_count(&self, count: u64, description: &str) -> FormattedResponse {
        let text = if description.is_empty() {
            format!("Count: {}", count)
        } else {
            format!("Count: {}\n{}", count, description)
        };
        FormattedResponse::text_only(text)
    }

    /// Ask the user to pick one of `options`.
    pub fn format_ambiguous(&self, subject: &str, options: &[String]) -> FormattedResponse {
        let mut text = if subject.is_empty() {
            self.format_error(ErrorKind::Ambiguous, "")
        } else {
            format!("\"{}\" could refer to several things. Did you mean:", subject)
        };
        for (i, option) in options.iter().enumerate() {
            text.push_str(&format!("\n{}. {}", i + 1, option));
        }
        FormattedResponse::text_only(text)
    }

    /// User-facing phrase for a domain failure.
    ///
    /// Non-empty `details` are appended verbatim after `Details:`.
    pub fn format_error(&self, kind: ErrorKind, details: &str) -> String {
        let base = match kind {
            ErrorKind::EntityNotFound => "I couldn't find that entity in the graph.",
            ErrorKind::NoPath => "No connection found between those entities.",
            ErrorKind::InvalidQuery => {
                "I didn't understand that question. Try asking about a person, an organization, or how two entities are connected."
            }
            ErrorKind::Ambiguous => "That could refer to several things. Did you mean:",
            ErrorKind::Other => "Something went wrong while answering that question.",
        };
        if details.is_empty() {
            base.to_string()
        } else {
            format!("{} Details: {}", base, details)
        }
    }

    // -- Private helpers --

    fn entity_listing(&self, header: &str, entities: &[Entity]) -> String {
        let mut lines = vec![header.to_string()];
        for e in entities.iter().take(self.max_listed) {
            lines.push(entity_line(e));
        }
        if entities.len() > self.max_listed {
            lines.push(format!("... and {} more", entities.len() - self.max_listed));
        }
        lines.join("\n")
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn found_summary(count: usize) -> String {
    if count == 1 {
        "Found 1 entity:".to_string()
    } else {
        format!("Found {} entities:", count)
    }
}

fn entity_line(entity: &Entity) -> String {
    let mut line = format!("- {} ({}, ID: {})", entity.name, entity.entity_type, entity.id);
    if let Some(email) = entity.properties.get("email").and_then(|v| v.as_str()) {
        line.push_str(&format!(" <{}>", email));
    }
    line
}

// =============================================================================
// Tests
// =============================================================================
