use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Built-in entity types extracted from the email corpus.
///
/// Graphs may carry additional (discovered) types as plain strings; see
/// `SchemaConfig::extra_entity_types`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A sender, recipient, or person mentioned in a message.
    Person,
    /// A company, agency, or other organization.
    Organization,
    /// A single email message.
    Email,
    /// A subject or theme discussed across messages.
    Topic,
    /// A named project or deal.
    Project,
    /// A place.
    Location,
}

impl EntityType {
    /// Every built-in type, in schema order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Person,
        EntityType::Organization,
        EntityType::Email,
        EntityType::Topic,
        EntityType::Project,
        EntityType::Location,
    ];

    /// Canonical lowercase name as stored on entities.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::Email => "email",
            EntityType::Topic => "topic",
            EntityType::Project => "project",
            EntityType::Location => "location",
        }
    }

    /// Parse a type name, accepting simple plurals and a few synonyms.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "person" | "people" | "persons" | "contact" | "contacts" => Some(EntityType::Person),
            "organization" | "organizations" | "organisation" | "organisations" | "company"
            | "companies" => Some(EntityType::Organization),
            "email" | "emails" | "message" | "messages" => Some(EntityType::Email),
            "topic" | "topics" => Some(EntityType::Topic),
            "project" | "projects" => Some(EntityType::Project),
            "location" | "locations" | "place" | "places" => Some(EntityType::Location),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship (edge) types between entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Points from the sender to the email or recipient.
    Sent,
    /// Points from the email or sender to the recipient.
    Received,
    /// Points from an email or person to the entity it mentions.
    Mentions,
    /// Two people exchanged messages; either end may be stored as source.
    CommunicatesWith,
}

impl RelationshipType {
    /// Every relationship type, in schema order.
    pub const ALL: [RelationshipType; 4] = [
        RelationshipType::Sent,
        RelationshipType::Received,
        RelationshipType::Mentions,
        RelationshipType::CommunicatesWith,
    ];

    /// Canonical edge label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Sent => "SENT",
            RelationshipType::Received => "RECEIVED",
            RelationshipType::Mentions => "MENTIONS",
            RelationshipType::CommunicatesWith => "COMMUNICATES_WITH",
        }
    }

    /// Parse an edge label case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "SENT" => Some(RelationshipType::Sent),
            "RECEIVED" => Some(RelationshipType::Received),
            "MENTIONS" => Some(RelationshipType::Mentions),
            "COMMUNICATES_WITH" => Some(RelationshipType::CommunicatesWith),
            _ => None,
        }
    }

    /// Direction a question about this relationship follows from the
    /// entity it is asked about.
    pub fn default_direction(&self) -> Direction {
        match self {
            RelationshipType::Sent | RelationshipType::Mentions => Direction::Outgoing,
            RelationshipType::Received => Direction::Incoming,
            RelationshipType::CommunicatesWith => Direction::Both,
        }
    }

    /// Whether the edge reads the same from either end.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, RelationshipType::CommunicatesWith)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of an edge the queried entity must sit on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The entity is the edge source.
    Outgoing,
    /// The entity is the edge target.
    Incoming,
    /// Either end.
    #[default]
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
            Direction::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "outgoing" | "out" => Some(Direction::Outgoing),
            "incoming" | "in" => Some(Direction::Incoming),
            "both" | "any" | "either" => Some(Direction::Both),
            _ => None,
        }
    }

    /// Direction implied by an edge label; unknown or absent labels match
    /// either end.
    pub fn for_relationship(rel_type: Option<&str>) -> Self {
        rel_type
            .and_then(RelationshipType::parse)
            .map_or(Direction::Both, |rel| rel.default_direction())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Graph projections
// =============================================================================

/// Read-only projection of a graph entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Entity {
    pub fn new(id: i64, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entity_type: entity_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// One step of a path through the graph.
///
/// `relationship` names the edge leading to the next node and is empty for
/// the terminal node. `reversed` is set when that edge is stored from the
/// next node to this one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub entity: Entity,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub reversed: bool,
}

impl PathNode {
    pub fn new(entity: Entity, relationship: impl Into<String>) -> Self {
        Self {
            entity,
            relationship: relationship.into(),
            reversed: false,
        }
    }

    /// A node whose edge to the next node points back at it.
    pub fn backward(entity: Entity, relationship: impl Into<String>) -> Self {
        Self {
            reversed: true,
            ..Self::new(entity, relationship)
        }
    }

    /// Whether this node ends its path.
    pub fn is_terminal(&self) -> bool {
        self.relationship.is_empty()
    }
}
