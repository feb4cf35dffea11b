//! Prompt construction for LLM intent parsing.
//!
//! A [`PromptTemplate`] fixes the system role, the operation menu, and the
//! schema; [`build_query_prompt`] combines it with the conversation context
//! and the user's query. Output is a pure function of its inputs so LLM
//! exchanges can be replayed from fixtures.

use std::sync::LazyLock;

use mailgraph_core::{RelationshipType, SchemaConfig};

use crate::context::ConversationContext;

/// One operation offered to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub action: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        action: "entity_lookup",
        description: "Look up a single entity by name",
        example: r#"{"action": "entity_lookup", "entity": "Jeff Skilling"}"#,
    },
    OperationSpec {
        action: "relationship",
        description: "Traverse relationships of one type from an entity, optionally with a direction of outgoing, incoming or both (alias: traverse)",
        example: r#"{"action": "relationship", "entity": "Jeff Skilling", "relationship": "SENT", "direction": "outgoing"}"#,
    },
    OperationSpec {
        action: "path_finding",
        description: "Find the shortest connection between two entities (alias: find_path)",
        example: r#"{"action": "path_finding", "source": "Jeff Skilling", "target": "Kenneth Lay"}"#,
    },
    OperationSpec {
        action: "semantic_search",
        description: "Search for entities semantically similar to a concept",
        example: r#"{"action": "semantic_search", "concept": "energy trading"}"#,
    },
    OperationSpec {
        action: "count",
        description: "Count relationships of one type for an entity, or entities of one type",
        example: r#"{"action": "count", "entity": "Kenneth Lay", "relationship": "RECEIVED"}"#,
    },
    OperationSpec {
        action: "answer",
        description: "Answer directly when no graph operation is needed",
        example: r#"{"action": "answer", "answer": "Hello! Ask me about people or emails."}"#,
    },
];

const SYSTEM_ROLE: &str = "You are an assistant that answers questions about a knowledge graph \
built from an email corpus. The graph contains entities (people, organizations, emails, topics) \
connected by typed relationships such as who sent or received which email and who communicates \
with whom. Translate the user's question into exactly one graph operation.";

const RESPONSE_INSTRUCTION: &str = "Respond with a single JSON object (the action envelope) and \
nothing else. Use only the fields shown in the examples. Resolve pronouns using the mentioned \
entities above.";

/// Fixed parts of the query prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system_role: String,
    pub operations: Vec<OperationSpec>,
    pub entity_types: Vec<String>,
    pub relationship_types: Vec<String>,
    pub response_instruction: String,
}

static DEFAULT_TEMPLATE: LazyLock<PromptTemplate> =
    LazyLock::new(|| PromptTemplate::with_schema(&SchemaConfig::default()));

impl PromptTemplate {
    /// The shared default template; every call returns the same instance.
    pub fn default_template() -> &'static PromptTemplate {
        &DEFAULT_TEMPLATE
    }

    /// Build a template advertising the built-in entity types plus the
    /// schema's extra (promoted) types.
    pub fn with_schema(schema: &SchemaConfig) -> Self {
        Self {
            system_role: SYSTEM_ROLE.to_string(),
            operations: OPERATIONS.to_vec(),
            entity_types: schema.entity_types(),
            relationship_types: RelationshipType::ALL
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
            response_instruction: RESPONSE_INSTRUCTION.to_string(),
        }
    }

    fn render_operations(&self) -> String {
        let mut out = String::from("Available operations:\n");
        for (i, op) in self.operations.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}: {}\n   Example: {}\n",
                i + 1,
                op.action,
                op.description,
                op.example
            ));
        }
        out
    }

    fn render_schema(&self) -> String {
        format!(
            "Entity types: {}\nRelationship types: {}\n",
            self.entity_types.join(", "),
            self.relationship_types.join(", ")
        )
    }
}

/// Assemble the full prompt for one query.
///
/// Order: system role, operation menu, schema, conversation context
/// (history and tracked entities when present), the query, and the JSON
/// response instruction.
pub fn build_query_prompt(
    template: &PromptTemplate,
    context: &ConversationContext,
    query: &str,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&template.system_role);
    prompt.push_str("\n\n");
    prompt.push_str(&template.render_operations());
    prompt.push('\n');
    prompt.push_str(&template.render_schema());
    prompt.push('\n');
    prompt.push_str(&context.build_prompt_context(query));
    prompt.push('\n');
    prompt.push_str(&template.response_instruction);
    prompt.push('\n');
    prompt
}

/// Recover the user's query from a prompt built by [`build_query_prompt`].
pub fn extract_query(prompt: &str) -> Option<&str> {
    prompt
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix("Current query: "))
        .map(str::trim)
}
