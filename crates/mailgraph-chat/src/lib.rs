//! Conversational query engine for the mail knowledge graph.
//!
//! Classifies natural-language questions, keeps bounded multi-turn context
//! with pronoun resolution, asks a language model for a structured action,
//! dispatches it to a graph repository, and formats the result.

pub mod action;
pub mod context;
pub mod error;
pub mod handler;
pub mod llm;
pub mod patterns;
pub mod prompt;
pub mod repository;
pub mod response;
pub mod types;

pub use action::{Action, ActionEnvelope};
pub use context::ConversationContext;
pub use error::{ChatError, LlmError, RepositoryError};
pub use handler::QueryHandler;
pub use llm::{LlmClient, PatternLlmClient};
pub use patterns::PatternMatcher;
pub use prompt::{build_query_prompt, PromptTemplate};
pub use repository::{MemoryGraph, Relationship, Repository};
pub use response::{ErrorKind, ResponseFormatter};
pub use types::{FormattedResponse, HistoryEntry, Intent, MatchResult, QueryResult, TrackedEntity};
