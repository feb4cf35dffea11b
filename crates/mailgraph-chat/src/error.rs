//! Error types for the conversational query engine.
//!
//! `ChatError` is what hosts see. The collaborator errors
//! (`RepositoryError`, `LlmError`) are what `Repository` and `LlmClient`
//! implementations return.

use std::time::Duration;

use mailgraph_core::MailgraphError;

/// Errors surfaced to the host by the query engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("repository error: {0}")]
    Repository(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Failures reported by a [`Repository`](crate::repository::Repository).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Failures reported by an [`LlmClient`](crate::llm::LlmClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("request cancelled")]
    Cancelled,
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError::Transport(err.to_string())
    }
}

impl From<RepositoryError> for ChatError {
    fn from(err: RepositoryError) -> Self {
        ChatError::Repository(err.to_string())
    }
}

impl From<MailgraphError> for ChatError {
    fn from(err: MailgraphError) -> Self {
        ChatError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(err.to_string())
    }
}
