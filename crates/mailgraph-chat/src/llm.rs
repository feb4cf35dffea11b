//! Language-model collaborator.
//!
//! - `LlmClient` is the seam hosts plug a real provider into.
//! - `PatternLlmClient` answers offline by running the pattern matcher over
//!   the query embedded in the prompt and hashing words into embeddings.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use tracing::debug;

use crate::action::ActionEnvelope;
use crate::error::LlmError;
use crate::patterns::PatternMatcher;
use crate::prompt::extract_query;
use crate::types::Intent;

/// Dimensionality of [`PatternLlmClient`] embeddings.
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Completion and embedding provider.
///
/// Retries and backoff, if any, belong inside implementations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_completion(&self, prompt: &str) -> Result<String, LlmError>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

// ---------------------------------------------------------------------------
// PatternLlmClient - deterministic offline client
// ---------------------------------------------------------------------------

/// Offline client backed by the pattern matcher.
///
/// Completions are action envelopes for whatever the matcher recognises in
/// the prompt's `Current query:` line; anything else becomes an `answer`
/// envelope. Embeddings hash each word into a fixed bucket so texts sharing
/// words land near each other.
#[derive(Debug, Clone, Default)]
pub struct PatternLlmClient {
    matcher: PatternMatcher,
}

impl PatternLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn complete(&self, prompt: &str) -> String {
        let query = extract_query(prompt).unwrap_or(prompt).trim();

        let result = match self.matcher.classify(query) {
            Ok(result) => result,
            Err(_) => return answer_envelope("Please ask a question about the email graph."),
        };

        if result.intent == Intent::Ambiguous {
            let subject = result
                .arg("name")
                .or_else(|| result.arg("term"))
                .unwrap_or(query);
            return answer_envelope(&format!(
                "\"{}\" is ambiguous. Could you be more specific? For example: {}",
                subject,
                result.options.join("; ")
            ));
        }

        match ActionEnvelope::from_match(&result) {
            Some(envelope) => envelope.to_json(),
            None => answer_envelope(
                "I can look up people and organizations, list who emailed whom, \
                 find connections between two entities, and count relationships.",
            ),
        }
    }
}

fn answer_envelope(text: &str) -> String {
    ActionEnvelope {
        answer: Some(text.to_string()),
        ..ActionEnvelope::new("answer")
    }
    .to_json()
}

/// Feature-hash `text` into an L2-normalised vector.
///
/// Each lowercase word adds a signed unit to one bucket. Text without words
/// yields the zero vector.
pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut result = vec![0.0f32; dimensions];
    if dimensions == 0 {
        return result;
    }

    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % dimensions as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        result[bucket] += sign;
    }

    let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut result {
            *val /= norm;
        }
    }
    result
}

#[async_trait]
impl LlmClient for PatternLlmClient {
    async fn generate_completion(&self, prompt: &str) -> Result<String, LlmError> {
        let completion = self.complete(prompt);
        debug!(completion = %completion, "Pattern completion");
        Ok(completion)
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(hash_embedding(text, EMBEDDING_DIMENSIONS))
    }
}
