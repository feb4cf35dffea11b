//! Query orchestration.
//!
//! [`QueryHandler::process_query`] runs one conversational turn: validate,
//! optional pre-flight ambiguity check, one LLM completion, envelope
//! decoding with local fallbacks, dispatch to the repository, formatting,
//! and finally the context update. The context is only written after the
//! last collaborator call returns, so failed or cancelled turns leave it
//! untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use mailgraph_core::{ChatConfig, Direction, Entity, EntityType, RelationshipType, SchemaConfig};

use crate::action::{Action, ActionEnvelope};
use crate::context::{is_pronoun, ConversationContext};
use crate::error::{ChatError, RepositoryError};
use crate::llm::LlmClient;
use crate::patterns::PatternMatcher;
use crate::prompt::{build_query_prompt, PromptTemplate};
use crate::repository::Repository;
use crate::response::{ErrorKind, ResponseFormatter};
use crate::types::{FormattedResponse, Intent, MatchResult, QueryResult};

/// Answers natural-language questions against a graph repository.
pub struct QueryHandler {
    repository: Arc<dyn Repository>,
    llm: Arc<dyn LlmClient>,
    template: PromptTemplate,
    matcher: PatternMatcher,
    formatter: ResponseFormatter,
    config: ChatConfig,
}

impl QueryHandler {
    /// Create a handler with default configuration and schema.
    pub fn new(repository: Arc<dyn Repository>, llm: Arc<dyn LlmClient>) -> Self {
        Self::with_config(repository, llm, ChatConfig::default(), &SchemaConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn Repository>,
        llm: Arc<dyn LlmClient>,
        config: ChatConfig,
        schema: &SchemaConfig,
    ) -> Self {
        Self {
            repository,
            llm,
            template: PromptTemplate::with_schema(schema),
            matcher: PatternMatcher::new(),
            formatter: ResponseFormatter::new(config.max_listed_entities),
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// A fresh context sized to this handler's history limit.
    pub fn new_context(&self) -> ConversationContext {
        ConversationContext::with_max_history(self.config.max_history)
    }

    /// Process one turn against `context`.
    ///
    /// Domain misses (unknown entity, no path, ambiguity, unparseable
    /// output) come back as `Ok` text. Errors are validation failures,
    /// LLM transport failures, and repository failures other than
    /// not-found; none of them touch the context.
    pub async fn process_query(
        &self,
        query: &str,
        context: &mut ConversationContext,
    ) -> Result<QueryResult, ChatError> {
        let query = self.validate(query)?;

        if self.config.preflight_ambiguity {
            if let Some(ambiguous) = self.matcher.check_ambiguity(query) {
                debug!(query = %query, "Pre-flight ambiguity");
                let result = self.ambiguous_result(&ambiguous);
                self.record(query, &result, context);
                return Ok(result);
            }
        }

        let prompt = build_query_prompt(&self.template, context, query);
        let completion = self.llm.generate_completion(&prompt).await?;
        let result = self.interpret(query, &completion, context).await?;

        info!(
            action = %result.action,
            entities = result.entities.len(),
            "Query answered"
        );
        self.record(query, &result, context);
        Ok(result)
    }

    /// [`process_query`](Self::process_query) bounded by `deadline`.
    ///
    /// On expiry the in-flight collaborator call is dropped and the turn
    /// fails with [`ChatError::DeadlineExceeded`].
    pub async fn process_query_with_deadline(
        &self,
        query: &str,
        context: &mut ConversationContext,
        deadline: Duration,
    ) -> Result<QueryResult, ChatError> {
        match tokio::time::timeout(deadline, self.process_query(query, context)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "Query deadline exceeded");
                Err(ChatError::DeadlineExceeded(deadline))
            }
        }
    }

    pub fn clear_context(&self, context: &mut ConversationContext) {
        context.clear();
    }

    // -- Stages --

    fn validate<'q>(&self, query: &'q str) -> Result<&'q str, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::InvalidQuery("query cannot be empty".to_string()));
        }
        let len = query.chars().count();
        if len > self.config.max_query_length {
            return Err(ChatError::InvalidQuery(format!(
                "query is {} characters, the limit is {}",
                len, self.config.max_query_length
            )));
        }
        Ok(query)
    }

    async fn interpret(
        &self,
        query: &str,
        completion: &str,
        context: &ConversationContext,
    ) -> Result<QueryResult, ChatError> {
        let completion = completion.trim();
        if completion.is_empty() {
            warn!("Empty completion, using pattern matcher");
            return self.fallback(query, context).await;
        }

        let Some(envelope) = ActionEnvelope::parse(completion) else {
            warn!("Completion is not an action envelope, answering verbatim");
            return Ok(QueryResult::answer(completion));
        };

        let envelope = resolve_pronouns(envelope, context);
        match self.dispatch(&envelope).await? {
            Some(result) => Ok(result),
            None => {
                warn!(action = %envelope.action, "Envelope not dispatchable, using pattern matcher");
                self.fallback(query, context).await
            }
        }
    }

    /// Classify the raw query locally and dispatch that instead.
    async fn fallback(
        &self,
        query: &str,
        context: &ConversationContext,
    ) -> Result<QueryResult, ChatError> {
        let classified = self.matcher.classify(query)?;
        if classified.intent == Intent::Ambiguous {
            return Ok(self.ambiguous_result(&classified));
        }

        if let Some(envelope) = ActionEnvelope::from_match(&classified) {
            let envelope = resolve_pronouns(envelope, context);
            if let Some(result) = self.dispatch(&envelope).await? {
                return Ok(result);
            }
        }

        debug!(query = %query, "No dispatchable interpretation");
        Ok(QueryResult::from_formatted(
            "unknown",
            FormattedResponse::text_only(self.formatter.format_error(ErrorKind::InvalidQuery, "")),
        ))
    }

    /// Execute an envelope. `Ok(None)` means the action is unknown or is
    /// missing the arguments it needs.
    async fn dispatch(&self, envelope: &ActionEnvelope) -> Result<Option<QueryResult>, ChatError> {
        let action = envelope.kind();
        debug!(action = %action.as_str(), "Dispatching action");

        let result = match &action {
            Action::EntityLookup => {
                let Some(name) = present(&envelope.entity) else {
                    return Ok(None);
                };
                match self.resolve(name).await? {
                    Some(entity) => QueryResult::from_formatted(
                        action.as_str(),
                        self.formatter.format_entities(&[entity]),
                    ),
                    None => self.not_found(&action, name),
                }
            }

            Action::Traverse => {
                let Some(name) = present(&envelope.entity) else {
                    return Ok(None);
                };
                let Some(root) = self.resolve(name).await? else {
                    return Ok(Some(self.not_found(&action, name)));
                };
                let rel = present(&envelope.relationship).map(normalize_relationship);
                let direction = direction_for(envelope, rel.as_deref());
                let mut related = self
                    .repository
                    .traverse_relationships(root.id, rel.as_deref(), direction)
                    .await?;
                if let Some(t) = present(&envelope.entity_type) {
                    let t = normalize_entity_type(t);
                    related.retain(|e| e.entity_type.eq_ignore_ascii_case(&t));
                }
                QueryResult::from_formatted(
                    action.as_str(),
                    self.formatter.format_relationships(&root, rel.as_deref(), &related),
                )
            }

            Action::FindPath => {
                let (Some(source_name), Some(target_name)) =
                    (present(&envelope.source), present(&envelope.target))
                else {
                    return Ok(None);
                };
                let Some(source) = self.resolve(source_name).await? else {
                    return Ok(Some(self.not_found(&action, source_name)));
                };
                let Some(target) = self.resolve(target_name).await? else {
                    return Ok(Some(self.not_found(&action, target_name)));
                };

                let path = self.repository.find_shortest_path(source.id, target.id).await?;
                if path.is_empty() {
                    let details = format!("'{}' and '{}'", source.name, target.name);
                    return Ok(Some(QueryResult::from_formatted(
                        action.as_str(),
                        FormattedResponse {
                            text: self.formatter.format_error(ErrorKind::NoPath, &details),
                            entities: vec![source, target],
                        },
                    )));
                }
                let mut result =
                    QueryResult::from_formatted(action.as_str(), self.formatter.format_path(&path));
                result.path = path;
                result
            }

            Action::SemanticSearch => {
                let Some(concept) = present(&envelope.concept) else {
                    return Ok(None);
                };
                let embedding = self.llm.generate_embedding(concept).await?;
                let hits = self
                    .repository
                    .similarity_search(&embedding, self.config.similarity_limit)
                    .await?;
                QueryResult::from_formatted(
                    action.as_str(),
                    self.formatter.format_similar(concept, &hits),
                )
            }

            Action::Count => {
                let rel = present(&envelope.relationship).map(normalize_relationship);
                if let Some(name) = present(&envelope.entity) {
                    let Some(entity) = self.resolve(name).await? else {
                        return Ok(Some(self.not_found(&action, name)));
                    };
                    let direction = direction_for(envelope, rel.as_deref());
                    let count = self
                        .repository
                        .count_relationships(entity.id, rel.as_deref(), direction)
                        .await?;
                    let mut description = format!(
                        "{} relationships for {}",
                        rel.as_deref().unwrap_or("All"),
                        entity.name
                    );
                    if direction != Direction::Both {
                        description.push_str(&format!(" ({})", direction));
                    }
                    let mut formatted = self.formatter.format_count(count, &description);
                    formatted.entities = vec![entity];
                    QueryResult::from_formatted(action.as_str(), formatted)
                } else if let Some(t) = present(&envelope.entity_type) {
                    let t = normalize_entity_type(t);
                    let count = self.repository.count_entities(&t).await?;
                    QueryResult::from_formatted(
                        action.as_str(),
                        self.formatter
                            .format_count(count, &format!("{} entities in the graph", t)),
                    )
                } else {
                    return Ok(None);
                }
            }

            Action::Answer => {
                let Some(answer) = present(&envelope.answer) else {
                    return Ok(None);
                };
                QueryResult::answer(answer)
            }

            Action::Unknown(name) => {
                warn!(action = %name, "Unknown action");
                return Ok(None);
            }
        };

        Ok(Some(result))
    }

    // -- Helpers --

    /// Look up an entity; not-found is `Ok(None)`, anything else propagates.
    async fn resolve(&self, name: &str) -> Result<Option<Entity>, ChatError> {
        match self.repository.find_entity_by_name(name).await {
            Ok(entity) => Ok(Some(entity)),
            Err(RepositoryError::NotFound(_)) => {
                debug!(name = %name, "Entity not found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn not_found(&self, action: &Action, name: &str) -> QueryResult {
        let details = format!("no entity named '{}'", name);
        QueryResult::from_formatted(
            action.as_str(),
            FormattedResponse::text_only(
                self.formatter.format_error(ErrorKind::EntityNotFound, &details),
            ),
        )
    }

    fn ambiguous_result(&self, result: &MatchResult) -> QueryResult {
        let subject = result
            .arg("name")
            .or_else(|| result.arg("term"))
            .unwrap_or_default();
        QueryResult::from_formatted(
            Intent::Ambiguous.as_str(),
            self.formatter.format_ambiguous(subject, &result.options),
        )
    }

    fn record(&self, query: &str, result: &QueryResult, context: &mut ConversationContext) {
        context.add_turn(query, &result.text);
        // Reverse so the first listed entity ends up the most recent referent.
        for entity in result.entities.iter().rev() {
            context.track_entity(&entity.name, &entity.entity_type, entity.id);
        }
    }
}

/// A non-blank parameter value.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Replace pronoun arguments with the most recently tracked entity.
fn resolve_pronouns(mut envelope: ActionEnvelope, context: &ConversationContext) -> ActionEnvelope {
    let Some(recent) = context.most_recent_entity() else {
        return envelope;
    };
    for slot in [&mut envelope.entity, &mut envelope.source, &mut envelope.target] {
        if slot.as_deref().is_some_and(is_pronoun) {
            debug!(pronoun = ?slot, resolved = %recent.name, "Resolved pronoun");
            *slot = Some(recent.name.clone());
        }
    }
    envelope
}

fn normalize_relationship(raw: &str) -> String {
    RelationshipType::parse(raw)
        .map(|r| r.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_uppercase())
}

/// Explicit envelope direction, else the one implied by `rel`.
fn direction_for(envelope: &ActionEnvelope, rel: Option<&str>) -> Direction {
    match present(&envelope.direction) {
        Some(raw) => Direction::parse(raw).unwrap_or_else(|| {
            debug!(direction = %raw, "Unrecognised direction hint");
            Direction::for_relationship(rel)
        }),
        None => Direction::for_relationship(rel),
    }
}

fn normalize_entity_type(raw: &str) -> String {
    EntityType::parse(raw)
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_lowercase())
}

// =============================================================================
// Tests
// =============================================================================
