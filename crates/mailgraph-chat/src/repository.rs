//! Graph repository abstraction and an in-memory implementation.
//!
//! The engine only reads through [`Repository`]. [`MemoryGraph`] holds a
//! whole graph snapshot in memory and is what the CLI host and the tests
//! run against.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mailgraph_core::{Direction, Entity, MailgraphError, PathNode, RelationshipType};

use crate::error::RepositoryError;

/// Read interface over the persisted knowledge graph.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Resolve an entity by name. Fails with `NotFound` if nothing matches.
    async fn find_entity_by_name(&self, name: &str) -> Result<Entity, RepositoryError>;

    /// Entities adjacent to `entity_id` along edges on the `direction` side,
    /// optionally restricted to one relationship type. An empty vector is
    /// not an error.
    async fn traverse_relationships(
        &self,
        entity_id: i64,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Entity>, RepositoryError>;

    /// Shortest path from `source_id` to `target_id`, empty when none exists.
    /// Edges may be crossed in either direction; backward hops are marked
    /// `reversed`.
    async fn find_shortest_path(
        &self,
        source_id: i64,
        target_id: i64,
    ) -> Result<Vec<PathNode>, RepositoryError>;

    /// Entities whose embeddings are closest to `embedding`, best first.
    async fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError>;

    /// Number of relationships touching `entity_id` on the `direction` side.
    async fn count_relationships(
        &self,
        entity_id: i64,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<u64, RepositoryError>;

    /// Number of entities of one type.
    async fn count_entities(&self, entity_type: &str) -> Result<u64, RepositoryError>;
}

// =============================================================================
// Snapshot format
// =============================================================================

/// A typed, directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: i64,
    pub target: i64,
    #[serde(rename = "type")]
    pub rel_type: String,
}

impl Relationship {
    pub fn new(source: i64, target: i64, rel_type: impl Into<String>) -> Self {
        Self {
            source,
            target,
            rel_type: rel_type.into(),
        }
    }

    fn matches(&self, rel_type: Option<&str>) -> bool {
        rel_type.map_or(true, |t| self.rel_type.eq_ignore_ascii_case(t))
    }

    /// The endpoint opposite `id`, if this edge touches it.
    fn other_end(&self, id: i64) -> Option<i64> {
        if self.source == id {
            Some(self.target)
        } else if self.target == id {
            Some(self.source)
        } else {
            None
        }
    }

    /// The endpoint opposite `id` when `id` sits on the `direction` side.
    fn neighbour(&self, id: i64, direction: Direction) -> Option<i64> {
        match direction {
            Direction::Outgoing => (self.source == id).then_some(self.target),
            Direction::Incoming => (self.target == id).then_some(self.source),
            Direction::Both => self.other_end(id),
        }
    }

    fn is_symmetric(&self) -> bool {
        RelationshipType::parse(&self.rel_type).is_some_and(|t| t.is_symmetric())
    }
}

/// One node of a BFS result before entities are attached.
struct Step {
    id: i64,
    rel_type: String,
    reversed: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entities: Vec<Entity>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

// =============================================================================
// MemoryGraph
// =============================================================================

/// In-memory graph loaded from a JSON snapshot.
///
/// Edges are stored directed. Traversal and counting honour the requested
/// direction, while path finding crosses edges either way. Embeddings are
/// optional and indexed separately with [`MemoryGraph::index_embedding`].
#[derive(Debug, Default)]
pub struct MemoryGraph {
    entities: BTreeMap<i64, Entity>,
    relationships: Vec<Relationship>,
    embeddings: BTreeMap<i64, Vec<f32>>,
    offline: AtomicBool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{"entities": [...], "relationships": [...]}` snapshot.
    ///
    /// Relationships referencing unknown entity ids are dropped with a
    /// warning.
    pub fn from_json(json: &str) -> Result<Self, MailgraphError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        let mut graph = Self::new();
        for entity in snapshot.entities {
            graph.add_entity(entity);
        }
        for rel in snapshot.relationships {
            if graph.entities.contains_key(&rel.source) && graph.entities.contains_key(&rel.target) {
                graph.relationships.push(rel);
            } else {
                warn!(
                    source = rel.source,
                    target = rel.target,
                    rel_type = %rel.rel_type,
                    "Skipping relationship with unknown endpoint"
                );
            }
        }
        Ok(graph)
    }

    /// Load a snapshot file.
    pub fn load(path: &Path) -> Result<Self, MailgraphError> {
        let content = std::fs::read_to_string(path)?;
        let graph = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            entities = graph.entity_count(),
            relationships = graph.relationship_count(),
            "Loaded graph snapshot"
        );
        Ok(graph)
    }

    /// Serialize the graph back to the snapshot format.
    pub fn to_json(&self) -> Result<String, MailgraphError> {
        let snapshot = Snapshot {
            entities: self.entities.values().cloned().collect(),
            relationships: self.relationships.clone(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Insert or replace an entity.
    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn add_relationship(&mut self, source: i64, target: i64, rel_type: &str) {
        self.relationships.push(Relationship::new(source, target, rel_type));
    }

    pub fn index_embedding(&mut self, entity_id: i64, embedding: Vec<f32>) {
        self.embeddings.insert(entity_id, embedding);
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn embedding_count(&self) -> usize {
        self.embeddings.len()
    }

    /// Simulate loss of connectivity; every call then fails with
    /// `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("graph is offline".to_string()));
        }
        Ok(())
    }

    fn get(&self, id: i64) -> Result<&Entity, RepositoryError> {
        self.entities
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("id {}", id)))
    }

    /// Breadth-first search over edges in either direction. Returns the
    /// entity ids along the path, the edge type taken out of each
    /// non-terminal node, and whether that edge was crossed target to source.
    fn bfs(&self, source: i64, target: i64) -> Option<Vec<Step>> {
        let mut came_from: HashMap<i64, (i64, &Relationship)> = HashMap::new();
        let mut visited = HashSet::from([source]);
        let mut queue = VecDeque::from([source]);

        while let Some(current) = queue.pop_front() {
            if current == target {
                break;
            }
            for rel in &self.relationships {
                if let Some(next) = rel.other_end(current) {
                    if visited.insert(next) {
                        came_from.insert(next, (current, rel));
                        queue.push_back(next);
                    }
                }
            }
        }

        if !visited.contains(&target) {
            return None;
        }

        // Walk back from the target; each step records the edge into the
        // later node, which becomes the label of the earlier one.
        let mut path = vec![Step {
            id: target,
            rel_type: String::new(),
            reversed: false,
        }];
        let mut current = target;
        while current != source {
            let (prev, rel) = came_from[&current];
            path.push(Step {
                id: prev,
                rel_type: rel.rel_type.clone(),
                reversed: rel.source != prev && !rel.is_symmetric(),
            });
            current = prev;
        }
        path.reverse();
        Some(path)
    }
}

#[async_trait]
impl Repository for MemoryGraph {
    async fn find_entity_by_name(&self, name: &str) -> Result<Entity, RepositoryError> {
        self.ensure_online()?;
        let needle = name.trim();
        let by_name = self
            .entities
            .values()
            .find(|e| e.name.eq_ignore_ascii_case(needle));
        let found = by_name.or_else(|| {
            self.entities.values().find(|e| {
                e.properties
                    .get("email")
                    .and_then(|v| v.as_str())
                    .is_some_and(|email| email.eq_ignore_ascii_case(needle))
            })
        });
        debug!(name = %needle, found = found.is_some(), "Entity lookup");
        found
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(needle.to_string()))
    }

    async fn traverse_relationships(
        &self,
        entity_id: i64,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Entity>, RepositoryError> {
        self.ensure_online()?;
        self.get(entity_id)?;

        let mut seen = Vec::new();
        for rel in self.relationships.iter().filter(|r| r.matches(rel_type)) {
            if let Some(other) = rel.neighbour(entity_id, direction) {
                if other != entity_id && !seen.contains(&other) {
                    seen.push(other);
                }
            }
        }
        Ok(seen
            .into_iter()
            .filter_map(|id| self.entities.get(&id).cloned())
            .collect())
    }

    async fn find_shortest_path(
        &self,
        source_id: i64,
        target_id: i64,
    ) -> Result<Vec<PathNode>, RepositoryError> {
        self.ensure_online()?;
        self.get(source_id)?;
        self.get(target_id)?;

        let Some(steps) = self.bfs(source_id, target_id) else {
            return Ok(Vec::new());
        };
        steps
            .into_iter()
            .map(|step| {
                let entity = self.get(step.id)?.clone();
                Ok(if step.reversed {
                    PathNode::backward(entity, step.rel_type)
                } else {
                    PathNode::new(entity, step.rel_type)
                })
            })
            .collect()
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError> {
        self.ensure_online()?;
        if limit == 0 || embedding.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, i64)> = self
            .embeddings
            .iter()
            .filter_map(|(id, vec)| cosine_similarity(embedding, vec).map(|s| (s, *id)))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(limit)
            .filter_map(|(_, id)| self.entities.get(&id).cloned())
            .collect())
    }

    async fn count_relationships(
        &self,
        entity_id: i64,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<u64, RepositoryError> {
        self.ensure_online()?;
        self.get(entity_id)?;
        let count = self
            .relationships
            .iter()
            .filter(|r| r.matches(rel_type) && r.neighbour(entity_id, direction).is_some())
            .count();
        Ok(count as u64)
    }

    async fn count_entities(&self, entity_type: &str) -> Result<u64, RepositoryError> {
        self.ensure_online()?;
        let count = self
            .entities
            .values()
            .filter(|e| e.entity_type.eq_ignore_ascii_case(entity_type))
            .count();
        Ok(count as u64)
    }
}

/// Text used to embed an entity for similarity search.
pub fn embedding_text(entity: &Entity) -> String {
    let mut text = format!("{} {}", entity.name, entity.entity_type);
    for key in ["description", "subject", "summary"] {
        if let Some(value) = entity.properties.get(key).and_then(|v| v.as_str()) {
            text.push(' ');
            text.push_str(value);
        }
    }
    text
}

/// Cosine similarity, or `None` for mismatched or zero-length vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na * nb))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "entities": [
            {"id": 1, "name": "Jeff Skilling", "type": "person", "properties": {"email": "jeff.skilling@enron.com"}},
            {"id": 2, "name": "Kenneth Lay", "type": "person"},
            {"id": 3, "name": "Sherron Watkins", "type": "person"},
            {"id": 4, "name": "Enron", "type": "organization"},
            {"id": 5, "name": "Q3 results", "type": "email"},
            {"id": 6, "name": "Andrew Fastow", "type": "person"}
        ],
        "relationships": [
            {"source": 1, "target": 5, "type": "SENT"},
            {"source": 5, "target": 3, "type": "RECEIVED"},
            {"source": 1, "target": 3, "type": "COMMUNICATES_WITH"},
            {"source": 3, "target": 2, "type": "COMMUNICATES_WITH"},
            {"source": 5, "target": 4, "type": "MENTIONS"},
            {"source": 1, "target": 99, "type": "SENT"}
        ]
    }"#;

    fn graph() -> MemoryGraph {
        MemoryGraph::from_json(SNAPSHOT).unwrap()
    }

    /// Alice SENT Bob, Carol SENT Alice.
    fn two_way() -> MemoryGraph {
        let mut g = MemoryGraph::new();
        g.add_entity(Entity::new(1, "Alice", "person"));
        g.add_entity(Entity::new(2, "Bob", "person"));
        g.add_entity(Entity::new(3, "Carol", "person"));
        g.add_relationship(1, 2, "SENT");
        g.add_relationship(3, 1, "SENT");
        g
    }

    // ---- Loading ----

    #[test]
    fn test_from_json_drops_dangling_edges() {
        let g = graph();
        assert_eq!(g.entity_count(), 6);
        assert_eq!(g.relationship_count(), 5);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(MemoryGraph::from_json("not json").is_err());
    }

    #[test]
    fn test_load_and_to_json() {
        let g = graph();
        let json = g.to_json().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, json.as_bytes()).unwrap();

        let reloaded = MemoryGraph::load(file.path()).unwrap();
        assert_eq!(reloaded.entity_count(), 6);
        assert_eq!(reloaded.relationship_count(), 5);
    }

    // ---- Lookup ----

    #[tokio::test]
    async fn test_find_entity_case_insensitive() {
        let e = graph().find_entity_by_name("  jeff skilling ").await.unwrap();
        assert_eq!(e.id, 1);
    }

    #[tokio::test]
    async fn test_find_entity_by_email() {
        let e = graph().find_entity_by_name("JEFF.SKILLING@enron.com").await.unwrap();
        assert_eq!(e.name, "Jeff Skilling");
    }

    #[tokio::test]
    async fn test_find_entity_not_found() {
        let err = graph().find_entity_by_name("Nobody").await.unwrap_err();
        assert_eq!(err, RepositoryError::NotFound("Nobody".to_string()));
    }

    // ---- Traversal and counts ----

    #[tokio::test]
    async fn test_traverse_filters_by_type() {
        let g = graph();
        let sent = g
            .traverse_relationships(1, Some("sent"), Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "Q3 results");

        let all = g.traverse_relationships(1, None, Direction::Both).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_traverse_empty_is_ok() {
        let related = graph()
            .traverse_relationships(6, Some("SENT"), Direction::Outgoing)
            .await
            .unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn test_traverse_follows_direction() {
        let g = two_way();
        let names = |es: Vec<Entity>| es.into_iter().map(|e| e.name).collect::<Vec<_>>();

        let out = g.traverse_relationships(1, Some("SENT"), Direction::Outgoing).await.unwrap();
        assert_eq!(names(out), vec!["Bob"]);
        let inc = g.traverse_relationships(1, Some("SENT"), Direction::Incoming).await.unwrap();
        assert_eq!(names(inc), vec!["Carol"]);
        let both = g.traverse_relationships(1, Some("SENT"), Direction::Both).await.unwrap();
        assert_eq!(names(both), vec!["Bob", "Carol"]);
    }

    #[tokio::test]
    async fn test_received_edges_point_at_recipient() {
        let g = graph();
        let inbox = g
            .traverse_relationships(3, Some("RECEIVED"), Direction::Incoming)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].name, "Q3 results");
        assert!(g
            .traverse_relationships(3, Some("RECEIVED"), Direction::Outgoing)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_count_follows_direction() {
        let g = two_way();
        assert_eq!(g.count_relationships(1, Some("SENT"), Direction::Outgoing).await.unwrap(), 1);
        assert_eq!(g.count_relationships(1, Some("SENT"), Direction::Incoming).await.unwrap(), 1);
        assert_eq!(g.count_relationships(1, Some("SENT"), Direction::Both).await.unwrap(), 2);
        assert_eq!(g.count_relationships(2, Some("SENT"), Direction::Outgoing).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_counts() {
        let g = graph();
        assert_eq!(
            g.count_relationships(3, Some("COMMUNICATES_WITH"), Direction::Both)
                .await
                .unwrap(),
            2
        );
        assert_eq!(g.count_relationships(3, None, Direction::Both).await.unwrap(), 3);
        assert_eq!(g.count_entities("person").await.unwrap(), 4);
        assert_eq!(g.count_entities("project").await.unwrap(), 0);
    }

    // ---- Paths ----

    #[tokio::test]
    async fn test_shortest_path_labels() {
        let path = graph().find_shortest_path(1, 2).await.unwrap();
        let names: Vec<&str> = path.iter().map(|n| n.entity.name.as_str()).collect();
        assert_eq!(names, vec!["Jeff Skilling", "Sherron Watkins", "Kenneth Lay"]);
        assert_eq!(path[0].relationship, "COMMUNICATES_WITH");
        assert_eq!(path[1].relationship, "COMMUNICATES_WITH");
        assert!(path[2].is_terminal());
        assert!(path.iter().all(|n| !n.reversed));
    }

    #[tokio::test]
    async fn test_shortest_path_marks_backward_hops() {
        let path = two_way().find_shortest_path(2, 3).await.unwrap();
        let names: Vec<&str> = path.iter().map(|n| n.entity.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Alice", "Carol"]);
        assert!(path[0].reversed);
        assert!(path[1].reversed);
        assert!(!path[2].reversed);

        let forward = two_way().find_shortest_path(3, 2).await.unwrap();
        assert!(forward.iter().all(|n| !n.reversed));
    }

    #[tokio::test]
    async fn test_shortest_path_symmetric_edge_not_reversed() {
        // 3 -> 2 is stored source-first but COMMUNICATES_WITH reads both ways.
        let path = graph().find_shortest_path(2, 1).await.unwrap();
        assert_eq!(path.len(), 3);
        assert!(path.iter().all(|n| !n.reversed));
    }

    #[tokio::test]
    async fn test_shortest_path_same_node() {
        let path = graph().find_shortest_path(4, 4).await.unwrap();
        assert_eq!(path.len(), 1);
        assert!(path[0].is_terminal());
    }

    #[tokio::test]
    async fn test_shortest_path_none() {
        let path = graph().find_shortest_path(1, 6).await.unwrap();
        assert!(path.is_empty());
    }

    // ---- Similarity ----

    #[tokio::test]
    async fn test_similarity_search_orders_by_score() {
        let mut g = graph();
        g.index_embedding(1, vec![1.0, 0.0]);
        g.index_embedding(2, vec![0.6, 0.8]);
        g.index_embedding(3, vec![0.0, 1.0]);
        g.index_embedding(4, vec![0.0, 0.0]);

        let hits = g.similarity_search(&[1.0, 0.1], 2).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_similarity_search_without_index() {
        let hits = graph().similarity_search(&[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_embedding_text_includes_description() {
        let e = Entity::new(7, "Raptor", "project")
            .with_property("description", serde_json::json!("off-balance-sheet vehicle"));
        assert_eq!(embedding_text(&e), "Raptor project off-balance-sheet vehicle");
    }

    // ---- Availability ----

    #[tokio::test]
    async fn test_offline_reports_unavailable() {
        let g = graph();
        g.set_offline(true);
        let err = g.find_entity_by_name("Jeff Skilling").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));

        g.set_offline(false);
        assert!(g.find_entity_by_name("Jeff Skilling").await.is_ok());
    }
}
