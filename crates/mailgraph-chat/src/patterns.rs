//! Deterministic, regex-based intent classifier.
//!
//! Categories are tried in a fixed order so a phrasing never lands in two
//! of them: ambiguity, path finding, concept search, aggregation,
//! relationship, entity lookup. Nothing matching yields `Unknown`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use mailgraph_core::{Direction, EntityType, RelationshipType};

use crate::error::ChatError;
use crate::types::{Intent, MatchResult};

// =============================================================================
// Compiled rule sets (compiled once, reused across calls)
// =============================================================================

/// A pattern plus the hints it implies.
///
/// Named groups `name`, `entity`, `source`, `target`, `concept` become
/// arguments; `etype` becomes an `entity_type` hint and `verb` derives the
/// relationship type when the rule does not fix one.
struct Rule {
    regex: Regex,
    relationship: Option<RelationshipType>,
    direction: Option<Direction>,
}

fn rule(pattern: &str) -> Rule {
    Rule {
        regex: Regex::new(pattern).expect("Invalid intent regex"),
        relationship: None,
        direction: None,
    }
}

fn hinted(pattern: &str, relationship: RelationshipType, direction: Direction) -> Rule {
    Rule {
        regex: Regex::new(pattern).expect("Invalid intent regex"),
        relationship: Some(relationship),
        direction: Some(direction),
    }
}

struct AmbiguityPatterns {
    bare_person: Regex,
    generic_topic: Regex,
}

static AMBIGUITY_PATTERNS: LazyLock<AmbiguityPatterns> = LazyLock::new(|| AmbiguityPatterns {
    bare_person: Regex::new(r"(?i)^\s*who\s+(?:is|was)\s+(?P<name>[a-z]+)\s*[?.!]*\s*$")
        .expect("Invalid ambiguity regex"),
    generic_topic: Regex::new(
        r"(?i)^\s*tell\s+me\s+about\s+(?:the\s+|a\s+|an\s+)?(?P<term>[a-z]+)\s*[?.!]*\s*$",
    )
    .expect("Invalid ambiguity regex"),
});

static RULES: LazyLock<Vec<(Intent, Vec<Rule>)>> = LazyLock::new(|| {
    use Direction::*;
    use RelationshipType::*;

    vec![
        (
            Intent::PathFinding,
            vec![
                rule(r"(?i)^\s*how\s+(?:are|were|is|was)\s+(?P<source>.+?)\s+and\s+(?P<target>.+?)\s+(?:connected|related|linked)\b"),
                rule(r"(?i)\b(?:relationship|connection|link|path)s?\s+between\s+(?P<source>.+?)\s+and\s+(?P<target>.+?)\s*[?.!]*\s*$"),
                rule(r"(?i)^\s*how\s+(?:is|was|does|did)\s+(?P<source>.+?)\s+(?:connected|related|linked|connect|relate)\s+(?:to|with)\s+(?P<target>.+?)\s*[?.!]*\s*$"),
                rule(r"(?i)^\s*(?:find|show)\s+(?:me\s+)?(?:a\s+|the\s+)?path\s+from\s+(?P<source>.+?)\s+to\s+(?P<target>.+?)\s*[?.!]*\s*$"),
                rule(r"(?i)^\s*what\s+connects\s+(?P<source>.+?)\s+(?:and|to|with)\s+(?P<target>.+?)\s*[?.!]*\s*$"),
            ],
        ),
        (
            Intent::ConceptSearch,
            vec![
                rule(r"(?i)\b(?:e-?mails?|messages?|documents?|conversations?|threads?)\s+(?:about|regarding|concerning|discussing|mentioning|on)\s+(?P<concept>.+)$"),
                rule(r"(?i)\bfind\s+(?:.+?\s+)?related\s+to\s+(?P<concept>.+)$"),
                rule(r"(?i)\b(?:anything|everything|something)\s+(?:about|related\s+to|regarding)\s+(?P<concept>.+)$"),
                rule(r"(?i)\bsimilar\s+to\s+(?P<concept>.+)$"),
                rule(r"(?i)^\s*search\s+(?:for\s+)?(?P<concept>.+)$"),
            ],
        ),
        (
            Intent::Aggregation,
            vec![
                rule(r"(?i)^\s*how\s+many\s+(?:e-?mails?|messages?)\s+(?:did|has|have)\s+(?P<entity>.+?)\s+(?P<verb>send|sent|write|written|receive|received|get|got)\b"),
                rule(r"(?i)^\s*how\s+many\s+(?:e-?mails?|messages?)\s+(?:(?:were|was|have\s+been|has\s+been)\s+)?(?:sent\s+|received\s+)?(?P<verb>from|by|to)\s+(?P<entity>.+?)\s*[?.!]*\s*$"),
                hinted(r"(?i)^\s*how\s+many\s+(?:people|persons|contacts|users)\s+(?:did|has|have)\s+(?P<entity>.+?)\s+(?:e-?mail(?:ed)?|contact(?:ed)?|message(?:d)?|write\s+to|written\s+to|communicate(?:d)?\s+with|talk(?:ed)?\s+to)\b", CommunicatesWith, Both),
                hinted(r"(?i)^\s*how\s+many\s+(?P<etype>organi[sz]ations?|compan(?:y|ies)|people|persons|projects?|topics?|locations?)\s+(?:did|has|have)\s+(?P<entity>.+?)\s+mention(?:ed)?\b", Mentions, Outgoing),
                rule(r"(?i)^\s*how\s+many\s+(?P<etype>organi[sz]ations?|compan(?:y|ies)|people|persons|projects?|topics?|locations?|e-?mails?)\s+(?:are|were|is|was)\s+(?:there|mentioned|referenced|in\s+the\s+graph)\b"),
            ],
        ),
        (
            Intent::Relationship,
            vec![
                hinted(r"(?i)^\s*who\s+did\s+(?P<entity>.+?)\s+(?:e-?mail|message|contact|write\s+to|send\s+(?:e-?mails?|messages?)\s+to)\b", Sent, Outgoing),
                hinted(r"(?i)^\s*who\s+(?:e-?mailed|messaged|contacted|wrote\s+to|sent\s+(?:e-?mails?|messages?)\s+to)\s+(?P<entity>.+?)\s*[?.!]*\s*$", Received, Incoming),
                hinted(r"(?i)^\s*who\s+(?:did|has)\s+(?P<entity>.+?)\s+(?:receive|received|get|got)\s+(?:e-?mails?|messages?)\s+from\b", Received, Incoming),
                hinted(r"(?i)^\s*who\s+(?:did|does|has)\s+(?P<entity>.+?)\s+(?:communicate|communicated|talk|talked|correspond|corresponded|work|worked)\s+with\b", CommunicatesWith, Both),
                hinted(r"(?i)^\s*who\s+(?:communicates|communicated|talks|talked|corresponds|corresponded|works|worked)\s+with\s+(?P<entity>.+?)\s*[?.!]*\s*$", CommunicatesWith, Both),
                hinted(r"(?i)^\s*what\s+(?P<etype>organi[sz]ations?|compan(?:y|ies)|topics?|projects?|people|locations?)\s+(?:did|does|has)\s+(?P<entity>.+?)\s+(?:mention|mentioned|reference|referenced|discuss|discussed)\b", Mentions, Outgoing),
            ],
        ),
        (
            Intent::EntityLookup,
            vec![
                rule(r"(?i)^\s*(?:who|what)\s+(?:is|was|are|were)\s+(?P<name>.+?)\s*[?.!]*\s*$"),
                rule(r"(?i)^\s*tell\s+me\s+(?:more\s+)?about\s+(?P<name>.+?)\s*[?.!]*\s*$"),
                rule(r"(?i)^\s*show\s+(?:me\s+)?(?P<name>.+?)\s*[?.!]*\s*$"),
                rule(r"(?i)^\s*(?:look\s+up|lookup|find)\s+(?P<name>.+?)\s*[?.!]*\s*$"),
                rule(r"(?i)^\s*(?:describe|info\s+on|details\s+(?:on|for|about))\s+(?P<name>.+?)\s*[?.!]*\s*$"),
            ],
        ),
    ]
});

/// First names common enough in the corpus that a bare "who is X" needs a
/// surname before it can be answered.
static COMMON_FIRST_NAMES: &[&str] = &[
    "john", "jeff", "mike", "michael", "david", "chris", "mark", "james", "robert", "steve",
    "steven", "richard", "tom", "thomas", "paul", "bill", "william", "kevin", "scott", "susan",
    "sara", "sarah", "mary", "karen", "lisa", "linda", "jennifer", "kim", "dan", "daniel",
    "greg", "andy", "andrew", "joe", "brian", "eric", "jim", "bob", "sally", "kate",
];

/// Subjects too broad for a "tell me about X" lookup.
static GENERIC_TERMS: &[&str] = &[
    "meeting", "meetings", "project", "projects", "deal", "deals", "company", "companies",
    "email", "emails", "contract", "contracts", "report", "reports", "trading", "energy",
    "stock", "merger", "budget", "presentation", "schedule", "issue", "problem", "everything",
];

const NAME_KEYS: [&str; 5] = ["name", "entity", "source", "target", "concept"];

// =============================================================================
// PatternMatcher
// =============================================================================

/// Rule-based classifier mapping a natural-language query to a [`MatchResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternMatcher;

impl PatternMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Classify `query`.
    ///
    /// Fails only with [`ChatError::EmptyQuery`] for empty or whitespace-only
    /// input; an unrecognised query is `Intent::Unknown`, not an error.
    pub fn classify(&self, query: &str) -> Result<MatchResult, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        if let Some(ambiguous) = self.check_ambiguity(query) {
            return Ok(ambiguous);
        }

        for (intent, rules) in RULES.iter() {
            for r in rules {
                if let Some(caps) = r.regex.captures(query) {
                    if let Some(result) = extract(*intent, r, &caps) {
                        return Ok(result);
                    }
                }
            }
        }

        Ok(MatchResult::unknown())
    }

    /// Detect a bare common first name or a generic topic.
    pub fn check_ambiguity(&self, query: &str) -> Option<MatchResult> {
        let pats = &*AMBIGUITY_PATTERNS;

        if let Some(caps) = pats.bare_person.captures(query) {
            let raw = caps.name("name")?.as_str();
            if COMMON_FIRST_NAMES.contains(&raw.to_lowercase().as_str()) {
                let name = capitalize(raw);
                return Some(ambiguous("name", &name, person_options(&name)));
            }
        }

        if let Some(caps) = pats.generic_topic.captures(query) {
            let raw = caps.name("term")?.as_str().to_lowercase();
            if GENERIC_TERMS.contains(&raw.as_str()) {
                return Some(ambiguous("term", &raw, topic_options(&raw)));
            }
        }

        None
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Trim whitespace and trailing `?`, `.`, `!` from an extracted argument.
pub fn clean_arg(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string()
}

fn extract(intent: Intent, r: &Rule, caps: &Captures<'_>) -> Option<MatchResult> {
    let mut result = MatchResult::new(intent);

    for key in NAME_KEYS {
        if let Some(m) = caps.name(key) {
            let value = clean_arg(m.as_str());
            if value.is_empty() {
                return None;
            }
            result.args.insert(key.to_string(), value);
        }
    }

    if let Some(m) = caps.name("etype") {
        if let Some(t) = EntityType::parse(m.as_str()) {
            result
                .args
                .insert("entity_type".to_string(), t.as_str().to_string());
        }
    }

    let relationship = r
        .relationship
        .or_else(|| caps.name("verb").and_then(|m| relationship_from_verb(m.as_str())));
    if let Some(rel) = relationship {
        result
            .args
            .insert("relationship_type".to_string(), rel.as_str().to_string());
    }

    let direction = r
        .direction
        .or_else(|| relationship.map(|rel| rel.default_direction()));
    if let Some(dir) = direction {
        result
            .args
            .insert("direction".to_string(), dir.as_str().to_string());
    }

    Some(result)
}

fn relationship_from_verb(verb: &str) -> Option<RelationshipType> {
    match verb.to_lowercase().as_str() {
        "send" | "sent" | "write" | "written" | "from" | "by" => Some(RelationshipType::Sent),
        "receive" | "received" | "get" | "got" | "to" => Some(RelationshipType::Received),
        _ => None,
    }
}

fn ambiguous(key: &str, value: &str, options: Vec<String>) -> MatchResult {
    let mut result = MatchResult::new(Intent::Ambiguous).with_arg(key, value);
    result.ambiguous = true;
    result.options = options;
    result
}

fn person_options(name: &str) -> Vec<String> {
    vec![
        format!("Show every person named {}", name),
        format!("Who is {} <last name>? (use the full name)", name),
        format!("Emails that mention {}", name),
    ]
}

fn topic_options(term: &str) -> Vec<String> {
    vec![
        format!("Emails about {}", term),
        format!("Organizations related to {}", term),
        format!("People who discussed {}", term),
    ]
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + &c.as_str().to_lowercase(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(q: &str) -> MatchResult {
        PatternMatcher::new().classify(q).unwrap()
    }

    // ---- Validation ----

    #[test]
    fn test_empty_query_is_error() {
        let m = PatternMatcher::new();
        assert!(matches!(m.classify(""), Err(ChatError::EmptyQuery)));
        assert!(matches!(m.classify("   \t\n"), Err(ChatError::EmptyQuery)));
    }

    #[test]
    fn test_no_match_is_unknown() {
        let r = classify("hello there");
        assert_eq!(r.intent, Intent::Unknown);
        assert!(r.args.is_empty());
        assert!(!r.ambiguous);
    }

    // ---- Ambiguity ----

    #[test]
    fn test_bare_first_name_is_ambiguous() {
        let r = classify("Who is John?");
        assert_eq!(r.intent, Intent::Ambiguous);
        assert!(r.ambiguous);
        assert!(r.options.len() >= 2 && r.options.len() <= 3);
        assert_eq!(r.arg("name"), Some("John"));
    }

    #[test]
    fn test_full_name_is_not_ambiguous() {
        let r = classify("Who is Jeff Skilling?");
        assert_ne!(r.intent, Intent::Ambiguous);
        assert!(!r.ambiguous);
        assert_eq!(r.intent, Intent::EntityLookup);
        assert_eq!(r.arg("name"), Some("Jeff Skilling"));
    }

    #[test]
    fn test_uncommon_single_name_is_lookup() {
        let r = classify("Who is Skilling?");
        assert_eq!(r.intent, Intent::EntityLookup);
        assert_eq!(r.arg("name"), Some("Skilling"));
    }

    #[test]
    fn test_generic_topic_is_ambiguous() {
        let r = classify("Tell me about the project");
        assert_eq!(r.intent, Intent::Ambiguous);
        assert!(r.options.iter().any(|o| o.contains("project")));
    }

    #[test]
    fn test_specific_topic_is_lookup() {
        let r = classify("Tell me about Enron Broadband Services");
        assert_eq!(r.intent, Intent::EntityLookup);
        assert_eq!(r.arg("name"), Some("Enron Broadband Services"));
    }

    // ---- Path finding ----

    #[test]
    fn test_path_how_are_connected_beats_lookup() {
        let r = classify("How are Jeff Skilling and Kenneth Lay connected?");
        assert_eq!(r.intent, Intent::PathFinding);
        assert_eq!(r.arg("source"), Some("Jeff Skilling"));
        assert_eq!(r.arg("target"), Some("Kenneth Lay"));
    }

    #[test]
    fn test_path_relationship_between() {
        let r = classify("What is the relationship between Andrew Fastow and LJM?");
        assert_eq!(r.intent, Intent::PathFinding);
        assert_eq!(r.arg("source"), Some("Andrew Fastow"));
        assert_eq!(r.arg("target"), Some("LJM"));
    }

    #[test]
    fn test_path_connected_to() {
        let r = classify("how is Sherron Watkins connected to Kenneth Lay");
        assert_eq!(r.intent, Intent::PathFinding);
        assert_eq!(r.arg("source"), Some("Sherron Watkins"));
        assert_eq!(r.arg("target"), Some("Kenneth Lay"));
    }

    #[test]
    fn test_path_from_to() {
        let r = classify("Find a path from Jeff Skilling to Enron!");
        assert_eq!(r.intent, Intent::PathFinding);
        assert_eq!(r.arg("target"), Some("Enron"));
    }

    // ---- Concept search ----

    #[test]
    fn test_concept_emails_about() {
        let r = classify("Show me emails about the California energy crisis.");
        assert_eq!(r.intent, Intent::ConceptSearch);
        assert_eq!(r.arg("concept"), Some("the California energy crisis"));
    }

    #[test]
    fn test_concept_find_related_to() {
        let r = classify("find messages related to off-balance-sheet partnerships");
        assert_eq!(r.intent, Intent::ConceptSearch);
        assert_eq!(r.arg("concept"), Some("off-balance-sheet partnerships"));
    }

    #[test]
    fn test_concept_anything_about() {
        let r = classify("anything about raptor hedges?");
        assert_eq!(r.intent, Intent::ConceptSearch);
        assert_eq!(r.arg("concept"), Some("raptor hedges"));
    }

    // ---- Aggregation ----

    #[test]
    fn test_aggregation_emails_sent() {
        let r = classify("How many emails did Jeff Skilling send?");
        assert_eq!(r.intent, Intent::Aggregation);
        assert_eq!(r.arg("entity"), Some("Jeff Skilling"));
        assert_eq!(r.arg("relationship_type"), Some("SENT"));
    }

    #[test]
    fn test_aggregation_emails_received() {
        let r = classify("how many emails did Kenneth Lay receive");
        assert_eq!(r.intent, Intent::Aggregation);
        assert_eq!(r.arg("relationship_type"), Some("RECEIVED"));
        assert_eq!(r.arg("direction"), Some("incoming"));
    }

    #[test]
    fn test_aggregation_emails_from() {
        let r = classify("How many emails were sent from Sherron Watkins?");
        assert_eq!(r.intent, Intent::Aggregation);
        assert_eq!(r.arg("entity"), Some("Sherron Watkins"));
        assert_eq!(r.arg("relationship_type"), Some("SENT"));
    }

    #[test]
    fn test_aggregation_people_emailed() {
        let r = classify("How many people did Kenneth Lay email?");
        assert_eq!(r.intent, Intent::Aggregation);
        assert_eq!(r.arg("entity"), Some("Kenneth Lay"));
        assert_eq!(r.arg("relationship_type"), Some("COMMUNICATES_WITH"));
    }

    #[test]
    fn test_aggregation_organizations_mentioned() {
        let r = classify("How many organizations are mentioned?");
        assert_eq!(r.intent, Intent::Aggregation);
        assert_eq!(r.arg("entity_type"), Some("organization"));
        assert_eq!(r.arg("entity"), None);
    }

    // ---- Relationship ----

    #[test]
    fn test_relationship_who_did_x_email() {
        let r = classify("Who did Jeff Skilling email?");
        assert_eq!(r.intent, Intent::Relationship);
        assert_eq!(r.arg("entity"), Some("Jeff Skilling"));
        assert_eq!(r.arg("relationship_type"), Some("SENT"));
        assert_eq!(r.arg("direction"), Some("outgoing"));
    }

    #[test]
    fn test_relationship_who_emailed_x() {
        let r = classify("Who emailed Kenneth Lay?");
        assert_eq!(r.intent, Intent::Relationship);
        assert_eq!(r.arg("entity"), Some("Kenneth Lay"));
        assert_eq!(r.arg("relationship_type"), Some("RECEIVED"));
        assert_eq!(r.arg("direction"), Some("incoming"));
    }

    #[test]
    fn test_relationship_communicate_with() {
        let r = classify("Who did Andrew Fastow communicate with?");
        assert_eq!(r.intent, Intent::Relationship);
        assert_eq!(r.arg("relationship_type"), Some("COMMUNICATES_WITH"));
    }

    #[test]
    fn test_relationship_organizations_mentioned() {
        let r = classify("What organizations did Sherron Watkins mention?");
        assert_eq!(r.intent, Intent::Relationship);
        assert_eq!(r.arg("entity"), Some("Sherron Watkins"));
        assert_eq!(r.arg("relationship_type"), Some("MENTIONS"));
        assert_eq!(r.arg("entity_type"), Some("organization"));
    }

    #[test]
    fn test_relationship_with_pronoun_entity() {
        let r = classify("who did he email?");
        assert_eq!(r.intent, Intent::Relationship);
        assert_eq!(r.arg("entity"), Some("he"));
    }

    // ---- Entity lookup ----

    #[test]
    fn test_lookup_what_is() {
        let r = classify("What is Enron Online?");
        assert_eq!(r.intent, Intent::EntityLookup);
        assert_eq!(r.arg("name"), Some("Enron Online"));
    }

    #[test]
    fn test_lookup_show_me() {
        let r = classify("show me Kenneth Lay");
        assert_eq!(r.intent, Intent::EntityLookup);
        assert_eq!(r.arg("name"), Some("Kenneth Lay"));
    }

    // ---- Argument cleanup ----

    #[test]
    fn test_clean_arg_strips_trailing_punctuation() {
        assert_eq!(clean_arg("  Kenneth Lay?!. "), "Kenneth Lay");
        assert_eq!(clean_arg("Enron Corp."), "Enron Corp");
        assert_eq!(clean_arg("?"), "");
    }

    #[test]
    fn test_args_trimmed_of_punctuation() {
        let r = classify("Who is Jeff Skilling???");
        assert_eq!(r.arg("name"), Some("Jeff Skilling"));
    }
}
