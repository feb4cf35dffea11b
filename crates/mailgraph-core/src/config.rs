use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MailgraphError, Result};
use crate::types::EntityType;

/// Top-level configuration for Mailgraph.
///
/// Loaded from `~/.mailgraph/config.toml` by default. Missing sections and
/// fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailgraphConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

impl MailgraphConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MailgraphConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MailgraphError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// JSON graph snapshot loaded by the host at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_path: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            graph_path: None,
        }
    }
}

/// Conversational query engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of turns retained in a conversation context.
    pub max_history: usize,
    /// Maximum query length in characters.
    pub max_query_length: usize,
    /// Wall-clock budget for a single turn, in seconds.
    pub query_timeout_secs: u64,
    /// Number of results requested from similarity search.
    pub similarity_limit: usize,
    /// Maximum entities listed line by line in a formatted response.
    pub max_listed_entities: usize,
    /// Run the pattern matcher's ambiguity check before calling the LLM.
    pub preflight_ambiguity: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: 5,
            max_query_length: 2000,
            query_timeout_secs: 60,
            similarity_limit: 10,
            max_listed_entities: 20,
            preflight_ambiguity: true,
        }
    }
}

impl ChatConfig {
    /// The per-turn deadline as a `Duration`.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Entity-type schema advertised to the language model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Discovered types promoted into the schema, in addition to the built-ins.
    pub extra_entity_types: Vec<String>,
}

impl SchemaConfig {
    /// Built-in type names followed by any extra types not already present.
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = EntityType::ALL
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        for extra in &self.extra_entity_types {
            let normalized = extra.trim().to_lowercase();
            if !normalized.is_empty() && !types.contains(&normalized) {
                types.push(normalized);
            }
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = MailgraphConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.general.graph_path.is_none());
        assert_eq!(config.chat.max_history, 5);
        assert_eq!(config.chat.max_query_length, 2000);
        assert_eq!(config.chat.query_timeout_secs, 60);
        assert!(config.chat.preflight_ambiguity);
        assert!(config.schema.extra_entity_types.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
graph_path = "/data/enron.json"

[chat]
max_history = 8
max_query_length = 500
query_timeout_secs = 30
similarity_limit = 5
max_listed_entities = 10
preflight_ambiguity = false

[schema]
extra_entity_types = ["meeting", "contract"]
"#;
        let file = create_temp_config(content);
        let config = MailgraphConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.graph_path.as_deref(), Some("/data/enron.json"));
        assert_eq!(config.chat.max_history, 8);
        assert_eq!(config.chat.query_timeout(), Duration::from_secs(30));
        assert!(!config.chat.preflight_ambiguity);
        assert_eq!(config.schema.extra_entity_types, vec!["meeting", "contract"]);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[chat]
similarity_limit = 3
"#;
        let file = create_temp_config(content);
        let config = MailgraphConfig::load(file.path()).unwrap();
        assert_eq!(config.chat.similarity_limit, 3);
        // Remaining fields use defaults
        assert_eq!(config.chat.max_history, 5);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[chat\nmax_history = ");
        let err = MailgraphConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, MailgraphError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = MailgraphConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.chat.max_history, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = MailgraphConfig::default();
        config.chat.max_history = 3;
        config.general.graph_path = Some("graph.json".to_string());
        config.save(&path).unwrap();

        let reloaded = MailgraphConfig::load(&path).unwrap();
        assert_eq!(reloaded.chat.max_history, 3);
        assert_eq!(reloaded.general.graph_path.as_deref(), Some("graph.json"));
    }

    // ---- Schema ----

    #[test]
    fn test_schema_entity_types_builtins_first() {
        let schema = SchemaConfig::default();
        let types = schema.entity_types();
        assert_eq!(types.len(), EntityType::ALL.len());
        assert_eq!(types[0], "person");
    }

    #[test]
    fn test_schema_entity_types_appends_extras_without_duplicates() {
        let schema = SchemaConfig {
            extra_entity_types: vec![
                "Meeting".to_string(),
                "person".to_string(),
                "  ".to_string(),
                "meeting".to_string(),
            ],
        };
        let types = schema.entity_types();
        assert_eq!(types.len(), EntityType::ALL.len() + 1);
        assert_eq!(types.last().map(String::as_str), Some("meeting"));
    }
}
