//! CLI argument definitions for the mailgraph host.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Ask questions about a knowledge graph built from an email corpus.
#[derive(Parser, Debug)]
#[command(name = "mailgraph", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to a JSON graph snapshot.
    #[arg(short = 'g', long = "graph")]
    pub graph: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Answer a single query and exit instead of starting the REPL.
    #[arg(short = 'q', long = "query")]
    pub query: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MAILGRAPH_CONFIG env var > ~/.mailgraph/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MAILGRAPH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the graph snapshot path.
    ///
    /// Priority: --graph flag > MAILGRAPH_GRAPH env var > config file value.
    pub fn resolve_graph_path(&self, config_graph: Option<&str>) -> Option<PathBuf> {
        self.resolve_graph_path_with_env(std::env::var("MAILGRAPH_GRAPH").ok(), config_graph)
    }

    fn resolve_graph_path_with_env(
        &self,
        env_graph: Option<String>,
        config_graph: Option<&str>,
    ) -> Option<PathBuf> {
        if let Some(ref p) = self.graph {
            return Some(p.clone());
        }
        if let Some(p) = env_graph.filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(p));
        }
        config_graph.filter(|p| !p.is_empty()).map(expand_home)
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".mailgraph").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".mailgraph").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "mailgraph",
            "--graph",
            "enron.json",
            "-l",
            "debug",
            "--query",
            "Who is Jeff Skilling?",
        ]);
        assert_eq!(args.graph, Some(PathBuf::from("enron.json")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.query.as_deref(), Some("Who is Jeff Skilling?"));
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::parse_from(["mailgraph", "-c", "/tmp/mg.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/mg.toml"));
    }

    #[test]
    fn test_graph_path_precedence() {
        let flagged = CliArgs::parse_from(["mailgraph", "-g", "flag.json"]);
        assert_eq!(
            flagged.resolve_graph_path_with_env(Some("env.json".into()), Some("cfg.json")),
            Some(PathBuf::from("flag.json"))
        );

        let bare = CliArgs::parse_from(["mailgraph"]);
        assert_eq!(
            bare.resolve_graph_path_with_env(Some("env.json".into()), Some("cfg.json")),
            Some(PathBuf::from("env.json"))
        );
        assert_eq!(
            bare.resolve_graph_path_with_env(None, Some("cfg.json")),
            Some(PathBuf::from("cfg.json"))
        );
        assert_eq!(bare.resolve_graph_path_with_env(Some(String::new()), None), None);
    }

    #[test]
    fn test_log_level_fallback() {
        let args = CliArgs::parse_from(["mailgraph"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");
        let args = CliArgs::parse_from(["mailgraph", "--log-level", "trace"]);
        assert_eq!(args.resolve_log_level("warn"), "trace");
    }
}
