//! mailgraph binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Load the graph snapshot into memory and index embeddings
//! 3. Build the query handler over the offline LLM client
//! 4. Answer a one-shot `--query`, or run the interactive REPL

mod cli;
mod repl;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;

use mailgraph_chat::repository::embedding_text;
use mailgraph_chat::{LlmClient, MemoryGraph, PatternLlmClient, QueryHandler};
use mailgraph_core::MailgraphConfig;

use cli::CliArgs;

/// Load the snapshot and embed every entity with `llm`.
async fn load_graph(
    path: Option<&Path>,
    llm: &PatternLlmClient,
) -> Result<MemoryGraph, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        tracing::warn!("No graph snapshot configured (use --graph or MAILGRAPH_GRAPH); starting empty");
        return Ok(MemoryGraph::new());
    };

    let mut graph = MemoryGraph::load(path)?;
    let texts: Vec<(i64, String)> = graph.entities().map(|e| (e.id, embedding_text(e))).collect();
    for (id, text) in texts {
        let embedding = llm.generate_embedding(&text).await?;
        graph.index_embedding(id, embedding);
    }
    tracing::info!(embeddings = graph.embedding_count(), "Embeddings indexed");
    Ok(graph)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = MailgraphConfig::load_or_default(&config_file);

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting mailgraph v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Graph and collaborators.
    let llm = PatternLlmClient::new();
    let graph_path = args.resolve_graph_path(config.general.graph_path.as_deref());
    let graph = match load_graph(graph_path.as_deref(), &llm).await {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load graph snapshot");
            return Err(e);
        }
    };

    let deadline = config.chat.query_timeout();
    let handler = QueryHandler::with_config(
        Arc::new(graph),
        Arc::new(llm),
        config.chat.clone(),
        &config.schema,
    );
    let context = Mutex::new(handler.new_context());

    if let Some(query) = args.query {
        return match repl::answer(&handler, &context, &query, deadline).await {
            Ok(text) => {
                println!("{}", text);
                Ok(())
            }
            Err(text) => Err(text.into()),
        };
    }

    repl::run(&handler, &context, deadline).await?;
    tracing::info!("Goodbye");
    Ok(())
}
