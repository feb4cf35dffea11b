//! Interactive read-eval-print loop.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use mailgraph_chat::{ConversationContext, ErrorKind, QueryHandler, ResponseFormatter};

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    History,
    Entities,
    Help,
    Quit,
    Query(String),
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if !line.starts_with('/') {
            return Command::Query(line.to_string());
        }
        match line.to_lowercase().as_str() {
            "/clear" => Command::Clear,
            "/history" => Command::History,
            "/entities" => Command::Entities,
            "/help" | "/?" => Command::Help,
            "/quit" | "/exit" | "/q" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

const HELP: &str = "Ask a question about the email graph, or use a command:
  /clear     forget the conversation so far
  /history   show recent turns
  /entities  show entities mentioned in this conversation
  /quit      exit";

pub fn render_history(context: &ConversationContext) -> String {
    if context.history().is_empty() {
        return "No history yet.".to_string();
    }
    context
        .history()
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            format!(
                "{}. [{}] User: {}\n   Assistant: {}",
                i + 1,
                turn.timestamp.format("%H:%M:%S"),
                turn.query,
                turn.response.replace('\n', "\n   ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_entities(context: &ConversationContext) -> String {
    let tracked = context.tracked_entities();
    if tracked.is_empty() {
        return "No entities tracked yet.".to_string();
    }
    tracked
        .iter()
        .map(|e| format!("- {} ({}, ID: {})", e.name, e.entity_type, e.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run one query turn and render its outcome for the terminal. Failed
/// turns are worded as a user-facing phrase with the error as details.
pub async fn answer(
    handler: &QueryHandler,
    context: &Mutex<ConversationContext>,
    query: &str,
    deadline: Duration,
) -> Result<String, String> {
    let mut ctx = context.lock().await;
    handler
        .process_query_with_deadline(query, &mut ctx, deadline)
        .await
        .map(|result| result.text)
        .map_err(|e| {
            tracing::warn!(error = %e, "Query failed");
            ResponseFormatter::default().format_error(ErrorKind::Other, &e.to_string())
        })
}

/// Read queries from stdin until EOF or `/quit`.
pub async fn run(
    handler: &QueryHandler,
    context: &Mutex<ConversationContext>,
    deadline: Duration,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}\n", HELP);

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Clear => {
                let mut ctx = context.lock().await;
                handler.clear_context(&mut ctx);
                println!("Conversation cleared.");
            }
            Command::History => println!("{}", render_history(&*context.lock().await)),
            Command::Entities => println!("{}", render_entities(&*context.lock().await)),
            Command::Unknown(cmd) => println!("Unknown command {}. Type /help.", cmd),
            Command::Query(query) => match answer(handler, context, &query, deadline).await {
                Ok(text) => println!("{}\n", text),
                Err(text) => eprintln!("{}\n", text),
            },
        }
    }

    Ok(())
}
