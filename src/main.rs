//! Minerva - terminal chat with a persistent, summarized conversation log
//!
//! Text and image turns are stored per session in SQLite; each request sends
//! the most recent turns plus a running summary to the Responses API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use minerva::config::{self, MinervaConfig, Overrides, Settings};
use minerva::conversation::ChatSession;
use minerva::db::Store;
use minerva::error::MinervaError;
use minerva::llm::OpenAiClient;
use minerva::repl::{self, Repl};

#[derive(Parser)]
#[command(name = "minerva")]
#[command(about = "Chat with an LLM; every session is kept in a local SQLite log")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "MINERVA_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Directory for stored image files
    #[arg(long, global = true, env = "MINERVA_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    /// Model used for replies and summaries
    #[arg(long, global = true, env = "MINERVA_MODEL")]
    model: Option<String>,

    /// Upper bound on tokens per response
    #[arg(long, global = true, env = "MINERVA_MAX_OUTPUT_TOKENS")]
    max_output_tokens: Option<u32>,

    /// Number of recent messages sent as context
    #[arg(long, global = true, env = "MINERVA_CONTEXT_LIMIT")]
    context_limit: Option<usize>,

    /// Refresh the running summary every N messages (0 disables)
    #[arg(long, global = true, env = "MINERVA_SUMMARY_EVERY_N")]
    summary_every: Option<usize>,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new chat session (default)
    Chat,

    /// List recent sessions
    Sessions {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show the latest messages of a session
    History {
        session: i64,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show the running summary of a session
    Summary { session: i64 },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            db_path: self.db_path.clone(),
            images_dir: self.images_dir.clone(),
            model: self.model.clone(),
            max_output_tokens: self.max_output_tokens,
            context_limit: self.context_limit,
            summary_every_n: self.summary_every,
            openai_api_key: self.openai_api_key.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env before clap reads env-backed args
    let data_dir = config::data_dir();
    let env_path = config::env::load_dotenv(&data_dir);

    // Logs go to stderr so they don't interleave with the chat on stdout
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = env_path {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let cli = Cli::parse();
    let settings = Settings::resolve(cli.overrides(), MinervaConfig::load(), data_dir.clone());
    let store = Store::new(settings.store.clone());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(settings, store, data_dir.join("history")).await,
        Commands::Sessions { limit } => {
            store.init().context("Failed to open conversation store")?;
            let sessions = store.list_sessions(limit)?;
            if sessions.is_empty() {
                println!("No sessions yet.");
            }
            for session in sessions {
                let summary = session
                    .summary
                    .as_deref()
                    .map(first_line)
                    .unwrap_or("(no summary)");
                println!(
                    "#{:<5} {:<20} {:>4} msgs  {}",
                    session.id,
                    session.created_at.as_deref().unwrap_or("-"),
                    session.message_count,
                    summary
                );
            }
            Ok(())
        }
        Commands::History { session, limit } => {
            store.init().context("Failed to open conversation store")?;
            store.ensure_session(session)?;
            repl::print_turns(&store.get_recent_messages(session, limit)?);
            Ok(())
        }
        Commands::Summary { session } => {
            store.init().context("Failed to open conversation store")?;
            store.ensure_session(session)?;
            match store.get_summary(session)? {
                Some(summary) => println!("{}", summary),
                None => println!("No summary yet."),
            }
            Ok(())
        }
    }
}

async fn run_chat(settings: Settings, store: Store, history_path: PathBuf) -> Result<()> {
    let api_key = settings.openai_api_key.clone().ok_or_else(|| {
        MinervaError::Config(format!(
            "OPENAI_API_KEY required (set via --openai-api-key, env var, or {})",
            config::config_path().display()
        ))
    })?;

    let client = Arc::new(OpenAiClient::from_settings(api_key, &settings.chat));
    let chat = ChatSession::start(store, client.clone(), client, settings.chat)?;

    let mut repl = Repl::new(chat, history_path)?;
    repl.run().await
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
