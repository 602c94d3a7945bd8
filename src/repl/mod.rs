//! Interactive REPL for Minerva
//!
//! Readline input with history and slash-command completion. Each plain
//! line is sent as a text turn; `/image` sends an image file.

mod colors;
mod commands;
mod helper;

use anyhow::Result;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::conversation::{ChatSession, Exchange};
use crate::db::{Sender, Turn};
use crate::summary::SummaryRefresh;

pub use commands::{Command, HELP};
use helper::MinervaHelper;

/// Display name for assistant turns
const ASSISTANT_NAME: &str = "minerva";

/// Whether the loop should keep going after a command
enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    editor: Editor<MinervaHelper, DefaultHistory>,
    chat: ChatSession,
    history_path: PathBuf,
}

impl Repl {
    pub fn new(chat: ChatSession, history_path: PathBuf) -> Result<Self> {
        let mut editor = Editor::new()?;
        editor.set_helper(Some(MinervaHelper::new()));

        Ok(Self {
            editor,
            chat,
            history_path,
        })
    }

    fn load_history(&mut self) {
        if self.history_path.exists() {
            if let Err(e) = self.editor.load_history(&self.history_path) {
                debug!(error = %e, "Failed to load REPL history");
            }
        }
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = self.editor.save_history(&self.history_path) {
            debug!(error = %e, "Failed to save REPL history");
        }
    }

    /// Run the REPL loop until /quit, Ctrl+C or Ctrl+D
    pub async fn run(&mut self) -> Result<()> {
        self.load_history();

        let settings = self.chat.settings();
        println!("Welcome 😊");
        println!("{}", colors::banner_line("session", &self.chat.session_id().to_string()));
        println!("{}", colors::banner_line("model", &settings.model));
        let db_path = self.chat.store().config().db_path.display().to_string();
        println!("{}", colors::banner_line("database", &colors::file_path(&db_path)));
        println!("Type /h for help with available commands.");
        println!();

        loop {
            let line = match self.editor.readline("> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!("\nGoodbye! 👋");
                    break;
                }
                Err(err) => {
                    eprintln!("{}", colors::error(&format!("Error: {:?}", err)));
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let _ = self.editor.add_history_entry(trimmed);

            match self.handle(Command::parse(trimmed)).await {
                Flow::Continue => {}
                Flow::Exit => {
                    println!("Goodbye! 👋");
                    break;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    async fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Quit => return Flow::Exit,
            Command::Help => println!("{}", HELP),
            Command::Usage(usage) => println!("{}", usage),
            Command::Unknown(cmd) => {
                println!("Command not found: {}. Type /h for help.", cmd);
            }
            Command::Message(text) => {
                let result = self.chat.send_text(&text).await;
                Self::print_exchange(result);
            }
            Command::Image { path, prompt } => self.send_image(&path, prompt).await,
            Command::Summary => match self.chat.summary() {
                Ok(Some(summary)) => {
                    println!("{}", colors::header("Running summary:"));
                    println!("{}", summary);
                }
                Ok(None) => println!("{}", colors::status("No summary yet.")),
                Err(e) => eprintln!("{}", colors::error(&format!("Error: {:#}", e))),
            },
            Command::History(limit) => match self.chat.history(limit) {
                Ok(turns) if turns.is_empty() => {
                    println!("{}", colors::status("No messages yet."));
                }
                Ok(turns) => print_turns(&turns),
                Err(e) => eprintln!("{}", colors::error(&format!("Error: {:#}", e))),
            },
            Command::Session => match self.chat.info() {
                Ok(info) => {
                    println!("{}", colors::banner_line("session", &info.id.to_string()));
                    println!("{}", colors::banner_line("messages", &info.message_count.to_string()));
                    println!(
                        "{}",
                        colors::banner_line(
                            "summary",
                            if info.summary.is_some() { "yes" } else { "no" }
                        )
                    );
                }
                Err(e) => eprintln!("{}", colors::error(&format!("Error: {:#}", e))),
            },
        }
        Flow::Continue
    }

    /// Send an image; ask for a prompt when none was given on the command line
    async fn send_image(&mut self, path: &Path, prompt: Option<String>) {
        if !path.is_file() {
            println!("{}", colors::warning(&format!("No such file: {}", path.display())));
            return;
        }

        let prompt = match prompt {
            Some(p) => Some(p),
            None => match self.editor.readline("prompt about image: ") {
                Ok(p) => Some(p.trim().to_string()).filter(|p| !p.is_empty()),
                Err(_) => {
                    println!("{}", colors::status("Image cancelled."));
                    return;
                }
            },
        };

        println!("{}", colors::status("Sending image..."));
        let result = self.chat.send_image(path, prompt.as_deref()).await;
        Self::print_exchange(result);
    }

    fn print_exchange(result: Result<Exchange>) {
        match result {
            Ok(exchange) => {
                println!("\n{} {}\n", colors::speaker(ASSISTANT_NAME), exchange.reply);
                if [&exchange.user_summary, &exchange.summary]
                    .iter()
                    .any(|r| matches!(r, SummaryRefresh::Failed))
                {
                    eprintln!("{}", colors::status("Summary refresh failed; keeping the previous one."));
                }
            }
            Err(e) => {
                eprintln!("{}", colors::warning(&format!("Warning: {:#}", e)));
            }
        }
    }
}

/// Print turns oldest first, one block per turn
pub fn print_turns(turns: &[Turn]) {
    for turn in turns {
        let label = match turn.sender {
            Sender::User => "you",
            Sender::Assistant => ASSISTANT_NAME,
        };
        let content = turn.text_content().unwrap_or("[image unavailable]");
        println!("{} {}", colors::speaker(label), content);
        println!("{}", colors::separator(40));
    }
}
