// src/lib.rs
// Minerva: SQLite-backed conversation store with a chat front end

pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod llm;
pub mod repl;
pub mod summary;

pub use conversation::{ChatSession, Exchange};
pub use db::Store;
pub use error::{MinervaError, Result};
pub use summary::{SummaryRefresh, maybe_refresh_summary};
