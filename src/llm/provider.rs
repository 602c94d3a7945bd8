// src/llm/provider.rs
// External capabilities used by the chat loop

use anyhow::Result;
use async_trait::async_trait;

use crate::db::Turn;

/// Produces an assistant reply from an ordered transcript
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// `instructions` carries the persona and running summary; `turns` is
    /// oldest-first and ends with the new user turn.
    async fn complete(&self, instructions: Option<&str>, turns: &[Turn]) -> Result<String>;
}

/// Condenses recent turns into a running summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Returns the updated summary. `existing` is folded in, not discarded.
    async fn summarize(&self, existing: Option<&str>, turns: &[Turn]) -> Result<String>;
}
