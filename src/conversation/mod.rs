// src/conversation/mod.rs
// Chat orchestration: context, completion, persistence, summary refresh

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ChatSettings;
use crate::db::{
    ImageMime, InlineImage, SavedMessage, Sender, SessionInfo, Store, Turn, TurnBody,
    image_caption,
};
use crate::llm::{CompletionClient, Summarizer, build_instructions};
use crate::summary::{SummaryRefresh, maybe_refresh_summary};

/// Result of one user/assistant round trip
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user: SavedMessage,
    pub reply: String,
    pub assistant: SavedMessage,
    /// Refresh check run after the user turn was saved
    pub user_summary: SummaryRefresh,
    /// Refresh check run after the assistant reply was saved
    pub summary: SummaryRefresh,
}

/// One interactive chat bound to a single session
pub struct ChatSession {
    store: Store,
    completion: Arc<dyn CompletionClient>,
    summarizer: Arc<dyn Summarizer>,
    settings: ChatSettings,
    session_id: i64,
}

impl ChatSession {
    /// Create a fresh session in the store and bind to it
    pub fn start(
        store: Store,
        completion: Arc<dyn CompletionClient>,
        summarizer: Arc<dyn Summarizer>,
        settings: ChatSettings,
    ) -> Result<Self> {
        let session_id = store
            .create_session()
            .context("Failed to open conversation store")?;

        Ok(Self {
            store,
            completion,
            summarizer,
            settings,
            session_id,
        })
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Send a text message and return the assistant reply
    pub async fn send_text(&self, text: &str) -> Result<Exchange> {
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("Message is empty");
        }

        let turn = Turn::text(Sender::User, Utc::now().timestamp_millis(), text);
        self.exchange(turn, |store, sid| store.save_text(sid, Sender::User, text))
            .await
    }

    /// Send an image file, optionally with a question about it
    pub async fn send_image(&self, path: &Path, prompt: Option<&str>) -> Result<Exchange> {
        let mime = ImageMime::from_path(path)
            .with_context(|| format!("Unsupported image type: {}", path.display()))?;
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;

        let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());
        let image = InlineImage::from_bytes(mime, &bytes);
        let data_url = image.data_url();

        debug!(path = %path.display(), mime = %mime, size = bytes.len(), "Sending image");

        let turn = Turn {
            sender: Sender::User,
            timestamp: Utc::now().timestamp_millis(),
            body: TurnBody::Image {
                caption: Some(image_caption(prompt, None)),
                image: Some(image),
            },
        };
        self.exchange(turn, |store, sid| {
            store.save_image(sid, Sender::User, &data_url, None, prompt)
        })
        .await
    }

    /// Read context, persist the user turn, complete, persist the reply.
    ///
    /// The context is read before the user turn is written so the new turn
    /// is not duplicated in the request. The assistant reply is stored only
    /// when the completion succeeds.
    async fn exchange<F>(&self, turn: Turn, save_user: F) -> Result<Exchange>
    where
        F: FnOnce(&Store, i64) -> crate::error::Result<SavedMessage>,
    {
        let window = self
            .store
            .get_context(self.session_id, self.settings.context_limit)
            .context("Failed to load conversation context")?;

        let user = save_user(&self.store, self.session_id).context("Failed to save message")?;
        let user_summary = self.refresh_summary().await;

        let mut turns = window.turns;
        turns.push(turn);
        let instructions = build_instructions(&self.settings.persona, window.summary.as_deref());

        let reply = self
            .completion
            .complete(instructions.as_deref(), &turns)
            .await
            .context("Completion request failed")?;

        let assistant = self
            .store
            .save_text(self.session_id, Sender::Assistant, &reply)
            .context("Failed to save assistant reply")?;
        let summary = self.refresh_summary().await;

        info!(
            session_id = self.session_id,
            context_turns = turns.len(),
            reply_len = reply.len(),
            "Exchange complete"
        );

        Ok(Exchange {
            user,
            reply,
            assistant,
            user_summary,
            summary,
        })
    }

    async fn refresh_summary(&self) -> SummaryRefresh {
        maybe_refresh_summary(
            &self.store,
            self.summarizer.as_ref(),
            self.session_id,
            self.settings.summary_every_n,
        )
        .await
    }

    /// Running summary of this session
    pub fn summary(&self) -> Result<Option<String>> {
        Ok(self.store.get_summary(self.session_id)?)
    }

    /// Most recent turns of this session, oldest first
    pub fn history(&self, limit: usize) -> Result<Vec<Turn>> {
        Ok(self.store.get_recent_messages(self.session_id, limit)?)
    }

    /// Id, summary and message count of this session
    pub fn info(&self) -> Result<SessionInfo> {
        Ok(SessionInfo {
            id: self.session_id,
            summary: self.store.get_summary(self.session_id)?,
            message_count: self.store.count_messages(self.session_id)?,
            created_at: None,
        })
    }
}
