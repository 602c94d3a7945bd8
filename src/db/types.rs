// src/db/types.rs
// Data structures returned by database operations

use std::fmt;

use super::image::InlineImage;
use crate::error::{MinervaError, Result};

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role name used by the completion API
    pub fn role(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Label written to the `sender` column
    pub fn stored_label<'a>(&self, assistant_label: &'a str) -> &'a str {
        match self {
            Self::User => "user",
            Self::Assistant => assistant_label,
        }
    }

    /// Normalize a stored label. Both `assistant` and the configured
    /// assistant label map to `Assistant`.
    pub fn from_stored(label: &str, assistant_label: &str) -> Option<Self> {
        match label {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            l if l == assistant_label => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role())
    }
}

/// Value of the `type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(MinervaError::InvalidInput(format!(
                "unknown message type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnBody {
    Text(String),
    Image {
        /// Synthetic caption stored as message content (None if the image
        /// could not be persisted)
        caption: Option<String>,
        /// Payload re-read from disk; None if the file is gone
        image: Option<InlineImage>,
    },
}

/// One message in a context window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub sender: Sender,
    /// Unix milliseconds
    pub timestamp: i64,
    pub body: TurnBody,
}

impl Turn {
    pub fn text(sender: Sender, timestamp: i64, content: impl Into<String>) -> Self {
        Self {
            sender,
            timestamp,
            body: TurnBody::Text(content.into()),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.body {
            TurnBody::Text(_) => MessageKind::Text,
            TurnBody::Image { .. } => MessageKind::Image,
        }
    }

    /// Text part of the turn, if any
    pub fn text_content(&self) -> Option<&str> {
        match &self.body {
            TurnBody::Text(t) => Some(t.as_str()),
            TurnBody::Image { caption, .. } => caption.as_deref(),
        }
    }

    pub fn image(&self) -> Option<&InlineImage> {
        match &self.body {
            TurnBody::Image { image, .. } => image.as_ref(),
            TurnBody::Text(_) => None,
        }
    }
}

/// Recent turns plus the running summary
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    pub summary: Option<String>,
    pub turns: Vec<Turn>,
}

/// Result of a `save_message` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedMessage {
    pub message_id: i64,
    /// Set only when an image was persisted
    pub image_id: Option<i64>,
    /// Content actually stored
    pub content: Option<String>,
}

/// Session info
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: i64,
    pub summary: Option<String>,
    pub message_count: i64,
    pub created_at: Option<String>,
}

/// Raw row from the recent-messages query, before normalization
#[derive(Debug, Clone)]
pub(crate) struct MessageRow {
    pub sender: String,
    pub content: Option<String>,
    pub kind: Option<String>,
    pub timestamp: i64,
    pub image_path: Option<String>,
    pub image_mime: Option<String>,
}
