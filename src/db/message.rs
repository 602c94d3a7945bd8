// src/db/message.rs
// Message writer: text and image turns

use chrono::Utc;
use rusqlite::{Connection, params};
use std::path::Path;
use tracing::{debug, warn};

use super::Store;
use super::image::{ImageMime, parse_data_url, write_image_file};
use super::types::{MessageKind, SavedMessage, Sender};
use crate::error::{MinervaError, Result};

/// Stored content for an image turn with neither prompt nor description
pub const IMAGE_PLACEHOLDER: &str = "[image]";

// ═══════════════════════════════════════════════════════════════════════════════
// Sync functions
// ═══════════════════════════════════════════════════════════════════════════════

/// Next timestamp for a session: wall-clock milliseconds, bumped past the
/// latest stored timestamp so ordering stays strict within the session.
pub fn next_timestamp_sync(conn: &Connection, session_id: i64) -> rusqlite::Result<i64> {
    let last: Option<i64> = conn.query_row(
        "SELECT MAX(timestamp) FROM messages WHERE session_id = ?",
        [session_id],
        |row| row.get(0),
    )?;
    let now = Utc::now().timestamp_millis();
    Ok(match last {
        Some(last) if last >= now => last + 1,
        _ => now,
    })
}

pub fn insert_image_sync(
    conn: &Connection,
    session_id: i64,
    path: &Path,
    mime: ImageMime,
    description: Option<&str>,
    prompt: Option<&str>,
    timestamp: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO images (session_id, path, description, prompt, mime, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session_id,
            path.to_string_lossy(),
            description,
            prompt,
            mime.as_str(),
            timestamp
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_message_sync(
    conn: &Connection,
    session_id: i64,
    sender: &str,
    content: Option<&str>,
    kind: MessageKind,
    timestamp: i64,
    image_id: Option<i64>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO messages (session_id, sender, content, type, timestamp, image_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![session_id, sender, content, kind.as_str(), timestamp, image_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Caption stored in place of the image payload. The prompt wins over the
/// description; blank values count as absent.
pub fn image_caption(prompt: Option<&str>, description: Option<&str>) -> String {
    fn non_blank(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }
    match (non_blank(prompt), non_blank(description)) {
        (Some(prompt), _) => format!("{} {}", IMAGE_PLACEHOLDER, prompt),
        (None, Some(description)) => format!("{} {}", IMAGE_PLACEHOLDER, description),
        (None, None) => IMAGE_PLACEHOLDER.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store impl methods
// ═══════════════════════════════════════════════════════════════════════════════

impl Store {
    /// Append a turn to a session.
    ///
    /// Text turns require content. Image turns expect a data URL; if it cannot
    /// be decoded or written, the failure is logged and the message is stored
    /// with null content and no image reference.
    pub fn save_message(
        &self,
        session_id: i64,
        sender: Sender,
        content: Option<&str>,
        kind: MessageKind,
        description: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<SavedMessage> {
        if kind == MessageKind::Text && content.is_none() {
            return Err(MinervaError::InvalidInput(
                "text message requires content".into(),
            ));
        }

        let conn = self.connect()?;
        let timestamp = next_timestamp_sync(&conn, session_id)?;

        let (stored, image_id) = match kind {
            MessageKind::Text => (content.map(str::to_string), None),
            MessageKind::Image => {
                match self.persist_image(&conn, session_id, timestamp, content, description, prompt)
                {
                    Ok(image_id) => (Some(image_caption(prompt, description)), Some(image_id)),
                    Err(e) => {
                        warn!(session_id, error = %e, "Failed to persist image, saving message without it");
                        (None, None)
                    }
                }
            }
        };

        let label = sender.stored_label(&self.config.assistant_label);
        let message_id = insert_message_sync(
            &conn,
            session_id,
            label,
            stored.as_deref(),
            kind,
            timestamp,
            image_id,
        )?;

        debug!(session_id, message_id, kind = %kind, sender = %sender, "Saved message");
        Ok(SavedMessage {
            message_id,
            image_id,
            content: stored,
        })
    }

    pub fn save_text(&self, session_id: i64, sender: Sender, text: &str) -> Result<SavedMessage> {
        self.save_message(session_id, sender, Some(text), MessageKind::Text, None, None)
    }

    pub fn save_image(
        &self,
        session_id: i64,
        sender: Sender,
        data_url: &str,
        description: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<SavedMessage> {
        self.save_message(
            session_id,
            sender,
            Some(data_url),
            MessageKind::Image,
            description,
            prompt,
        )
    }

    /// Decode, write the file, then insert the image row. The file is removed
    /// again if the row cannot be inserted.
    fn persist_image(
        &self,
        conn: &Connection,
        session_id: i64,
        timestamp: i64,
        content: Option<&str>,
        description: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<i64> {
        let content = content
            .ok_or_else(|| MinervaError::MalformedImage("image message has no payload".into()))?;
        let decoded = parse_data_url(content)?;
        let path = write_image_file(&self.config.images_dir, session_id, timestamp, &decoded)?;

        match insert_image_sync(conn, session_id, &path, decoded.mime, description, prompt, timestamp)
        {
            Ok(image_id) => {
                debug!(session_id, image_id, path = %path.display(), "Stored image");
                Ok(image_id)
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %rm, "Failed to remove orphaned image file");
                }
                Err(e.into())
            }
        }
    }
}
