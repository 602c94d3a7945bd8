// src/db/context.rs
// Context reader: recent turns in chronological order

use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, warn};

use super::Store;
use super::image::{ImageMime, InlineImage, read_inline_image};
use super::session::get_summary_sync;
use super::types::{ContextWindow, MessageKind, MessageRow, Sender, Turn, TurnBody};
use crate::error::Result;

/// Most recent rows for a session, newest first, joined with their image
pub(crate) fn get_recent_rows_sync(
    conn: &Connection,
    session_id: i64,
    limit: usize,
) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.sender, m.content, m.type, m.timestamp, i.path, i.mime
         FROM messages m
         LEFT JOIN images i ON m.image_id = i.id
         WHERE m.session_id = ?
         ORDER BY m.timestamp DESC, m.id DESC
         LIMIT ?",
    )?;
    let rows = stmt.query_map(rusqlite::params![session_id, limit as i64], |row| {
        Ok(MessageRow {
            sender: row.get(0)?,
            content: row.get(1)?,
            kind: row.get(2)?,
            timestamp: row.get(3)?,
            image_path: row.get(4)?,
            image_mime: row.get(5)?,
        })
    })?;
    rows.collect()
}

/// Load the image file behind a row, if it still exists
fn load_row_image(path: &str, mime: Option<&str>) -> Option<InlineImage> {
    let path = Path::new(path);
    if !path.exists() {
        debug!(path = %path.display(), "Image file missing, skipping payload");
        return None;
    }

    let mime = match mime.map(ImageMime::parse) {
        Some(Ok(mime)) => mime,
        Some(Err(e)) => {
            warn!(path = %path.display(), error = %e, "Stored image has unsupported MIME type");
            return None;
        }
        None => match ImageMime::from_path(path) {
            Ok(mime) => mime,
            Err(_) => return None,
        },
    };

    match read_inline_image(path, mime) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read image file");
            None
        }
    }
}

/// Turn a raw row into a typed turn. Rows with unknown sender labels yield None.
fn row_to_turn(row: MessageRow, assistant_label: &str) -> Option<Turn> {
    let Some(sender) = Sender::from_stored(&row.sender, assistant_label) else {
        warn!(sender = %row.sender, "Skipping message with unknown sender label");
        return None;
    };

    let is_image = row.image_path.is_some()
        || row
            .kind
            .as_deref()
            .and_then(|k| MessageKind::parse(k).ok())
            == Some(MessageKind::Image);

    let body = if is_image {
        TurnBody::Image {
            caption: row.content,
            image: row
                .image_path
                .as_deref()
                .and_then(|p| load_row_image(p, row.image_mime.as_deref())),
        }
    } else {
        TurnBody::Text(row.content.unwrap_or_default())
    };

    Some(Turn {
        sender,
        timestamp: row.timestamp,
        body,
    })
}

impl Store {
    /// The `limit` most recent turns of a session, oldest first.
    ///
    /// Image payloads are re-read from disk and base64-encoded on every call.
    pub fn get_recent_messages(&self, session_id: i64, limit: usize) -> Result<Vec<Turn>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.connect()?;
        let mut rows = get_recent_rows_sync(&conn, session_id, limit)?;
        drop(conn);

        // Reverse to get chronological order
        rows.reverse();
        Ok(rows
            .into_iter()
            .filter_map(|row| row_to_turn(row, &self.config.assistant_label))
            .collect())
    }

    /// Recent turns prefixed with the running summary
    pub fn get_context(&self, session_id: i64, limit: usize) -> Result<ContextWindow> {
        let summary = {
            let conn = self.connect()?;
            get_summary_sync(&conn, session_id)?
        };
        let turns = self.get_recent_messages(session_id, limit)?;
        Ok(ContextWindow { summary, turns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::image::encode_data_url;
    use crate::db::test_support::setup_test_store;

    // ═══════════════════════════════════════
    // get_recent_messages Tests
    // ═══════════════════════════════════════

    #[test]
    fn test_empty_session_returns_empty() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        assert!(store.get_recent_messages(sid, 5).unwrap().is_empty());
    }

    #[test]
    fn test_single_text_turn() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        store.save_text(sid, Sender::User, "hello").unwrap();

        let turns = store.get_recent_messages(sid, 3).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].sender, Sender::User);
        assert_eq!(turns[0].body, TurnBody::Text("hello".into()));
    }

    #[test]
    fn test_limit_and_chronological_order() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        for i in 0..6 {
            let sender = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
            store.save_text(sid, sender, &format!("m{}", i)).unwrap();
        }

        let turns = store.get_recent_messages(sid, 4).unwrap();
        let texts: Vec<_> = turns.iter().filter_map(|t| t.text_content()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4", "m5"]);
        assert!(turns.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(turns[1].sender, Sender::Assistant);

        assert!(store.get_recent_messages(sid, 0).unwrap().is_empty());
        assert_eq!(store.get_recent_messages(sid, 100).unwrap().len(), 6);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let (_dir, store) = setup_test_store();
        let a = store.create_session().unwrap();
        let b = store.create_session().unwrap();
        store.save_text(a, Sender::User, "from a").unwrap();
        store.save_text(b, Sender::User, "from b").unwrap();
        store.save_text(a, Sender::Assistant, "reply a").unwrap();

        let turns = store.get_recent_messages(a, 10).unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns.iter().all(|t| t.text_content() != Some("from b")));
    }

    #[test]
    fn test_assistant_label_normalized() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        store.save_text(sid, Sender::Assistant, "hi there").unwrap();

        let conn = store.connect().unwrap();
        let label: String = conn
            .query_row("SELECT sender FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(label, "minerva");

        let turns = store.get_recent_messages(sid, 1).unwrap();
        assert_eq!(turns[0].sender, Sender::Assistant);
    }

    #[test]
    fn test_unknown_sender_skipped() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        store.save_text(sid, Sender::User, "kept").unwrap();
        let conn = store.connect().unwrap();
        conn.execute(
            "INSERT INTO messages (session_id, sender, content, type, timestamp)
             VALUES (?, 'system', 'dropped', 'text', 9999999999999)",
            [sid],
        )
        .unwrap();

        let turns = store.get_recent_messages(sid, 5).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text_content(), Some("kept"));
    }

    #[test]
    fn test_image_roundtrip() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        let payload: Vec<u8> = (0u8..=255).collect();
        let url = encode_data_url(ImageMime::Webp, &payload);

        store
            .save_image(sid, Sender::User, &url, None, Some("describe"))
            .unwrap();

        let turns = store.get_recent_messages(sid, 1).unwrap();
        let image = turns[0].image().expect("inline image");
        assert_eq!(image.mime, ImageMime::Webp);
        assert_eq!(image.decode().unwrap(), payload);
        assert_eq!(turns[0].text_content(), Some("[image] describe"));
    }

    #[test]
    fn test_missing_image_file_yields_caption_only() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        let url = encode_data_url(ImageMime::Png, b"png");
        store.save_image(sid, Sender::User, &url, None, None).unwrap();

        for entry in std::fs::read_dir(&store.config().images_dir).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }

        let turns = store.get_recent_messages(sid, 1).unwrap();
        assert_eq!(turns[0].kind(), MessageKind::Image);
        assert!(turns[0].image().is_none());
        assert_eq!(turns[0].text_content(), Some("[image]"));
    }

    #[test]
    fn test_degraded_image_turn() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        store
            .save_image(sid, Sender::User, "data:image/gif;base64,R0lGODlh", None, None)
            .unwrap();

        let turns = store.get_recent_messages(sid, 1).unwrap();
        assert_eq!(
            turns[0].body,
            TurnBody::Image {
                caption: None,
                image: None
            }
        );
    }

    // ═══════════════════════════════════════
    // get_context Tests
    // ═══════════════════════════════════════

    #[test]
    fn test_context_includes_summary() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        store.save_text(sid, Sender::User, "hello").unwrap();

        let ctx = store.get_context(sid, 5).unwrap();
        assert!(ctx.summary.is_none());
        assert_eq!(ctx.turns.len(), 1);

        store.save_summary(sid, "greeting exchanged").unwrap();
        let ctx = store.get_context(sid, 5).unwrap();
        assert_eq!(ctx.summary.as_deref(), Some("greeting exchanged"));
    }
}
