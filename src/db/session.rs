// src/db/session.rs
// Session rows and running summary storage

use rusqlite::{Connection, OptionalExtension, params};

use super::types::SessionInfo;

/// Insert a new session with a null summary and return its id
pub fn create_session_sync(conn: &Connection) -> rusqlite::Result<i64> {
    conn.execute("INSERT INTO sessions (summary) VALUES (NULL)", [])?;
    Ok(conn.last_insert_rowid())
}

pub fn session_exists_sync(conn: &Connection, session_id: i64) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sessions WHERE id = ?",
            [session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Running summary for a session. None if the session is missing or has no
/// summary yet.
pub fn get_summary_sync(conn: &Connection, session_id: i64) -> rusqlite::Result<Option<String>> {
    let summary: Option<Option<String>> = conn
        .query_row(
            "SELECT summary FROM sessions WHERE id = ?",
            [session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(summary.flatten().filter(|s| !s.is_empty()))
}

/// Overwrite the running summary. Returns the number of rows updated.
pub fn save_summary_sync(
    conn: &Connection,
    session_id: i64,
    summary: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sessions SET summary = ? WHERE id = ?",
        params![summary, session_id],
    )
}

pub fn count_messages_sync(conn: &Connection, session_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE session_id = ?",
        [session_id],
        |row| row.get(0),
    )
}

pub fn count_user_messages_sync(conn: &Connection, session_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE session_id = ? AND sender = 'user'",
        [session_id],
        |row| row.get(0),
    )
}

/// Most recent sessions, newest first
pub fn list_sessions_sync(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<SessionInfo>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.summary, s.created_at,
                (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.id)
         FROM sessions s
         ORDER BY s.id DESC
         LIMIT ?",
    )?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok(SessionInfo {
            id: row.get(0)?,
            summary: row.get(1)?,
            created_at: row.get(2)?,
            message_count: row.get(3)?,
        })
    })?;
    rows.collect()
}
