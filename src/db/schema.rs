// src/db/schema.rs
// Database schema and migrations

use rusqlite::Connection;
use tracing::info;

use super::migration_helpers::{add_column_if_missing, table_exists};

/// Base tables. Created only if absent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    summary TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    path TEXT NOT NULL,
    description TEXT,
    prompt TEXT,
    mime TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    sender TEXT NOT NULL,
    content TEXT,
    type TEXT NOT NULL DEFAULT 'text',
    timestamp INTEGER NOT NULL,
    image_id INTEGER REFERENCES images(id)
);
"#;

/// Indexes depend on migrated columns, so they run after migrations
const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_session_ts ON messages(session_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_images_session ON images(session_id);
"#;

/// Run all schema setup and migrations.
///
/// Idempotent: tables are created only if missing and columns are added only
/// when an older database lacks them.
pub fn run_all_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;

    migrate_sessions_columns(conn)?;
    migrate_messages_columns(conn)?;
    migrate_images_columns(conn)?;
    normalize_legacy_timestamps(conn, "messages")?;
    normalize_legacy_timestamps(conn, "images")?;

    conn.execute_batch(INDEXES)?;
    Ok(())
}

/// Early databases created `sessions` with only an id and a timestamp.
/// SQLite rejects a CURRENT_TIMESTAMP default on ALTER, so `created_at`
/// stays NULL for old rows.
fn migrate_sessions_columns(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "sessions", "summary", "TEXT")?;
    add_column_if_missing(conn, "sessions", "created_at", "TEXT")
}

/// Early `messages` tables had no type or image reference
fn migrate_messages_columns(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "messages", "type", "TEXT NOT NULL DEFAULT 'text'")?;
    add_column_if_missing(conn, "messages", "timestamp", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, "messages", "image_id", "INTEGER REFERENCES images(id)")
}

fn migrate_images_columns(conn: &Connection) -> rusqlite::Result<()> {
    if !table_exists(conn, "images") {
        return Ok(());
    }
    add_column_if_missing(conn, "images", "mime", "TEXT")?;
    add_column_if_missing(conn, "images", "description", "TEXT")?;
    add_column_if_missing(conn, "images", "prompt", "TEXT")?;
    add_column_if_missing(conn, "images", "timestamp", "INTEGER NOT NULL DEFAULT 0")
}

/// Older databases declared `timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP`,
/// leaving `YYYY-MM-DD HH:MM:SS` text in the column. Rewrite those values as
/// unix milliseconds; unparseable or NULL values become 0.
fn normalize_legacy_timestamps(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    if !table_exists(conn, table) {
        return Ok(());
    }
    let updated = conn.execute(
        &format!(
            "UPDATE {table}
             SET timestamp = COALESCE(CAST(strftime('%s', timestamp) AS INTEGER) * 1000, 0)
             WHERE typeof(timestamp) IN ('text', 'null')"
        ),
        [],
    )?;
    if updated > 0 {
        info!(table, rows = updated, "Converted legacy timestamps to unix milliseconds");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migration_helpers::column_exists;

    #[test]
    fn test_run_all_migrations_fresh() {
        let conn = Connection::open_in_memory().unwrap();
        run_all_migrations(&conn).unwrap();

        assert!(table_exists(&conn, "sessions"));
        assert!(table_exists(&conn, "messages"));
        assert!(table_exists(&conn, "images"));
        assert!(column_exists(&conn, "messages", "image_id"));
    }

    #[test]
    fn test_run_all_migrations_twice() {
        let conn = Connection::open_in_memory().unwrap();
        run_all_migrations(&conn).unwrap();
        run_all_migrations(&conn).unwrap();
    }

    #[test]
    fn test_migrates_legacy_sessions_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO sessions DEFAULT VALUES;",
        )
        .unwrap();

        run_all_migrations(&conn).unwrap();

        assert!(column_exists(&conn, "sessions", "summary"));
        assert!(column_exists(&conn, "sessions", "created_at"));
        let summary: Option<String> = conn
            .query_row("SELECT summary FROM sessions WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert!(summary.is_none());
    }

    #[test]
    fn test_migrates_legacy_messages_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER,
                sender TEXT,
                content TEXT
            );",
        )
        .unwrap();

        run_all_migrations(&conn).unwrap();

        assert!(column_exists(&conn, "messages", "type"));
        assert!(column_exists(&conn, "messages", "timestamp"));
        assert!(column_exists(&conn, "messages", "image_id"));
    }

    #[test]
    fn test_converts_legacy_text_timestamps() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                summary TEXT
            );
            CREATE TABLE messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER,
                sender TEXT,
                content TEXT,
                image_id INTEGER,
                timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO sessions DEFAULT VALUES;
            INSERT INTO messages (session_id, sender, content, timestamp)
                VALUES (1, 'user', 'old', '2024-05-01 10:00:00');
            INSERT INTO messages (session_id, sender, content, timestamp)
                VALUES (1, 'minerva', 'garbled', 'not a date');",
        )
        .unwrap();

        run_all_migrations(&conn).unwrap();
        run_all_migrations(&conn).unwrap();

        let stamps: Vec<(String, i64)> = conn
            .prepare("SELECT typeof(timestamp), timestamp FROM messages ORDER BY id")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            stamps,
            vec![("integer".to_string(), 1_714_557_600_000), ("integer".to_string(), 0)]
        );
    }
}
