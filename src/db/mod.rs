// src/db/mod.rs
// Conversation store on SQLite
//
// Every operation opens its own connection, runs its statements and drops
// the connection. Nothing spans more than one logical operation, so an image
// row can outlive a failed message insert.

mod context;
pub mod image;
mod message;
mod migration_helpers;
mod schema;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use image::{ImageMime, InlineImage, encode_data_url, parse_data_url};
pub use message::{IMAGE_PLACEHOLDER, image_caption};
pub use schema::run_all_migrations;
pub use types::*;

use rusqlite::Connection;
use std::time::Duration;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{MinervaError, Result};
use session::{
    count_messages_sync, count_user_messages_sync, create_session_sync, get_summary_sync,
    list_sessions_sync, save_summary_sync, session_exists_sync,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the conversation store. Holds configuration only; connections
/// are opened per call.
#[derive(Debug, Clone)]
pub struct Store {
    config: StoreConfig,
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open a fresh connection to the database file
    pub(crate) fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.config.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    /// Create the schema if missing and migrate older databases. Idempotent.
    pub fn init(&self) -> Result<()> {
        self.open_initialized()?;
        Ok(())
    }

    fn open_initialized(&self) -> Result<Connection> {
        if !self.config.db_path.exists() {
            info!(path = %self.config.db_path.display(), "Initializing new conversation store");
        }

        let conn = self.connect()?;
        run_all_migrations(&conn)?;
        Ok(conn)
    }

    /// Create a session and return its id.
    ///
    /// Initializes the schema first, which also brings databases from older
    /// revisions up to date.
    pub fn create_session(&self) -> Result<i64> {
        let conn = self.open_initialized()?;
        let session_id = create_session_sync(&conn)?;

        info!(session_id, "Created session");
        Ok(session_id)
    }

    /// Fail with `SessionNotFound` unless the session exists
    pub fn ensure_session(&self, session_id: i64) -> Result<()> {
        let conn = self.connect()?;
        if session_exists_sync(&conn, session_id)? {
            Ok(())
        } else {
            Err(MinervaError::SessionNotFound(session_id))
        }
    }

    /// Running summary, if one has been saved
    pub fn get_summary(&self, session_id: i64) -> Result<Option<String>> {
        let conn = self.connect()?;
        Ok(get_summary_sync(&conn, session_id)?)
    }

    /// Overwrite the running summary
    pub fn save_summary(&self, session_id: i64, summary: &str) -> Result<()> {
        let conn = self.connect()?;
        match save_summary_sync(&conn, session_id, summary)? {
            0 => Err(MinervaError::SessionNotFound(session_id)),
            _ => Ok(()),
        }
    }

    pub fn count_messages(&self, session_id: i64) -> Result<i64> {
        let conn = self.connect()?;
        Ok(count_messages_sync(&conn, session_id)?)
    }

    pub fn count_user_messages(&self, session_id: i64) -> Result<i64> {
        let conn = self.connect()?;
        Ok(count_user_messages_sync(&conn, session_id)?)
    }

    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionInfo>> {
        let conn = self.connect()?;
        Ok(list_sessions_sync(&conn, limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::setup_test_store;

    #[test]
    fn test_create_session_initializes_store() {
        let (dir, store) = setup_test_store();
        assert!(!store.config().db_path.exists());

        let first = store.create_session().unwrap();
        assert!(store.config().db_path.exists());
        assert!(first > 0);

        let second = store.create_session().unwrap();
        assert!(second > first);
        drop(dir);
    }

    #[test]
    fn test_create_session_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig::new(
            dir.path().join("a/b/minerva.db"),
            dir.path().join("images"),
        ));
        store.create_session().unwrap();
        assert!(dir.path().join("a/b/minerva.db").exists());
    }

    #[test]
    fn test_create_session_unreachable_store() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the database file should be
        let store = Store::new(StoreConfig::new(dir.path(), dir.path().join("images")));
        assert!(store.create_session().is_err());
    }

    #[test]
    fn test_init_and_ensure_session() {
        let (_dir, store) = setup_test_store();
        store.init().unwrap();
        store.init().unwrap();
        assert!(matches!(
            store.ensure_session(1),
            Err(MinervaError::SessionNotFound(1))
        ));

        let sid = store.create_session().unwrap();
        store.ensure_session(sid).unwrap();
        assert!(store.list_sessions(10).unwrap().iter().any(|s| s.id == sid));
    }

    #[test]
    fn test_save_summary_unknown_session() {
        let (_dir, store) = setup_test_store();
        store.create_session().unwrap();
        assert!(matches!(
            store.save_summary(42, "x"),
            Err(MinervaError::SessionNotFound(42))
        ));
    }

    #[test]
    fn test_user_message_count() {
        let (_dir, store) = setup_test_store();
        let sid = store.create_session().unwrap();
        store.save_text(sid, Sender::User, "q").unwrap();
        store.save_text(sid, Sender::Assistant, "a").unwrap();
        assert_eq!(store.count_messages(sid).unwrap(), 2);
        assert_eq!(store.count_user_messages(sid).unwrap(), 1);
    }

    #[test]
    fn test_legacy_database_readable_and_writable() {
        let (_dir, store) = setup_test_store();
        {
            let conn = Connection::open(&store.config().db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
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
                INSERT INTO messages (session_id, sender, content) VALUES (1, 'user', 'old');",
            )
            .unwrap();
        }

        store.init().unwrap();
        store.save_text(1, Sender::User, "new").unwrap();

        let turns = store.get_recent_messages(1, 5).unwrap();
        let texts: Vec<_> = turns.iter().filter_map(|t| t.text_content()).collect();
        assert_eq!(texts, vec!["old", "new"]);
        assert!(turns[0].timestamp < turns[1].timestamp);
        assert_eq!(store.list_sessions(5).unwrap()[0].message_count, 2);
    }
}
