use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection};

use crate::api::models::Conversation;
use crate::error::StorageError;

// Conversation summaries are cached so the chat list has something to show
// before the first fetch returns.
#[derive(Debug, Clone)]
pub struct ConversationCache {
    path: PathBuf,
}

impl ConversationCache {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let cache = Self { path: path.into() };
        cache.init()?;
        Ok(cache)
    }

    pub fn open_default() -> Result<Self, StorageError> {
        let proj = ProjectDirs::from("com", "example", "SendMe").ok_or(StorageError::NoDir)?;
        Self::open(proj.data_dir().join("cache.sqlite"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Connection::open(&self.path)?)
    }

    fn init(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS conversations (
                user_id TEXT PRIMARY KEY,
                touched_at TEXT NOT NULL,
                raw_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Makes `conversations` the whole cached list. Rows for counterparts
    /// missing from it are dropped in the same transaction.
    pub fn replace_all(&self, conversations: &[Conversation]) -> Result<(), StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM conversations", [])?;
        for c in conversations {
            let touched_at: DateTime<Utc> = c.last_message.created_at;
            tx.execute(
                r#"
                INSERT INTO conversations (user_id, touched_at, raw_json)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                    touched_at=excluded.touched_at,
                    raw_json=excluded.raw_json
                "#,
                params![c.user.id, touched_at, serde_json::to_string(c)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recently active first. Rows that no longer decode are skipped.
    pub fn load(&self, limit: usize) -> Result<Vec<Conversation>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT raw_json FROM conversations ORDER BY touched_at DESC, user_id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for raw in rows {
            match serde_json::from_str::<Conversation>(&raw?) {
                Ok(c) => out.push(c),
                Err(e) => log::warn!("Skipping cached conversation: {e}"),
            }
        }
        Ok(out)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.connect()?.execute("DELETE FROM conversations", [])?;
        Ok(())
    }
}
