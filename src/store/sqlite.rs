// src/store/sqlite.rs — SQLite operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::warn;

use crate::store::schema;

/// Low-level key-value operations over the embedded database.
/// Transcripts are stored as string key → serialized string value;
/// the session index is a separate enumerable table.
pub struct Store {
    conn: Connection,
}

/// Raw session-index row. Timestamps stay RFC 3339 strings at this layer.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub id: String,
    pub first_message: String,
    pub created_at: String,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        // WAL mode for concurrent readers during writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    /// Create an in-memory database (testing and degraded mode).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    /// Open the database, falling back to an in-memory store when the file
    /// is unavailable. History then lasts only for the process lifetime,
    /// which beats refusing to serve at all.
    pub fn open_or_memory(path: &Path) -> anyhow::Result<Self> {
        match Self::open(path) {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!(
                    "Chat history database unavailable at {}: {e}. \
                     Continuing with in-memory storage only.",
                    path.display()
                );
                Self::in_memory()
            }
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // -- Transcripts --

    /// Point lookup. Returns None for an absent key; never an error for
    /// a missing session.
    pub fn get_transcript(&self, session_id: &str) -> anyhow::Result<Option<String>> {
        let body = self
            .conn
            .query_row(
                "SELECT body FROM transcripts WHERE session_id = ?1",
                [session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body)
    }

    /// Full-value overwrite, last writer wins.
    pub fn put_transcript(&self, session_id: &str, body: &str) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO transcripts (session_id, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET body = ?2, updated_at = ?3",
            params![session_id, body, now],
        )?;
        Ok(())
    }

    /// Used only by bulk cleanup.
    pub fn delete_transcript(&self, session_id: &str) -> anyhow::Result<()> {
        self.conn.execute(
            "DELETE FROM transcripts WHERE session_id = ?1",
            [session_id],
        )?;
        Ok(())
    }

    // -- Session index --

    /// Idempotent by id: inserting the same session twice leaves one row.
    pub fn add_summary(
        &self,
        id: &str,
        first_message: &str,
        created_at: &str,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sessions (id, first_message, created_at)
             VALUES (?1, ?2, ?3)",
            params![id, first_message, created_at],
        )?;
        Ok(())
    }

    /// Enumerate all known sessions. Display ordering is the caller's job.
    pub fn list_summaries(&self) -> anyhow::Result<Vec<SummaryRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, first_message, created_at FROM sessions")?;

        let rows = stmt.query_map([], |row| {
            Ok(SummaryRow {
                id: row.get(0)?,
                first_message: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Used only by bulk cleanup.
    pub fn remove_summary(&self, id: &str) -> anyhow::Result<()> {
        self.conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
        Ok(())
    }
}
