//! Database module for tutoring sessions
//!
//! One row per session, keyed by id, holding the display title and the
//! serialized snapshot. Writes are upserts: last writer wins per id.

mod schema;

pub use schema::*;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ==================== Session Operations ====================

    /// Insert or overwrite a session
    pub fn save_session(&self, id: &str, title: &str, snapshot: &str) -> DbResult<()> {
        self.save_session_at(id, title, snapshot, Utc::now())
    }

    fn save_session_at(
        &self,
        id: &str,
        title: &str,
        snapshot: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = format_datetime(now);
        conn.execute(
            "INSERT INTO sessions (id, title, snapshot, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at",
            params![id, title, snapshot, now],
        )?;
        Ok(())
    }

    /// Get a session by ID
    pub fn get_session(&self, id: &str) -> DbResult<SessionRecord> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, title, snapshot, created_at, updated_at FROM sessions WHERE id = ?1",
            params![id],
            |row| {
                let created_at: String = row.get(3)?;
                let updated_at: String = row.get(4)?;
                Ok(SessionRecord {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    snapshot: row.get(2)?,
                    created_at: parse_datetime(&created_at),
                    updated_at: parse_datetime(&updated_at),
                })
            },
        )
        .optional()?
        .ok_or_else(|| DbError::SessionNotFound(id.to_string()))
    }

    /// Delete a session. Returns whether a row existed.
    pub fn delete_session(&self, id: &str) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// List sessions, most recently updated first
    pub fn list_sessions(&self) -> DbResult<Vec<SessionSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, title FROM sessions ORDER BY updated_at DESC, id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionSummary {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
