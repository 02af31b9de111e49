//! SQLite persistence for manuals, steps, tags and attachment metadata.
//!
//! All writes run inside a single transaction and validate before touching
//! any row. Storage-level unique indexes on `tags.name` and
//! `manual_tags(manual_id, tag_id)` are the source of truth for uniqueness.

mod queries;
mod schema;
mod tags;
mod writes;

pub use writes::StepImageOutcome;

use crate::config::DatabaseConfig;
use crate::error::{ManualError, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Handle to the manual database. Cloning shares the connection.
#[derive(Clone)]
pub struct ManualStore {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl ManualStore {
    /// Create or open the database at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ManualError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path).map_err(|e| ManualError::Database {
            message: format!("Failed to open database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;
        Self::configure_connection(&conn)?;
        schema::ensure_schema(&conn)?;

        debug!("Opened manual store at {}", db_path.display());
        Ok(Self {
            db_path: Some(db_path),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            db_path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout={};
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            ",
            DatabaseConfig::BUSY_TIMEOUT_MS
        ))?;
        Ok(())
    }

    /// Database file path (`None` for in-memory stores).
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ManualError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }
}

/// Begin a write transaction that takes the database write lock up front, so
/// writers on other connections wait out the busy timeout instead of failing
/// on a stale read snapshot.
pub(crate) fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Whether `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests;
