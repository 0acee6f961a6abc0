//! SQLite record store.
//!
//! One connection behind a mutex, shared by the engine, the scheduler thread
//! and the CLI. Repositories are free functions over `&Connection` so the same
//! code runs inside or outside a transaction.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction};
use rust_decimal::Decimal;

pub mod activity_repo;
pub mod error;
pub mod invoice_repo;
pub mod job_repo;
pub mod migrations;
pub mod notification_repo;
pub mod settings_repo;

pub use error::DatabaseError;

/// Shared handle to the record store. Clones point at the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the store at `path`, creating parent directories and the file
    /// as needed, and migrates it to the latest schema.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| DatabaseError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::prepare(conn)?;
        log::info!("Record store ready at {}", path.display());
        Ok(db)
    }

    /// A private in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&guard)
    }

    /// Runs `f` inside a transaction that commits only if `f` succeeds.
    ///
    /// Cross-entity mutations (a job and its invoice) go through here so
    /// both rows change together or not at all.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let mut guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let tx = guard.transaction().map_err(DatabaseError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DatabaseError::from)?;
        Ok(value)
    }
}

/// `~/.cartcure/data/cartcure.db`
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".cartcure").join("data").join("cartcure.db"))
}

/// Reads a decimal stored as text.
pub(crate) fn decimal_column(row: &Row<'_>, column: &str) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(column)?;
    Decimal::from_str(&text).map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_in_memory_store_is_migrated() {
        let db = Database::open_in_memory().unwrap();
        let version = db.with_conn(migrations::current_version).unwrap();
        assert_eq!(version, migrations::latest_version());
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("store.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        let mode: String = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        Database::open(&path)
            .unwrap()
            .with_conn(|conn| settings_repo::set(conn, "payment_terms_days", "14", Utc::now()))
            .unwrap();

        let reopened = Database::open(&path).unwrap();
        let value = reopened
            .with_conn(|conn| settings_repo::get(conn, "payment_terms_days"))
            .unwrap();
        assert_eq!(value.as_deref(), Some("14"));
    }

    #[test]
    fn test_failed_transaction_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<(), DatabaseError> = db.with_transaction(|tx| {
            settings_repo::set(tx, "gst_rate", "0.15", Utc::now())?;
            Err(DatabaseError::MissingRow {
                table: "jobs",
                key: "J-0001".into(),
            })
        });
        assert!(matches!(result, Err(DatabaseError::MissingRow { .. })));

        let value = db.with_conn(|conn| settings_repo::get(conn, "gst_rate")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_clones_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();
        db.with_conn(|conn| settings_repo::set(conn, "gst_registered", "false", Utc::now()))
            .unwrap();
        let value = other
            .with_conn(|conn| settings_repo::get(conn, "gst_registered"))
            .unwrap();
        assert_eq!(value.as_deref(), Some("false"));
    }

    #[test]
    fn test_default_path_is_under_home() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with(".cartcure/data/cartcure.db"));
    }
}
