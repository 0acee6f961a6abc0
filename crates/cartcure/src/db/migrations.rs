//! Schema versioning.
//!
//! Each step runs in its own transaction together with the `_migrations`
//! row that records it, so a failed step leaves the version unchanged.

use chrono::Utc;
use rusqlite::{params, Connection};

use super::error::DatabaseError;

/// One schema step. `unless_column` names a `(table, column)` whose presence
/// means the step's DDL is already in effect.
struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
    unless_column: Option<(&'static str, &'static str)>,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "jobs",
        sql: include_str!("sql/001_create_jobs.sql"),
        unless_column: None,
    },
    Step {
        version: 2,
        name: "invoices",
        sql: include_str!("sql/002_create_invoices.sql"),
        unless_column: None,
    },
    Step {
        version: 3,
        name: "settings",
        sql: include_str!("sql/003_create_settings.sql"),
        unless_column: None,
    },
    Step {
        version: 4,
        name: "activity_log",
        sql: include_str!("sql/004_create_activity_log.sql"),
        unless_column: None,
    },
    Step {
        version: 5,
        name: "sent_notifications",
        sql: include_str!("sql/005_create_sent_notifications.sql"),
        unless_column: None,
    },
    Step {
        version: 6,
        name: "jobs.hold_started_at",
        sql: include_str!("sql/006_add_hold_started_at.sql"),
        unless_column: Some(("jobs", "hold_started_at")),
    },
];

/// Highest schema version this build knows about.
pub fn latest_version() -> u32 {
    STEPS.last().map(|s| s.version).unwrap_or(0)
}

/// Version recorded in the `_migrations` table, 0 for a new database.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )?;

    let from = current_version(conn)?;
    for step in STEPS.iter().filter(|s| s.version > from) {
        apply(conn, step)?;
    }
    Ok(())
}

fn apply(conn: &Connection, step: &Step) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: step.version,
        reason: e.to_string(),
    };

    let already_applied = match step.unless_column {
        Some((table, column)) => has_column(conn, table, column)?,
        None => false,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    if already_applied {
        log::info!("Schema v{} ({}) already present", step.version, step.name);
    } else {
        log::info!("Applying schema v{} ({})", step.version, step.name);
        tx.execute_batch(step.sql).map_err(failed)?;
    }
    tx.execute(
        "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![step.version, step.name, Utc::now()],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        conn
    }

    #[test]
    fn test_fresh_database_reaches_latest_version() {
        let conn = fresh();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(latest_version(), 6);
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let conn = fresh();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, STEPS.len() as u32);
    }

    #[test]
    fn test_column_step_recorded_when_column_exists() {
        let conn = fresh();
        conn.execute_batch(include_str!("sql/001_create_jobs.sql"))
            .unwrap();
        conn.execute_batch("ALTER TABLE jobs ADD COLUMN hold_started_at TEXT;")
            .unwrap();

        run_all(&conn).unwrap();
        assert!(has_column(&conn, "jobs", "hold_started_at").unwrap());
        assert!(!has_column(&conn, "jobs", "archived_at").unwrap());
        assert_eq!(current_version(&conn).unwrap(), 6);
    }

    #[test]
    fn test_every_table_created() {
        let conn = fresh();
        run_all(&conn).unwrap();
        for table in ["jobs", "invoices", "settings", "activity_log", "sent_notifications"] {
            let count: u32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }
}
