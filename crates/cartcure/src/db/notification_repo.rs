//! Dedup set of notifications that have already gone out.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::DatabaseError;

/// Records `key` as sent. Returns false when it was already present.
pub fn record(conn: &Connection, key: &str, sent_at: DateTime<Utc>) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO sent_notifications (dedup_key, sent_at) VALUES (?1, ?2)",
        params![key, sent_at],
    )?;
    Ok(inserted > 0)
}

pub fn contains(conn: &Connection, key: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM sent_notifications WHERE dedup_key = ?1",
        params![key],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}
