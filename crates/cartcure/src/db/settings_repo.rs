//! Key/value settings table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::DatabaseError;

pub fn get(conn: &Connection, name: &str) -> Result<Option<String>, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Inserts or replaces a setting.
pub fn set(
    conn: &Connection,
    name: &str,
    value: &str,
    updated_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO settings (name, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![name, value, updated_at],
    )?;
    Ok(())
}

/// All settings sorted by name.
pub fn all(conn: &Connection) -> Result<Vec<(String, String)>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT name, value FROM settings ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
