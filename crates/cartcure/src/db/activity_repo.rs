//! Append-only activity log.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::DatabaseError;

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub id: String,
    /// "job" or "invoice".
    pub entity_type: String,
    pub entity_key: String,
    pub action: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        entity_type: &str,
        entity_key: &str,
        action: &str,
        detail: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity_type: entity_type.to_string(),
            entity_key: entity_key.to_string(),
            action: action.to_string(),
            detail,
            created_at: at,
        }
    }
}

pub fn append(conn: &Connection, entry: &ActivityEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO activity_log (id, entity_type, entity_key, action, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.entity_type,
            entry.entity_key,
            entry.action,
            entry.detail,
            entry.created_at,
        ],
    )?;
    Ok(())
}

/// Entries for one entity, oldest first.
pub fn list_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_key: &str,
) -> Result<Vec<ActivityEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_key, action, detail, created_at FROM activity_log
         WHERE entity_type = ?1 AND entity_key = ?2 ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(params![entity_type, entity_key], |r| {
            Ok(ActivityEntry {
                id: r.get(0)?,
                entity_type: r.get(1)?,
                entity_key: r.get(2)?,
                action: r.get(3)?,
                detail: r.get(4)?,
                created_at: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
