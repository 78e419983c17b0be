use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{non_empty, now_ms, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub content: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub timestamp_ms: i64,
}

pub struct States<'a> {
    conn: &'a Mutex<Connection>,
}

impl<'a> States<'a> {
    pub(crate) fn new(conn: &'a Mutex<Connection>) -> Self {
        Self { conn }
    }

    pub fn save(&self, agent_name: &str, content: &str) -> Result<SavedState, StorageError> {
        let timestamp_ms = now_ms();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO states (agent_name, timestamp, content) VALUES (?1, ?2, ?3)",
            params![agent_name, timestamp_ms, content],
        )?;
        Ok(SavedState { timestamp_ms })
    }

    pub fn latest(&self, agent_name: &str) -> Result<Option<StateRecord>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT content, timestamp FROM states WHERE agent_name = ?1 \
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )?;
        Ok(stmt
            .query_row(params![agent_name], state_from_row)
            .optional()?)
    }

    /// Up to `limit` most recent states, newest first.
    pub fn latest_n(
        &self,
        agent_name: &str,
        limit: u32,
    ) -> Result<Option<Vec<StateRecord>>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT content, timestamp FROM states WHERE agent_name = ?1 \
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![agent_name, limit], state_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(non_empty(rows))
    }
}

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<StateRecord> {
    Ok(StateRecord {
        content: row.get(0)?,
        timestamp_ms: row.get(1)?,
    })
}
