use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{non_empty, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRecord {
    pub agent_name: String,
    pub description: String,
}

pub struct Agents<'a> {
    conn: &'a Mutex<Connection>,
}

impl<'a> Agents<'a> {
    pub(crate) fn new(conn: &'a Mutex<Connection>) -> Self {
        Self { conn }
    }

    pub fn create(&self, agent_name: &str, description: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agents (agent_name, description) VALUES (?1, ?2)",
            params![agent_name, description],
        )?;
        Ok(())
    }

    /// Unread counter for `agent_name`; an unknown agent reads as 0.
    pub fn unread_count(&self, agent_name: &str) -> Result<i64, StorageError> {
        let conn = self.conn.lock();
        let count = conn
            .query_row(
                "SELECT unreaded_messages FROM agents WHERE agent_name = ?1",
                params![agent_name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    pub fn details(&self) -> Result<Option<Vec<AgentRecord>>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT agent_name, description FROM agents ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AgentRecord {
                    agent_name: row.get(0)?,
                    description: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(non_empty(rows))
    }
}

/// Applies a relative change to the unread counter in a single statement,
/// flooring at zero.
pub(crate) fn adjust_unread(
    conn: &Connection,
    agent_name: &str,
    delta: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE agents SET unreaded_messages = MAX(unreaded_messages + ?1, 0) WHERE agent_name = ?2",
        params![delta, agent_name],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{MnemosyneStore, StorageError};

    #[test]
    fn unknown_agent_has_zero_unread() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        assert_eq!(store.agents().unread_count("ghost").expect("count"), 0);
    }

    #[test]
    fn duplicate_agent_is_rejected() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        store.agents().create("a1", "one").expect("create");
        let err = store.agents().create("a1", "again").expect_err("duplicate");
        assert!(matches!(err, StorageError::Sqlite(_)));
    }

    #[test]
    fn blank_name_is_stored_like_any_other() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        store.agents().create("", "blank").expect("create");
        let agents = store.agents().details().expect("details").expect("rows");
        assert_eq!(agents.first().map(|a| a.agent_name.as_str()), Some(""));
    }

    #[test]
    fn details_is_none_when_empty_and_ordered_otherwise() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        assert!(store.agents().details().expect("details").is_none());

        store.agents().create("zeta", "last alphabetically").expect("create");
        store.agents().create("alpha", "first alphabetically").expect("create");
        let names: Vec<String> = store
            .agents()
            .details()
            .expect("details")
            .expect("rows")
            .into_iter()
            .map(|a| a.agent_name)
            .collect();
        assert_eq!(names, vec!["zeta".to_string(), "alpha".to_string()]);
    }
}
