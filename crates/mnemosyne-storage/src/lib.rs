//! SQLite persistence for the mnemosyne server.
//!
//! One database holds three flat tables (`agents`, `messages`, `states`).
//! Each table is reached through a narrow repository view borrowed from
//! [`MnemosyneStore`]; the store itself only adds the two operations that
//! touch more than one table.

mod agents;
mod messages;
mod states;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::Connection;
use thiserror::Error;

pub use agents::{AgentRecord, Agents};
pub use messages::{MessageRecord, Messages};
pub use states::{SavedState, StateRecord, States};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    agent_name TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    unreaded_messages INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender TEXT NOT NULL REFERENCES agents(agent_name),
    receiver TEXT NOT NULL REFERENCES agents(agent_name),
    content TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    is_readed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_receiver_unread ON messages(receiver, is_readed);

CREATE TABLE IF NOT EXISTS states (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_name TEXT NOT NULL REFERENCES agents(agent_name),
    timestamp INTEGER NOT NULL,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_instance ON states(agent_name);
CREATE INDEX IF NOT EXISTS idx_timestamp ON states(timestamp);
CREATE INDEX IF NOT EXISTS idx_instance_time ON states(agent_name, timestamp DESC);
";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct MnemosyneStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl MnemosyneStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_busy_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::init(conn, Some(path))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        // REFERENCES clauses are documentation only; messages and states may
        // name agents that were never registered.
        conn.pragma_update(None, "foreign_keys", false)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Database file backing this store, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn agents(&self) -> Agents<'_> {
        Agents::new(&self.conn)
    }

    pub fn messages(&self) -> Messages<'_> {
        Messages::new(&self.conn)
    }

    pub fn states(&self) -> States<'_> {
        States::new(&self.conn)
    }

    /// Inserts an unread message and bumps the receiver's unread counter.
    ///
    /// Both statements run in one transaction.
    pub fn deliver_message(
        &self,
        sender: &str,
        receiver: &str,
        content: &str,
    ) -> Result<i64, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = messages::insert(&tx, sender, receiver, content, now_ms())?;
        agents::adjust_unread(&tx, receiver, 1)?;
        tx.commit()?;
        Ok(id)
    }

    /// Marks a message as read and releases one unit of the receiver's
    /// unread counter.
    ///
    /// Returns `None` when the message does not exist. The counter is only
    /// decremented when the message actually transitions from unread to
    /// read, and never drops below zero.
    pub fn mark_message_read(&self, id: i64) -> Result<Option<MessageRecord>, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let Some(message) = messages::get(&tx, id)? else {
            return Ok(None);
        };
        if messages::set_read(&tx, id, true)? {
            agents::adjust_unread(&tx, &message.receiver, -1)?;
        }
        tx.commit()?;
        Ok(Some(message))
    }
}

impl std::fmt::Debug for MnemosyneStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MnemosyneStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Collapses an empty result set into the explicit "no results" marker.
pub(crate) fn non_empty<T>(rows: Vec<T>) -> Option<Vec<T>> {
    if rows.is_empty() { None } else { Some(rows) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_tables_idempotently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("mnemosyne.db");

        let store = MnemosyneStore::open(&path).expect("first open");
        store.agents().create("a1", "first agent").expect("create agent");
        drop(store);

        let reopened = MnemosyneStore::open(&path).expect("second open");
        let agents = reopened.agents().details().expect("details").expect("rows");
        assert_eq!(agents.len(), 1);
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[test]
    fn deliver_and_read_keep_counter_consistent() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        store.agents().create("b", "receiver").expect("agent");

        let first = store.deliver_message("a", "b", "hi").expect("deliver");
        let _second = store.deliver_message("a", "b", "again").expect("deliver");
        assert_eq!(store.agents().unread_count("b").expect("count"), 2);

        let read = store.mark_message_read(first).expect("mark").expect("exists");
        assert_eq!(read.id, first);
        assert_eq!(store.agents().unread_count("b").expect("count"), 1);

        // re-reading the same message must not decrement twice
        store.mark_message_read(first).expect("mark again");
        assert_eq!(store.agents().unread_count("b").expect("count"), 1);
    }

    #[test]
    fn mark_missing_message_returns_none() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        assert!(store.mark_message_read(42).expect("mark").is_none());
    }

    #[test]
    fn counter_never_goes_negative() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        store.agents().create("b", "receiver").expect("agent");
        let id = store.messages().create("a", "b", "raw insert").expect("insert");
        assert_eq!(store.agents().unread_count("b").expect("count"), 0);

        store.mark_message_read(id).expect("mark");
        assert_eq!(store.agents().unread_count("b").expect("count"), 0);
    }
}
