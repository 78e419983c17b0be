use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{non_empty, now_ms, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub timestamp_ms: i64,
}

const MESSAGE_COLUMNS: &str = "id, sender, receiver, content, timestamp";

pub struct Messages<'a> {
    conn: &'a Mutex<Connection>,
}

impl<'a> Messages<'a> {
    pub(crate) fn new(conn: &'a Mutex<Connection>) -> Self {
        Self { conn }
    }

    /// Inserts an unread message without touching the receiver's counter.
    /// Use [`crate::MnemosyneStore::deliver_message`] to do both.
    pub fn create(&self, sender: &str, receiver: &str, content: &str) -> Result<i64, StorageError> {
        let conn = self.conn.lock();
        insert(&conn, sender, receiver, content, now_ms())
    }

    pub fn get(&self, id: i64) -> Result<Option<MessageRecord>, StorageError> {
        let conn = self.conn.lock();
        get(&conn, id)
    }

    pub fn latest_unread(&self, receiver: &str) -> Result<Option<MessageRecord>, StorageError> {
        self.first_unread(receiver, "DESC")
    }

    pub fn oldest_unread(&self, receiver: &str) -> Result<Option<MessageRecord>, StorageError> {
        self.first_unread(receiver, "ASC")
    }

    /// Every unread message for `receiver`, oldest first.
    pub fn unread(&self, receiver: &str) -> Result<Option<Vec<MessageRecord>>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver = ?1 AND is_readed = 0 \
             ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![receiver], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(non_empty(rows))
    }

    /// Sets the read flag. Returns true only when the stored flag changed.
    pub fn set_read(&self, id: i64, read: bool) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        set_read(&conn, id, read)
    }

    fn first_unread(
        &self,
        receiver: &str,
        direction: &'static str,
    ) -> Result<Option<MessageRecord>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver = ?1 AND is_readed = 0 \
             ORDER BY timestamp {direction}, id {direction} LIMIT 1"
        ))?;
        Ok(stmt
            .query_row(params![receiver], message_from_row)
            .optional()?)
    }
}

pub(crate) fn insert(
    conn: &Connection,
    sender: &str,
    receiver: &str,
    content: &str,
    timestamp_ms: i64,
) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO messages (sender, receiver, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![sender, receiver, content, timestamp_ms],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn get(conn: &Connection, id: i64) -> Result<Option<MessageRecord>, StorageError> {
    let mut stmt =
        conn.prepare_cached(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"))?;
    Ok(stmt.query_row(params![id], message_from_row).optional()?)
}

pub(crate) fn set_read(conn: &Connection, id: i64, read: bool) -> Result<bool, StorageError> {
    let changed = conn.execute(
        "UPDATE messages SET is_readed = ?1 WHERE id = ?2 AND is_readed <> ?1",
        params![read, id],
    )?;
    Ok(changed > 0)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        sender: row.get(1)?,
        receiver: row.get(2)?,
        content: row.get(3)?,
        timestamp_ms: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::MnemosyneStore;

    #[test]
    fn get_returns_created_message() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        let id = store.messages().create("a", "b", "hello").expect("create");
        let message = store.messages().get(id).expect("get").expect("exists");
        assert_eq!(message.sender, "a");
        assert_eq!(message.receiver, "b");
        assert_eq!(message.content, "hello");
        assert!(message.timestamp_ms > 0);
        assert!(store.messages().get(id + 1).expect("get").is_none());
    }

    #[test]
    fn latest_and_oldest_unread_pick_ends() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        assert!(store.messages().latest_unread("b").expect("latest").is_none());

        let first = store.messages().create("a", "b", "one").expect("create");
        let _middle = store.messages().create("a", "b", "two").expect("create");
        let last = store.messages().create("a", "b", "three").expect("create");
        let _other = store.messages().create("a", "c", "elsewhere").expect("create");

        let oldest = store.messages().oldest_unread("b").expect("oldest").expect("row");
        let latest = store.messages().latest_unread("b").expect("latest").expect("row");
        assert_eq!(oldest.id, first);
        assert_eq!(latest.id, last);
    }

    #[test]
    fn unread_excludes_read_messages() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        let first = store.messages().create("a", "b", "one").expect("create");
        let second = store.messages().create("a", "b", "two").expect("create");

        assert!(store.messages().set_read(first, true).expect("set"));
        assert!(!store.messages().set_read(first, true).expect("set again"));

        let ids: Vec<i64> = store
            .messages()
            .unread("b")
            .expect("unread")
            .expect("rows")
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![second]);

        store.messages().set_read(second, true).expect("set");
        assert!(store.messages().unread("b").expect("unread").is_none());
    }
}
