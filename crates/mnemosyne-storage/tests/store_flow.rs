use std::time::Duration;

use mnemosyne_storage::MnemosyneStore;

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mnemosyne.db");

    let (message_id, saved) = {
        let store = MnemosyneStore::open(&path).expect("open");
        store.agents().create("b", "receiver").expect("agent");
        let message_id = store.deliver_message("a", "b", "persist me").expect("deliver");
        let saved = store.states().save("a", "checkpoint").expect("save");
        (message_id, saved)
    };

    let store = MnemosyneStore::open_with_busy_timeout(&path, Duration::from_millis(250))
        .expect("reopen");
    let message = store.messages().get(message_id).expect("get").expect("message");
    assert_eq!(message.content, "persist me");
    assert_eq!(store.agents().unread_count("b").expect("count"), 1);

    let state = store.states().latest("a").expect("latest").expect("state");
    assert_eq!(state.content, "checkpoint");
    assert_eq!(state.timestamp_ms, saved.timestamp_ms);
}

#[test]
fn messages_to_unregistered_agents_are_accepted() {
    let store = MnemosyneStore::open_in_memory().expect("store");
    let id = store.deliver_message("x", "nobody", "hello?").expect("deliver");

    let unread = store.messages().unread("nobody").expect("unread").expect("rows");
    assert_eq!(unread.len(), 1);
    assert_eq!(unread.first().map(|m| m.id), Some(id));
    assert_eq!(store.agents().unread_count("nobody").expect("count"), 0);
}
