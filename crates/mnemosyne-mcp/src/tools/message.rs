use chrono::{DateTime, Utc};
use mnemosyne_storage::{MessageRecord, MnemosyneStore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::date_from_ms;
use crate::error::ToolError;
use crate::router::{Tool, ToolRouterBuilder};
use crate::tool_name::ToolName;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MessageCreateInput {
    /// Agent name of the sender of the message
    pub sender: String,
    /// Agent name of the receiver of the message
    pub receiver: String,
    /// Content of the message
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MessageIdInput {
    /// ID of the message
    pub id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReceiverInput {
    /// Agent name of the receiver of the message
    pub receiver: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MessageIdOutput {
    /// ID of the message
    pub id: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Message {
    /// ID of the message
    pub id: i64,
    /// Agent name of the sender of the message
    pub sender: String,
    /// Agent name of the receiver of the message
    pub receiver: String,
    /// Content of the message
    pub content: String,
    /// Date of the message
    pub date: DateTime<Utc>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MessageList {
    pub items: Vec<Message>,
}

pub(crate) fn register(
    builder: ToolRouterBuilder<MnemosyneStore>,
) -> ToolRouterBuilder<MnemosyneStore> {
    builder
        .register(Tool::new(
            ToolName::MessageCreate,
            "Create a message",
            message_create,
        ))
        .register(Tool::new(
            ToolName::MessageGetById,
            "Get a message by ID",
            message_get_by_id,
        ))
        .register(Tool::new(
            ToolName::MessageGetLatestUnreaded,
            "Get the latest unreaded message",
            message_get_latest_unreaded,
        ))
        .register(Tool::new(
            ToolName::MessageGetOldestUnreaded,
            "Get the oldest unreaded message",
            message_get_oldest_unreaded,
        ))
        .register(Tool::new(
            ToolName::MessagesGetUnreaded,
            "Get unreaded messages",
            messages_get_unreaded,
        ))
        .register(Tool::new(
            ToolName::MessageSetAsReaded,
            "Set a message as readed",
            message_set_as_readed,
        ))
}

fn message_create(
    store: &MnemosyneStore,
    input: MessageCreateInput,
) -> Result<MessageIdOutput, ToolError> {
    let id = store.deliver_message(&input.sender, &input.receiver, &input.content)?;
    Ok(MessageIdOutput { id })
}

fn message_get_by_id(
    store: &MnemosyneStore,
    input: MessageIdInput,
) -> Result<Option<Message>, ToolError> {
    store.messages().get(input.id)?.map(message).transpose()
}

fn message_get_latest_unreaded(
    store: &MnemosyneStore,
    input: ReceiverInput,
) -> Result<Option<Message>, ToolError> {
    store
        .messages()
        .latest_unread(&input.receiver)?
        .map(message)
        .transpose()
}

fn message_get_oldest_unreaded(
    store: &MnemosyneStore,
    input: ReceiverInput,
) -> Result<Option<Message>, ToolError> {
    store
        .messages()
        .oldest_unread(&input.receiver)?
        .map(message)
        .transpose()
}

fn messages_get_unreaded(
    store: &MnemosyneStore,
    input: ReceiverInput,
) -> Result<Option<MessageList>, ToolError> {
    let Some(records) = store.messages().unread(&input.receiver)? else {
        return Ok(None);
    };
    let items = records
        .into_iter()
        .map(message)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(MessageList { items }))
}

fn message_set_as_readed(
    store: &MnemosyneStore,
    input: MessageIdInput,
) -> Result<Option<MessageIdOutput>, ToolError> {
    Ok(store
        .mark_message_read(input.id)?
        .map(|record| MessageIdOutput { id: record.id }))
}

fn message(record: MessageRecord) -> Result<Message, ToolError> {
    Ok(Message {
        date: date_from_ms(record.timestamp_ms)?,
        id: record.id,
        sender: record.sender,
        receiver: record.receiver,
        content: record.content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(store: &MnemosyneStore, receiver: &str, content: &str) -> i64 {
        message_create(
            store,
            MessageCreateInput {
                sender: "a".to_string(),
                receiver: receiver.to_string(),
                content: content.to_string(),
            },
        )
        .expect("create")
        .id
    }

    fn receiver(name: &str) -> ReceiverInput {
        ReceiverInput {
            receiver: name.to_string(),
        }
    }

    #[test]
    fn latest_and_oldest_unread_pick_opposite_ends() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        let first = send(&store, "b", "first");
        let second = send(&store, "b", "second");

        let latest = message_get_latest_unreaded(&store, receiver("b"))
            .expect("latest")
            .expect("message");
        let oldest = message_get_oldest_unreaded(&store, receiver("b"))
            .expect("oldest")
            .expect("message");
        assert_eq!(latest.id, second);
        assert_eq!(oldest.id, first);
    }

    #[test]
    fn read_messages_leave_the_unread_list() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        let id = send(&store, "b", "hello");

        let marked = message_set_as_readed(&store, MessageIdInput { id })
            .expect("mark")
            .expect("existing message");
        assert_eq!(marked.id, id);
        assert!(messages_get_unreaded(&store, receiver("b"))
            .expect("unread")
            .is_none());

        let fetched = message_get_by_id(&store, MessageIdInput { id })
            .expect("get")
            .expect("message");
        assert_eq!(fetched.content, "hello");
    }

    #[test]
    fn marking_a_missing_message_is_null() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        let output = message_set_as_readed(&store, MessageIdInput { id: 404 }).expect("mark");
        assert!(output.is_none());
    }
}
