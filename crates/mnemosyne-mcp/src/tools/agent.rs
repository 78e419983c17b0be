use chrono::Local;
use mnemosyne_storage::MnemosyneStore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::router::{Tool, ToolRouterBuilder};
use crate::tool_name::ToolName;

const STATUS_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S | %A";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AgentCreateInput {
    /// Agent name of the AI instance
    pub agent_name: String,
    /// Description of the AI instance
    pub description: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AgentNameInput {
    /// Agent name of the AI instance
    pub agent_name: String,
}

/// No input required
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoInput {}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AgentCreateOutput {
    /// Agent name of the AI instance
    pub agent_name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AgentStatus {
    /// Agent name of the AI instance
    pub agent_name: String,
    /// Current date on readable format
    pub current_date: String,
    /// Number of unreaded messages
    pub unreaded_messages: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AgentDetails {
    /// Agent name of the AI instance
    pub agent_name: String,
    /// Description of the AI instance
    pub description: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AgentList {
    pub items: Vec<AgentDetails>,
}

pub(crate) fn register(
    builder: ToolRouterBuilder<MnemosyneStore>,
) -> ToolRouterBuilder<MnemosyneStore> {
    builder
        .register(Tool::new(
            ToolName::AgentCreate,
            "Create an agent",
            agent_create,
        ))
        .register(Tool::new(
            ToolName::AgentGetStatus,
            "Get the status of an agent",
            agent_get_status,
        ))
        .register(Tool::new(
            ToolName::AgentsGetDetails,
            "Get the details of all agents",
            agents_get_details,
        ))
}

fn agent_create(
    store: &MnemosyneStore,
    input: AgentCreateInput,
) -> Result<AgentCreateOutput, ToolError> {
    store.agents().create(&input.agent_name, &input.description)?;
    Ok(AgentCreateOutput {
        agent_name: input.agent_name,
    })
}

// Unknown agents report zero unread messages rather than an error.
fn agent_get_status(
    store: &MnemosyneStore,
    input: AgentNameInput,
) -> Result<AgentStatus, ToolError> {
    let unreaded_messages = store.agents().unread_count(&input.agent_name)?;
    Ok(AgentStatus {
        current_date: Local::now().format(STATUS_DATE_FORMAT).to_string(),
        agent_name: input.agent_name,
        unreaded_messages,
    })
}

fn agents_get_details(
    store: &MnemosyneStore,
    _input: NoInput,
) -> Result<Option<AgentList>, ToolError> {
    Ok(store.agents().details()?.map(|records| AgentList {
        items: records
            .into_iter()
            .map(|record| AgentDetails {
                agent_name: record.agent_name,
                description: record.description,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_counts_unread_messages() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        agent_create(
            &store,
            AgentCreateInput {
                agent_name: "b".to_string(),
                description: "reader".to_string(),
            },
        )
        .expect("create");
        store.deliver_message("a", "b", "one").expect("deliver");
        store.deliver_message("a", "b", "two").expect("deliver");

        let status = agent_get_status(
            &store,
            AgentNameInput {
                agent_name: "b".to_string(),
            },
        )
        .expect("status");
        assert_eq!(status.unreaded_messages, 2);
        assert!(status.current_date.contains(" | "), "{}", status.current_date);
    }

    #[test]
    fn duplicate_agent_is_a_store_error() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        let input = || AgentCreateInput {
            agent_name: "a".to_string(),
            description: "first".to_string(),
        };
        agent_create(&store, input()).expect("first create");
        let err = agent_create(&store, input()).expect_err("duplicate");
        assert_eq!(err.kind(), "StoreError");
    }

    #[test]
    fn details_list_agents_or_nothing() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        assert!(agents_get_details(&store, NoInput {})
            .expect("details")
            .is_none());

        store.agents().create("a", "alpha").expect("create");
        let list = agents_get_details(&store, NoInput {})
            .expect("details")
            .expect("agents");
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items.first().map(|a| a.description.as_str()), Some("alpha"));
    }
}
