use chrono::{DateTime, Utc};
use mnemosyne_storage::{MnemosyneStore, StateRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::date_from_ms;
use crate::error::ToolError;
use crate::router::{Tool, ToolRouterBuilder};
use crate::tool_name::ToolName;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StateSaveInput {
    /// Agent name of the AI instance
    pub agent_name: String,
    /// Content to save
    pub content: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StateSaveOutput {
    /// Date of the state save
    pub date: DateTime<Utc>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StateGetLatestInput {
    /// Agent name of the AI instance
    pub agent_name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StateEntry {
    /// Date of the state
    pub date: DateTime<Utc>,
    /// Content of the state
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StatesGetLatestInput {
    /// Agent name of the AI instance
    pub agent_name: String,
    /// Number of states to search back
    pub states_back: u32,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StatesGetLatestOutput {
    pub items: Vec<StateEntry>,
}

pub(crate) fn register(
    builder: ToolRouterBuilder<MnemosyneStore>,
) -> ToolRouterBuilder<MnemosyneStore> {
    builder
        .register(Tool::new(ToolName::StateSave, "Save a state", state_save))
        .register(Tool::new(
            ToolName::StateGetLatest,
            "Get the latest state",
            state_get_latest,
        ))
        .register(Tool::new(
            ToolName::StatesGetLatest,
            "Get the latest states",
            states_get_latest,
        ))
}

fn state_save(store: &MnemosyneStore, input: StateSaveInput) -> Result<StateSaveOutput, ToolError> {
    let saved = store.states().save(&input.agent_name, &input.content)?;
    Ok(StateSaveOutput {
        date: date_from_ms(saved.timestamp_ms)?,
    })
}

fn state_get_latest(
    store: &MnemosyneStore,
    input: StateGetLatestInput,
) -> Result<Option<StateEntry>, ToolError> {
    store
        .states()
        .latest(&input.agent_name)?
        .map(state_entry)
        .transpose()
}

fn states_get_latest(
    store: &MnemosyneStore,
    input: StatesGetLatestInput,
) -> Result<Option<StatesGetLatestOutput>, ToolError> {
    let Some(records) = store
        .states()
        .latest_n(&input.agent_name, input.states_back)?
    else {
        return Ok(None);
    };
    let items = records
        .into_iter()
        .map(state_entry)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(StatesGetLatestOutput { items }))
}

fn state_entry(record: StateRecord) -> Result<StateEntry, ToolError> {
    Ok(StateEntry {
        date: date_from_ms(record.timestamp_ms)?,
        content: record.content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_states_come_back_newest_first() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        for content in ["one", "two", "three"] {
            state_save(
                &store,
                StateSaveInput {
                    agent_name: "a".to_string(),
                    content: content.to_string(),
                },
            )
            .expect("save");
        }

        let output = states_get_latest(
            &store,
            StatesGetLatestInput {
                agent_name: "a".to_string(),
                states_back: 2,
            },
        )
        .expect("query")
        .expect("states");
        let contents: Vec<&str> = output.items.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "two"]);
    }

    #[test]
    fn zero_states_back_is_no_results() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        store.states().save("a", "x").expect("save");
        let output = states_get_latest(
            &store,
            StatesGetLatestInput {
                agent_name: "a".to_string(),
                states_back: 0,
            },
        )
        .expect("query");
        assert!(output.is_none());
    }

    #[test]
    fn unknown_agent_has_no_latest_state() {
        let store = MnemosyneStore::open_in_memory().expect("store");
        let output = state_get_latest(
            &store,
            StateGetLatestInput {
                agent_name: "ghost".to_string(),
            },
        )
        .expect("query");
        assert!(output.is_none());
    }
}
