use std::fmt;
use std::str::FromStr;

/// Closed set of tool identifiers the router accepts.
///
/// Registration is keyed by this enum rather than free-form strings so a
/// misspelled name fails to compile instead of producing an unreachable tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolName {
    StateSave,
    StateGetLatest,
    StatesGetLatest,

    MessageCreate,
    MessageGetById,
    MessageGetLatestUnreaded,
    MessageGetOldestUnreaded,
    MessagesGetUnreaded,
    MessageSetAsReaded,

    AgentCreate,
    AgentGetStatus,
    AgentsGetDetails,
}

impl ToolName {
    pub const ALL: [Self; 12] = [
        Self::StateSave,
        Self::StateGetLatest,
        Self::StatesGetLatest,
        Self::MessageCreate,
        Self::MessageGetById,
        Self::MessageGetLatestUnreaded,
        Self::MessageGetOldestUnreaded,
        Self::MessagesGetUnreaded,
        Self::MessageSetAsReaded,
        Self::AgentCreate,
        Self::AgentGetStatus,
        Self::AgentsGetDetails,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateSave => "state_save",
            Self::StateGetLatest => "state_get_latest",
            Self::StatesGetLatest => "states_get_latest",
            Self::MessageCreate => "message_create",
            Self::MessageGetById => "message_get_by_id",
            Self::MessageGetLatestUnreaded => "message_get_latest_unreaded",
            Self::MessageGetOldestUnreaded => "message_get_oldest_unreaded",
            Self::MessagesGetUnreaded => "messages_get_unreaded",
            Self::MessageSetAsReaded => "message_set_as_readed",
            Self::AgentCreate => "agent_create",
            Self::AgentGetStatus => "agent_get_status",
            Self::AgentsGetDetails => "agents_get_details",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToolName(pub String);

impl fmt::Display for UnknownToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown tool: {}", self.0)
    }
}

impl std::error::Error for UnknownToolName {}

impl FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownToolName(s.to_string()))
    }
}
