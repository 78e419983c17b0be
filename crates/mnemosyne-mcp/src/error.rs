use std::path::PathBuf;

use mnemosyne_storage::StorageError;
use thiserror::Error;

use crate::tool_name::ToolName;

/// Failures raised while serving a single tool call.
///
/// None of these escape [`crate::router::ToolRouter::dispatch`]; each one is
/// folded into an error envelope named after [`ToolError::kind`].
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments for {tool}: {message}")]
    Validation { tool: ToolName, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    Handler(String),

    #[error("{0}")]
    Store(#[from] StorageError),

    #[error("{tool} panicked: {message}")]
    Panic { tool: ToolName, message: String },
}

impl ToolError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Name reported in the error envelope.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::UnknownTool(_) => "Error",
            Self::Handler(_) => "HandlerError",
            Self::Store(_) => "StoreError",
            Self::Panic { .. } => "Panic",
        }
    }
}

/// Problems detected while freezing a router builder.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("tool registered twice: {0}")]
    DuplicateTool(ToolName),

    #[error("invalid {direction} schema for {tool}: {message}")]
    Schema {
        tool: ToolName,
        direction: &'static str,
        message: String,
    },
}

/// Fatal errors while bringing the server up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open store at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Router(#[from] RouterError),
}
