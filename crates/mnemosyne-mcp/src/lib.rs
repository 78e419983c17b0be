//! MCP server exposing agent state, messaging and registry tools over a
//! SQLite store.

pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod router;
pub mod server;
pub mod tool_name;
pub mod tools;

pub use config::ServerConfig;
pub use envelope::{describe_envelope, to_error_result, to_result, ErrorPayload, ToolEnvelope};
pub use error::{RouterError, StartupError, ToolError};
pub use router::{Tool, ToolDescriptor, ToolRouter, ToolRouterBuilder};
pub use server::McpServer;
pub use tool_name::ToolName;
