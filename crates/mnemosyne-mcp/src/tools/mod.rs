//! The tool catalogue served over MCP.
//!
//! Handlers are plain functions over [`MnemosyneStore`]; registration order
//! here is the order `tools/list` reports.

pub mod agent;
pub mod message;
pub mod state;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemosyne_storage::MnemosyneStore;

use crate::error::{RouterError, ToolError};
use crate::router::{ToolRouter, ToolRouterBuilder};

pub fn register_all(builder: ToolRouterBuilder<MnemosyneStore>) -> ToolRouterBuilder<MnemosyneStore> {
    let builder = state::register(builder);
    let builder = message::register(builder);
    agent::register(builder)
}

pub fn build_router(store: Arc<MnemosyneStore>) -> Result<ToolRouter<MnemosyneStore>, RouterError> {
    register_all(ToolRouter::builder()).build(store)
}

pub(crate) fn date_from_ms(timestamp_ms: i64) -> Result<DateTime<Utc>, ToolError> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .ok_or_else(|| ToolError::handler(format!("stored timestamp out of range: {timestamp_ms}")))
}
