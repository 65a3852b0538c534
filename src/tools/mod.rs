//! Tool handlers, grouped by the resource they act on.
//!
//! Handlers are plain async functions over a [`Context`] and a typed params
//! struct. They resolve the active project through the state manager, make
//! one or a few API calls and hand back JSON for the MCP layer to render.

pub mod dashboards;
pub mod definitions;
pub mod docs;
pub mod experiments;
pub mod flags;
pub mod insights;
pub mod llm;
pub mod session_replays;
pub mod workspace;

use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;

pub type ToolResult = Result<Value, ToolError>;

/// Text handed back to the model: strings as-is, everything else as JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> ToolResult {
    Ok(serde_json::to_value(value)?)
}

/// Add a UI link to an object payload. Non-objects are returned unchanged.
pub(crate) fn with_url(mut value: Value, key: &str, url: String) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.insert(key.to_string(), Value::String(url));
    }
    value
}
