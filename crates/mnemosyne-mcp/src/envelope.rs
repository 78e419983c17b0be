//! Uniform result container returned by every tool call.
//!
//! A successful call carries the tool's output both as structured JSON and
//! as a single text block holding the same JSON; a failed call carries
//! `{name, message}` the same way with `isError` set.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ToolError;

pub const JSON_SCHEMA_DRAFT7: &str = "http://json-schema.org/draft-07/schema#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: String,
}

impl TextContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEnvelope {
    pub content: Vec<TextContent>,
    pub structured_content: Value,
    pub is_error: bool,
}

impl ToolEnvelope {
    pub fn success(value: Value) -> Self {
        Self {
            content: vec![TextContent::text(value.to_string())],
            structured_content: value,
            is_error: false,
        }
    }

    pub fn failure(payload: ErrorPayload) -> Self {
        let structured_content = json!({
            "name": payload.name,
            "message": payload.message,
        });
        Self {
            content: vec![TextContent::text(structured_content.to_string())],
            structured_content,
            is_error: true,
        }
    }

    /// Decodes the error payload of a failed call.
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if !self.is_error {
            return None;
        }
        serde_json::from_value(self.structured_content.clone()).ok()
    }
}

pub fn to_result<T: Serialize>(value: &T) -> Result<ToolEnvelope, serde_json::Error> {
    Ok(ToolEnvelope::success(serde_json::to_value(value)?))
}

pub fn to_error_result(error: &ToolError) -> ToolEnvelope {
    ToolEnvelope::failure(ErrorPayload {
        name: error.kind().to_string(),
        message: error.to_string(),
    })
}

/// Wraps a tool's output schema in the envelope shape that `tools/call`
/// actually returns.
///
/// Shared `definitions` of the output schema are lifted to the wrapper root
/// so `#/definitions/...` references keep resolving once the schema is
/// nested under `structuredContent`.
pub fn describe_envelope(output_schema: Value) -> Value {
    let mut structured = output_schema;
    let mut definitions = Map::new();
    if let Value::Object(map) = &mut structured {
        map.remove("$schema");
        if let Some(Value::Object(defs)) = map.remove("definitions") {
            definitions = defs;
        }
    }

    let mut envelope = json!({
        "$schema": JSON_SCHEMA_DRAFT7,
        "type": "object",
        "required": ["content", "structuredContent", "isError"],
        "properties": {
            "content": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type", "text"],
                    "properties": {
                        "type": {"type": "string", "const": "text"},
                        "text": {"type": "string"}
                    }
                }
            },
            "structuredContent": structured,
            "isError": {"type": "boolean"}
        }
    });
    if !definitions.is_empty() {
        if let Some(root) = envelope.as_object_mut() {
            root.insert("definitions".to_string(), Value::Object(definitions));
        }
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_renders_single_text_block() {
        let envelope = to_result(&json!({"date": "2026-01-01T00:00:00Z"})).expect("serialize");
        assert!(!envelope.is_error);
        assert_eq!(envelope.content.len(), 1);
        assert_eq!(
            envelope.content.first().map(|c| c.text.as_str()),
            Some(r#"{"date":"2026-01-01T00:00:00Z"}"#)
        );
        assert_eq!(envelope.structured_content["date"], "2026-01-01T00:00:00Z");
    }

    #[test]
    fn null_output_is_still_a_success() {
        let envelope = to_result(&Option::<u8>::None).expect("serialize");
        assert!(!envelope.is_error);
        assert!(envelope.structured_content.is_null());
        assert_eq!(envelope.content.first().map(|c| c.text.as_str()), Some("null"));
    }

    #[test]
    fn error_envelope_carries_name_and_message() {
        let envelope = to_error_result(&ToolError::UnknownTool("nope".to_string()));
        assert!(envelope.is_error);
        let payload = envelope.error_payload().expect("payload");
        assert_eq!(payload.name, "Error");
        assert_eq!(payload.message, "Unknown tool: nope");

        let text: Value = serde_json::from_str(
            &envelope.content.first().map(|c| c.text.clone()).unwrap_or_default(),
        )
        .expect("text is json");
        assert_eq!(text, envelope.structured_content);
    }

    #[test]
    fn envelope_serializes_with_mcp_field_names() {
        let value = serde_json::to_value(ToolEnvelope::success(json!({"id": 1}))).expect("json");
        assert_eq!(value["isError"], false);
        assert_eq!(value["structuredContent"]["id"], 1);
        assert_eq!(value["content"][0]["type"], "text");
    }

    #[test]
    fn describe_envelope_lifts_definitions() {
        let output = json!({
            "$schema": JSON_SCHEMA_DRAFT7,
            "title": "Nullable_Item",
            "anyOf": [{"$ref": "#/definitions/Item"}, {"type": "null"}],
            "definitions": {"Item": {"type": "object"}}
        });
        let wrapped = describe_envelope(output);

        assert_eq!(wrapped["$schema"], JSON_SCHEMA_DRAFT7);
        assert_eq!(wrapped["definitions"]["Item"]["type"], "object");
        let structured = &wrapped["properties"]["structuredContent"];
        assert!(structured.get("definitions").is_none());
        assert!(structured.get("$schema").is_none());
        assert_eq!(structured["title"], "Nullable_Item");
        assert_eq!(wrapped["properties"]["isError"]["type"], "boolean");
    }
}
