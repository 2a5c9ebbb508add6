//! Types for `tools/list` and `tools/call`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::domain::DomainErrorKind;

/// A tool as advertised by `tools/list`. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool arguments
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    pub fn with_input_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = input_schema;
        self
    }
}

/// Result for tools/list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDefinition>,
}

/// Parameters for tools/call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

impl CallToolParams {
    /// Arguments as handed to the tool; absent or null becomes `{}`.
    pub fn into_arguments(self) -> Value {
        Value::Object(self.arguments.unwrap_or_default())
    }
}

/// Content block returned by a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        ToolContent::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolContent::Text { text } => Some(text),
        }
    }
}

/// Result for tools/call
///
/// `is_error = true` is a tool-reported domain failure; the JSON-RPC call
/// itself still succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "_meta"
    )]
    pub meta: Option<HashMap<String, Value>>,
}

impl CallToolResult {
    pub fn success(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: false,
            meta: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::success(vec![ToolContent::text(text)])
    }

    pub fn error(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: true,
            meta: None,
        }
    }

    /// A failed tool result tagged with a debugger domain error.
    pub fn domain_error(kind: DomainErrorKind, message: impl Into<String>) -> Self {
        let mut meta = HashMap::new();
        meta.insert("errorCode".to_string(), json!(kind.code()));
        meta.insert("errorKind".to_string(), json!(kind.as_str()));
        Self::error(vec![ToolContent::text(message)]).with_meta(meta)
    }

    pub fn with_meta(mut self, meta: HashMap<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// The domain error attached by [`CallToolResult::domain_error`], if any.
    pub fn domain_error_code(&self) -> Option<i64> {
        self.meta.as_ref()?.get("errorCode")?.as_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definition_serializes_input_schema_camel_case() {
        let def = ToolDefinition::new("echo", "Echo text back").with_input_schema(json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        }));
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["name"], "echo");
        assert_eq!(value["inputSchema"]["required"][0], "text");
        assert!(value.get("input_schema").is_none());
    }

    #[test]
    fn test_call_tool_result_text() {
        let value = serde_json::to_value(CallToolResult::text("hi")).unwrap();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "hi"}], "isError": false})
        );
    }

    #[test]
    fn test_domain_error_carries_code_and_kind() {
        let result =
            CallToolResult::domain_error(DomainErrorKind::NoActiveSession, "No debug session");
        assert!(result.is_error);
        assert_eq!(result.domain_error_code(), Some(-32001));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["_meta"]["errorKind"], "no_active_session");
        assert_eq!(value["content"][0]["text"], "No debug session");
    }

    #[test]
    fn test_call_params_arguments_optional() {
        let params: CallToolParams = serde_json::from_value(json!({"name": "echo"})).unwrap();
        assert_eq!(params.name, "echo");
        assert!(params.arguments.is_none());
        assert_eq!(params.into_arguments(), json!({}));

        let params: CallToolParams =
            serde_json::from_value(json!({"name": "echo", "arguments": null})).unwrap();
        assert_eq!(params.into_arguments(), json!({}));
    }

    #[test]
    fn test_call_params_rejects_bad_shapes() {
        for bad in [
            json!({"arguments": {}}),
            json!({"name": 12}),
            json!({"name": "echo", "arguments": [1, 2]}),
            json!({"name": "echo", "arguments": "text"}),
        ] {
            assert!(serde_json::from_value::<CallToolParams>(bad).is_err());
        }
    }

    #[test]
    fn test_call_tool_result_meta_round_trips() {
        let result = CallToolResult::domain_error(DomainErrorKind::NoActiveSession, "idle");
        let parsed: CallToolResult =
            serde_json::from_value(serde_json::to_value(&result).unwrap()).unwrap();
        assert_eq!(parsed.domain_error_code(), Some(-32001));
    }
}
