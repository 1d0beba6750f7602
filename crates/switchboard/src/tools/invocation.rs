//! Per-call request and result types.
//!
//! A [`ToolInvocationRequest`] is created for every tool call the model
//! asks for and consumed once by the router. Whatever happens downstream,
//! the router hands back a [`ToolInvocationResult`], which becomes one
//! tool-role message and, when its payload is a JSON object, an entry in the
//! tool data cache.

use crate::tools::core::truncate_result;
use crate::{Message, ToolCall};
use serde_json::{Map, Value};

/// One requested tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationRequest {
    /// Backend-assigned call id, echoed on the tool-result message.
    pub call_id: String,
    pub tool_name: String,
    /// Arguments as sent by the model. Usually an object, but not guaranteed
    /// to be one or to satisfy the tool's schema. Unparseable argument text
    /// is kept as a JSON string.
    pub arguments: Value,
}

impl ToolInvocationRequest {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    pub fn from_tool_call(call: &ToolCall) -> Self {
        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        Self::new(&call.id, &call.function.name, arguments)
    }

    /// Arguments as a JSON object, if they are one.
    pub fn argument_object(&self) -> Option<&Map<String, Value>> {
        self.arguments.as_object()
    }

    /// Arguments re-serialized for a raw-string consumer. A string value is
    /// passed through as-is so malformed model output reaches the tool
    /// unchanged.
    pub fn raw_arguments(&self) -> String {
        match &self.arguments {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Outcome of one tool call: an opaque payload or an error message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: Result<Value, String>,
}

impl ToolInvocationResult {
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            outcome: Ok(payload),
        }
    }

    pub fn failure(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            outcome: Err(message.into()),
        }
    }

    /// Build a result for `request` from a source's outcome.
    pub fn for_request<E: std::fmt::Display>(
        request: &ToolInvocationRequest,
        outcome: Result<Value, E>,
    ) -> Self {
        Self {
            call_id: request.call_id.clone(),
            tool_name: request.tool_name.clone(),
            outcome: outcome.map_err(|e| e.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn payload(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    /// The payload when it is structured data worth remembering across
    /// turns: a successful JSON object.
    pub fn structured_data(&self) -> Option<&Map<String, Value>> {
        self.payload().and_then(Value::as_object)
    }

    /// Text placed in the tool-role message, truncated to `max_bytes`.
    pub fn message_content(&self, max_bytes: usize) -> String {
        let text = match &self.outcome {
            Ok(Value::String(s)) => s.clone(),
            Ok(payload) => payload.to_string(),
            Err(message) => format!("Error: {message}"),
        };
        truncate_result(text, max_bytes)
    }

    pub fn to_message(&self, max_bytes: usize) -> Message {
        Message::tool_result(&self.call_id, self.message_content(max_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_arguments() {
        let call = ToolCall::new("c1", "lights_on", r#"{"room":"kitchen"}"#);
        let req = ToolInvocationRequest::from_tool_call(&call);
        assert_eq!(req.call_id, "c1");
        assert_eq!(req.arguments, json!({"room": "kitchen"}));
        assert_eq!(req.argument_object().map(|m| m.len()), Some(1));
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let req = ToolInvocationRequest::from_tool_call(&ToolCall::new("c1", "ping", "  "));
        assert_eq!(req.arguments, json!({}));
    }

    #[test]
    fn malformed_arguments_are_kept_verbatim() {
        let req = ToolInvocationRequest::from_tool_call(&ToolCall::new("c1", "x", "{room:"));
        assert_eq!(req.arguments, Value::String("{room:".into()));
        assert_eq!(req.raw_arguments(), "{room:");
        assert!(req.argument_object().is_none());
    }

    #[test]
    fn only_object_payloads_are_structured() {
        let obj = ToolInvocationResult::success("c", "t", json!({"temp": 21}));
        assert!(obj.structured_data().is_some());
        let text = ToolInvocationResult::success("c", "t", json!("done"));
        assert!(text.structured_data().is_none());
        let err = ToolInvocationResult::failure("c", "t", "boom");
        assert!(err.structured_data().is_none());
        assert_eq!(err.error_message(), Some("boom"));
    }

    #[test]
    fn message_content_formats_outcomes() {
        let text = ToolInvocationResult::success("c", "t", json!("plain"));
        assert_eq!(text.message_content(100), "plain");
        let obj = ToolInvocationResult::success("c", "t", json!({"a": 1}));
        assert_eq!(obj.message_content(100), r#"{"a":1}"#);
        let err = ToolInvocationResult::failure("c", "t", "tool not found");
        let msg = err.to_message(100);
        assert_eq!(msg.content.as_deref(), Some("Error: tool not found"));
        assert_eq!(msg.tool_call_id.as_deref(), Some("c"));
    }

    #[test]
    fn message_content_is_truncated() {
        let big = ToolInvocationResult::success("c", "t", json!("x".repeat(500)));
        let content = big.message_content(100);
        assert!(content.starts_with(&"x".repeat(100)));
        assert!(content.contains("[truncated: 500 bytes total]"));
    }
}
