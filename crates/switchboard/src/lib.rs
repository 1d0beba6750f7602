//! Tool-invocation orchestrator for conversational agents.
//!
//! `switchboard` lets a language model act on the world through tools that
//! live in three very different places:
//!
//! - **Local callables**: in-process async functions registered on a
//!   [`LocalSource`](tools::core::LocalSource).
//! - **Protocol tools**: tools exposed by one or more remote tool-protocol
//!   servers (JSON-RPC `tools/list` / `tools/call`), see
//!   [`ProtocolSource`](sources::protocol::ProtocolSource).
//! - **Workflow automations**: externally authored automations triggered by
//!   an HTTP webhook, see [`WorkflowSource`](sources::workflow::WorkflowSource).
//!
//! All three are discovered once per session by the
//! [`DiscoveryAggregator`](agent::catalog::DiscoveryAggregator), normalized into
//! [`ToolDescriptor`](tools::descriptor::ToolDescriptor)s and merged into a
//! [`Catalog`](agent::catalog::Catalog). Each conversational turn is driven by
//! the [`Orchestrator`](agent::orchestrator::Orchestrator) in two phases:
//!
//! 1. **Detect**: a non-streaming inference call with the catalog attached.
//!    The model either answers directly or asks for tool calls.
//! 2. **Respond**: requested tools run through the
//!    [`Router`](agent::router::Router) in the order the model asked for them,
//!    their results are folded into context, and a streaming inference call
//!    produces the user-facing answer.
//!
//! # Getting started
//!
//! ```ignore
//! use switchboard::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let config = SwitchboardConfig::default();
//!     let key = std::env::var("OPENROUTER_KEY").map_err(|e| e.to_string())?;
//!     let client = InferenceClient::new(key)?;
//!
//!     let local = LocalSource::new().with(FnTool::new(
//!         ToolDef::new("lights_on", "Turn the lights on", json_schema_for::<RoomArgs>()),
//!         |args: RoomArgs| async move { Ok(serde_json::json!({"room": args.room, "on": true})) },
//!     ));
//!     let sources = Arc::new(config.build_sources(local)?);
//!
//!     let orchestrator = Orchestrator::new(Arc::new(client), sources, config.orchestrator);
//!     let mut session = Session::new("kitchen-speaker");
//!
//!     let outcome = orchestrator.run_turn(&mut session, "Turn on the kitchen lights").await;
//!     println!("{}", outcome.text);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Orchestrator`](agent::orchestrator::Orchestrator), sessions, catalog discovery, routing, events |
//! | [`tools`] | Descriptors, invocation request/result types, local tools, the tool data cache |
//! | [`sources`] | The closed set of tool sources and their adapters |
//! | [`context`] | Context builder and the sliding history window |
//! | [`api`] | Inference backend contract and SSE streaming |
//! | [`config`] | File + environment configuration |

pub mod agent;
pub mod api;
pub mod config;
pub mod context;
pub mod prelude;
pub mod sources;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_INFERENCE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for all inference calls.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Bridges typed local tool arguments and the
/// `serde_json::Value` the function-calling API expects.
///
/// # Example
///
/// ```
/// use switchboard::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct LightArgs {
///     room: String,
///     #[serde(default)]
///     brightness: Option<u8>,
/// }
///
/// let schema = json_schema_for::<LightArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"room".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation. Also the unit of durable session history
/// (a conversation turn).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    /// Build a function tool call. Mostly useful for scripted backends.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`InferenceClient::chat`].
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions API.
///
/// Implements [`InferenceBackend`](api::backend::InferenceBackend): `chat()`
/// backs the Detect phase and
/// [`chat_stream()`](InferenceClient::chat_stream) backs the Respond phase.
pub struct InferenceClient {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f32,
    pub(crate) title: String,
}

impl InferenceClient {
    /// Create a client for the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_endpoint(
            api_key,
            DEFAULT_INFERENCE_URL,
            DEFAULT_MODEL,
            Duration::from_secs(120),
        )
    }

    /// Create a client for a specific endpoint, model, and request timeout.
    pub fn with_endpoint(
        api_key: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("switchboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 1024,
            temperature: 0.3,
            title: "switchboard".into(),
        })
    }

    /// Set the per-response token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The model this client sends requests for.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build a request body for this client's model and sampling settings.
    pub fn request(&self, messages: Vec<Message>, tools: Option<Vec<ToolDef>>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools,
            stream: false,
        }
    }

    pub(crate) fn post(&self, body: &impl Serialize) -> reqwest::RequestBuilder {
        self.client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", &self.title)
            .json(body)
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "Inference request: model={}, messages={}, tools={}, max_tokens={}",
            body.model,
            body.messages.len(),
            tool_count,
            body.max_tokens,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "Inference response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("inference API HTTP {status}: {text}"));
        }

        parse_chat_response(&text)
    }
}

/// Parse a non-streaming chat completion body.
pub(crate) fn parse_chat_response(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("inference API error: {}", err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let choice = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| "inference response contained no choices".to_string())?;

    let completion = ChatCompletion {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
        usage: parsed.usage,
        finish_reason: choice.finish_reason,
    };
    debug!(
        "Inference output: {} chars text, {} tool call(s)",
        completion.content.as_ref().map_or(0, |s| s.len()),
        completion.tool_calls.len()
    );
    Ok(completion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let tool = Message::tool_result("call-1", "result");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn chat_request_skips_unset_fields() {
        let req = ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            max_tokens: 100,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("stream").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn parse_tool_call_response() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "lights_on", "arguments": "{\"room\":\"kitchen\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let completion = parse_chat_response(body).unwrap();
        assert!(completion.content.is_none());
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].function.name, "lights_on");
    }

    #[test]
    fn parse_error_body_is_err() {
        let err = parse_chat_response(r#"{"error": {"message": "rate limited"}}"#).unwrap_err();
        assert!(err.contains("rate limited"));
    }

    #[test]
    fn parse_malformed_body_is_err() {
        assert!(parse_chat_response("not json").is_err());
        assert!(parse_chat_response(r#"{"choices": []}"#).is_err());
    }
}
