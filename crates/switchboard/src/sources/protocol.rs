//! Protocol tool source: one remote tool-protocol server.
//!
//! Each server gets an rmcp client session over the streamable HTTP
//! transport, opened on first use. Every discovered tool is offered to the
//! model as `{id}__{remote_name}`, so two servers exposing the same tool name
//! never collide.

use crate::sources::SourceError;
use crate::tools::descriptor::{ParameterSchema, SourceKind, ToolDescriptor};
use crate::tools::names::qualify;
use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::service::{RoleClient, RunningService, ServiceError};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::ServiceExt;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Default timeout for protocol requests.
pub const DEFAULT_PROTOCOL_TIMEOUT: Duration = Duration::from_secs(30);

type ClientSession = RunningService<RoleClient, ()>;

/// One configured protocol server.
pub struct ProtocolSource {
    id: String,
    url: String,
    timeout: Duration,
    bearer_token: Option<String>,
    client: OnceCell<ClientSession>,
}

impl fmt::Debug for ProtocolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolSource")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("connected", &self.client.initialized())
            .finish_non_exhaustive()
    }
}

impl ProtocolSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            timeout: DEFAULT_PROTOCOL_TIMEOUT,
            bearer_token: None,
            client: OnceCell::new(),
        }
    }

    /// Bound on the handshake and on every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The client session, performing the handshake on first use. A failed
    /// handshake leaves the cell empty so the next request retries.
    async fn session(&self) -> Result<&ClientSession, SourceError> {
        self.client
            .get_or_try_init(|| async {
                let mut cfg = StreamableHttpClientTransportConfig::with_uri(self.url.as_str());
                cfg.auth_header = self.bearer_token.clone();
                let transport = StreamableHttpClientTransport::from_config(cfg);
                let session = self
                    .bounded(async {
                        ().serve(transport).await.map_err(|e| {
                            SourceError::Http(format!("initialize {}: {e}", self.url))
                        })
                    })
                    .await?;
                info!("Connected to protocol server '{}' at {}", self.id, self.url);
                Ok::<_, SourceError>(session)
            })
            .await
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| SourceError::Timeout(self.timeout))?
    }

    /// List every tool on the server, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<rmcp::model::Tool>, SourceError> {
        let session = self.session().await?;
        self.bounded(async { session.peer().list_all_tools().await.map_err(service_error) })
            .await
    }

    /// Canonical descriptors, each renamed `{id}__{remote_name}`.
    pub async fn discover(&self) -> Result<Vec<ToolDescriptor>, SourceError> {
        let tools = self.list_tools().await?;
        debug!("Protocol server '{}' lists {} tools", self.id, tools.len());
        Ok(tools
            .into_iter()
            .map(|t| {
                let schema = Value::Object(t.input_schema.as_ref().clone());
                ToolDescriptor {
                    name: qualify(&self.id, &t.name),
                    description: t.description.map(|d| d.into_owned()).unwrap_or_default(),
                    parameters: ParameterSchema::from_json_schema(&schema),
                    source_kind: SourceKind::Protocol,
                    source_id: self.id.clone(),
                    remote_name: t.name.into_owned(),
                }
            })
            .collect())
    }

    /// Call `remote_name` with `arguments`.
    ///
    /// A result flagged `isError` fails with the joined text fragments. On
    /// success the payload is `structuredContent` when present, else a lone
    /// text fragment holding a JSON object, else the joined text.
    pub async fn call_tool(
        &self,
        remote_name: &str,
        arguments: &Value,
    ) -> Result<Value, SourceError> {
        let arguments = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(SourceError::InvalidArguments(format!(
                    "expected a JSON object, got {other}"
                )));
            }
        };
        let request = CallToolRequestParam {
            name: remote_name.to_string().into(),
            arguments: Some(arguments),
        };
        let session = self.session().await?;
        let result = self
            .bounded(async { session.call_tool(request).await.map_err(service_error) })
            .await?;
        call_result_payload(result)
    }
}

fn service_error(err: ServiceError) -> SourceError {
    match err {
        ServiceError::McpError(e) => SourceError::Rpc {
            code: i64::from(e.code.0),
            message: e.message.into_owned(),
        },
        other => SourceError::Http(other.to_string()),
    }
}

fn call_result_payload(result: CallToolResult) -> Result<Value, SourceError> {
    let texts: Vec<String> = result
        .content
        .iter()
        .filter_map(|block| block.as_text().map(|t| t.text.clone()))
        .collect();

    if result.is_error.unwrap_or(false) {
        let message = if texts.is_empty() {
            "tool reported an error".to_string()
        } else {
            texts.join("\n")
        };
        return Err(SourceError::Remote(message));
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    if let [only] = texts.as_slice()
        && let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(only)
    {
        return Ok(Value::Object(obj));
    }
    Ok(Value::String(texts.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> CallToolResult {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn error_flag_joins_text_fragments() {
        let r = parse(json!({
            "isError": true,
            "content": [
                {"type": "text", "text": "device offline"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": "retry later"}
            ]
        }));
        let err = call_result_payload(r).unwrap_err();
        assert_eq!(err.to_string(), "device offline\nretry later");
    }

    #[test]
    fn error_flag_without_text() {
        let r = parse(json!({"isError": true, "content": []}));
        let err = call_result_payload(r).unwrap_err();
        assert_eq!(err.to_string(), "tool reported an error");
    }

    #[test]
    fn structured_content_is_preferred() {
        let r = parse(json!({
            "content": [{"type": "text", "text": "21 degrees"}],
            "structuredContent": {"temp": 21}
        }));
        assert_eq!(call_result_payload(r).unwrap(), json!({"temp": 21}));
    }

    #[test]
    fn lone_json_text_becomes_object_payload() {
        let r = parse(json!({"content": [{"type": "text", "text": "{\"on\": true}"}]}));
        assert_eq!(call_result_payload(r).unwrap(), json!({"on": true}));
    }

    #[test]
    fn plain_text_payload() {
        let r = parse(json!({"content": [
            {"type": "text", "text": "line one"},
            {"type": "text", "text": "line two"}
        ]}));
        assert_eq!(call_result_payload(r).unwrap(), json!("line one\nline two"));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected_before_connecting() {
        let source = ProtocolSource::new("home", "http://127.0.0.1:9/mcp");
        let err = source.call_tool("lights", &json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidArguments(_)));
        assert!(!source.client.initialized());
    }
}
