//! Shared fixtures: a scripted inference backend and real axum servers
//! standing in for a tool-protocol server and a webhook endpoint.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchboard::api::{BackendFuture, Detection, InferenceBackend, TextStream};
use switchboard::{Message, ToolCall, ToolDef};

pub const SESSION_ID: &str = "mock-session-1";

// ── Scripted backend ───────────────────────────────────────────────

/// Answers Detect from a queue (falling back to a plain text answer) and
/// streams a fixed reply. Records every request it sees.
#[derive(Default)]
pub struct ScriptedBackend {
    detections: Mutex<VecDeque<Detection>>,
    reply: Vec<String>,
    pub detect_calls: Mutex<Vec<(Vec<String>, Vec<Message>)>>,
    pub respond_calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(reply: &[&str]) -> Self {
        Self {
            reply: reply.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Queue a Detect result asking for one tool call.
    pub fn then_call(self, call_id: &str, name: &str, args: Value) -> Self {
        self.then(Detection::ToolCalls {
            calls: vec![ToolCall::new(call_id, name, args.to_string())],
            text: None,
        })
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then(Detection::Text(text.into()))
    }

    pub fn then(self, detection: Detection) -> Self {
        self.detections.lock().unwrap().push_back(detection);
        self
    }

    pub fn last_detect_messages(&self) -> Vec<Message> {
        self.detect_calls.lock().unwrap().last().unwrap().1.clone()
    }

    pub fn last_respond_messages(&self) -> Vec<Message> {
        self.respond_calls.lock().unwrap().last().unwrap().clone()
    }
}

impl InferenceBackend for ScriptedBackend {
    fn detect<'a>(
        &'a self,
        tools: &'a [ToolDef],
        messages: &'a [Message],
    ) -> BackendFuture<'a, Detection> {
        let names = tools.iter().map(|t| t.function.name.clone()).collect();
        self.detect_calls
            .lock()
            .unwrap()
            .push((names, messages.to_vec()));
        let next = self
            .detections
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Detection::Text("ok".into()));
        Box::pin(async move { Ok(next) })
    }

    fn respond<'a>(&'a self, messages: &'a [Message]) -> BackendFuture<'a, TextStream> {
        self.respond_calls.lock().unwrap().push(messages.to_vec());
        let chunks: Vec<Result<String, String>> = self.reply.iter().cloned().map(Ok).collect();
        Box::pin(async move { Ok(futures::stream::iter(chunks).boxed()) })
    }
}

// ── Mock protocol server ───────────────────────────────────────────

#[derive(Default)]
pub struct ProtocolState {
    /// Tools returned by `tools/list`.
    pub tools: Vec<Value>,
    /// Payload returned by the workflow listing tool, if any.
    pub automations: Option<Value>,
    pub list_calls: AtomicUsize,
    /// `(name, arguments)` of every `tools/call`.
    pub calls: Mutex<Vec<(String, Value)>>,
    /// Requests that arrived without the session header after initialize.
    pub missing_session: AtomicUsize,
    /// Delay before answering `tools/list`.
    pub list_delay: Duration,
}

pub struct MockProtocol {
    pub url: String,
    pub state: Arc<ProtocolState>,
}

pub async fn spawn_protocol(tools: Vec<Value>, automations: Option<Value>) -> MockProtocol {
    spawn_protocol_with(ProtocolState {
        tools,
        automations,
        ..ProtocolState::default()
    })
    .await
}

pub async fn spawn_protocol_with(state: ProtocolState) -> MockProtocol {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/mcp", post(rpc))
        .with_state(Arc::clone(&state));
    let addr = serve(app).await;
    MockProtocol {
        url: format!("http://{addr}/mcp"),
        state,
    }
}

async fn rpc(
    State(state): State<Arc<ProtocolState>>,
    headers: HeaderMap,
    Json(req): Json<Value>,
) -> Response {
    let method = req["method"].as_str().unwrap_or_default().to_string();
    let Some(id) = req.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    if method == "initialize" {
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2025-03-26",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "mock", "version": "0.0.1"}
            }
        });
        return ([("mcp-session-id", SESSION_ID)], Json(body)).into_response();
    }

    if headers.get("mcp-session-id").and_then(|v| v.to_str().ok()) != Some(SESSION_ID) {
        state.missing_session.fetch_add(1, Ordering::SeqCst);
    }

    let result = match method.as_str() {
        "tools/list" => {
            state.list_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(state.list_delay).await;
            json!({ "tools": state.tools })
        }
        "tools/call" => {
            let name = req["params"]["name"].as_str().unwrap_or_default().to_string();
            let args = req["params"]["arguments"].clone();
            state.calls.lock().unwrap().push((name.clone(), args.clone()));
            if name == "slow" {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            call_result(&state, &name, &args)
        }
        other => {
            let body = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("unknown method {other}")}
            });
            return Json(body).into_response();
        }
    };
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
}

fn call_result(state: &ProtocolState, name: &str, args: &Value) -> Value {
    match (name, &state.automations) {
        ("search_workflows", Some(list)) => json!({
            "content": [{"type": "text", "text": list.to_string()}]
        }),
        ("get_workflow_details", Some(_)) => json!({
            "structuredContent": {"nodes": [{
                "type": "n8n-nodes-base.webhook",
                "notes": format!("Runs workflow {}", args["workflowId"])
            }]},
            "content": []
        }),
        ("fail", _) => json!({
            "isError": true,
            "content": [{"type": "text", "text": "device offline"}]
        }),
        _ => json!({
            "structuredContent": {"tool": name, "args": args},
            "content": [{"type": "text", "text": "done"}]
        }),
    }
}

// ── Mock webhook endpoint ──────────────────────────────────────────

#[derive(Default)]
pub struct WebhookState {
    pub hits: Mutex<Vec<(String, Value)>>,
}

pub struct MockWebhook {
    pub base: String,
    pub state: Arc<WebhookState>,
}

/// Automations named `Broken` answer HTTP 500, `Slow` takes two seconds;
/// everything else echoes.
pub async fn spawn_webhook() -> MockWebhook {
    let state = Arc::new(WebhookState::default());
    let app = Router::new()
        .route("/webhook/{name}", post(webhook))
        .with_state(Arc::clone(&state));
    let addr = serve(app).await;
    MockWebhook {
        base: format!("http://{addr}/webhook"),
        state,
    }
}

async fn webhook(
    State(state): State<Arc<WebhookState>>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.hits.lock().unwrap().push((name.clone(), body.clone()));
    match name.as_str() {
        "Broken" => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "workflow crashed").into_response();
        }
        "Slow" => tokio::time::sleep(Duration::from_secs(2)).await,
        _ => {}
    }
    Json(json!({"automation": name, "received": body})).into_response()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn protocol_tool(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {"entity": {"type": "string"}},
            "required": ["entity"]
        }
    })
}
