//! Workflow automation source.
//!
//! Automations are authored in an external workflow tool and triggered by
//! POSTing JSON to `{webhook_base}/{automation name}`. They describe
//! themselves: discovery goes through the tool's listing protocol server,
//! asking it for active automations and then, per automation, for the
//! details whose trigger node carries a human-written description.

use crate::sources::SourceError;
use crate::sources::protocol::ProtocolSource;
use crate::tools::descriptor::{ParameterSchema, SourceKind, ToolDescriptor};
use crate::tools::names::sanitize_tool_name;
use futures::future::join_all;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_LIST_TOOL: &str = "search_workflows";
pub const DEFAULT_DETAILS_TOOL: &str = "get_workflow_details";
pub const DEFAULT_DESCRIPTION_FIELD: &str = "notes";
pub const DEFAULT_WORKFLOW_TIMEOUT: Duration = Duration::from_secs(30);

/// An automation reported by the listing server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automation {
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
pub struct WorkflowSource {
    webhook_base: String,
    listing: Arc<ProtocolSource>,
    list_tool: String,
    details_tool: String,
    description_field: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl WorkflowSource {
    pub fn new(webhook_base: impl Into<String>, listing: Arc<ProtocolSource>) -> Self {
        Self {
            webhook_base: webhook_base.into(),
            listing,
            list_tool: DEFAULT_LIST_TOOL.into(),
            details_tool: DEFAULT_DETAILS_TOOL.into(),
            description_field: DEFAULT_DESCRIPTION_FIELD.into(),
            client: reqwest::Client::new(),
            timeout: DEFAULT_WORKFLOW_TIMEOUT,
        }
    }

    pub fn with_list_tool(mut self, name: impl Into<String>) -> Self {
        self.list_tool = name.into();
        self
    }

    pub fn with_details_tool(mut self, name: impl Into<String>) -> Self {
        self.details_tool = name.into();
        self
    }

    pub fn with_description_field(mut self, field: impl Into<String>) -> Self {
        self.description_field = field.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Id of the protocol server used for listing. Bare protocol tool
    /// names are routed there as well.
    pub fn listing_server(&self) -> &str {
        self.listing.id()
    }

    /// Active automations known to the listing server.
    pub async fn list_automations(&self) -> Result<Vec<Automation>, SourceError> {
        let payload = self.listing.call_tool(&self.list_tool, &json!({})).await?;
        Ok(parse_automations(&payload))
    }

    /// One permissive-schema descriptor per active automation. A failed
    /// details lookup keeps the automation with a generic description.
    pub async fn discover(&self) -> Result<Vec<ToolDescriptor>, SourceError> {
        let automations = self.list_automations().await?;
        debug!("Workflow listing returned {} active automations", automations.len());

        let descriptions = join_all(automations.iter().map(|a| self.describe(a))).await;

        Ok(automations
            .into_iter()
            .zip(descriptions)
            .map(|(automation, description)| ToolDescriptor {
                name: sanitize_tool_name(&automation.name),
                description,
                parameters: ParameterSchema::open(),
                source_kind: SourceKind::Workflow,
                source_id: self.listing.id().to_string(),
                remote_name: automation.name,
            })
            .collect())
    }

    async fn describe(&self, automation: &Automation) -> String {
        let fallback = || format!("Run the '{}' automation.", automation.name);
        match self
            .listing
            .call_tool(&self.details_tool, &json!({ "workflowId": automation.id }))
            .await
        {
            Ok(details) => {
                trigger_description(&details, &self.description_field).unwrap_or_else(fallback)
            }
            Err(e) => {
                warn!(
                    "Workflow details for '{}' unavailable: {e}",
                    automation.name
                );
                fallback()
            }
        }
    }

    /// Trigger `automation` with `arguments` as the JSON body. Any non-2xx
    /// status is an error; a JSON body is the payload, other text is passed
    /// through as a string.
    pub async fn invoke(&self, automation: &str, arguments: &Value) -> Result<Value, SourceError> {
        let url = self.webhook_url(automation)?;
        let start = Instant::now();
        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(arguments)
            .send()
            .await
            .map_err(|e| self.http_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.http_error(e))?;
        debug!(
            "Automation '{automation}' answered {status} in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            text.len()
        );

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::String("ok".into()));
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    fn webhook_url(&self, automation: &str) -> Result<reqwest::Url, SourceError> {
        let mut url = reqwest::Url::parse(&self.webhook_base)
            .map_err(|e| SourceError::Http(format!("invalid webhook base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Http("webhook base cannot take a path".into()))?
            .pop_if_empty()
            .push(automation);
        Ok(url)
    }

    fn http_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Http(e.to_string())
        }
    }
}

/// Extract active automations from a listing payload. Accepts a bare array
/// or an object wrapping one under `data`, `workflows`, `items` or
/// `results`. Entries without a name are skipped; `active` defaults to true.
fn parse_automations(payload: &Value) -> Vec<Automation> {
    let list = match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => ["data", "workflows", "items", "results"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array)),
        _ => None,
    };
    let Some(list) = list else {
        warn!("Workflow listing payload has no automation list");
        return Vec::new();
    };
    list.iter()
        .filter(|item| item.get("active").and_then(Value::as_bool).unwrap_or(true))
        .filter_map(|item| {
            let name = item.get("name").and_then(Value::as_str)?.trim();
            if name.is_empty() {
                return None;
            }
            let id = match item.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => name.to_string(),
            };
            Some(Automation {
                id,
                name: name.to_string(),
            })
        })
        .collect()
}

/// Read `field` from the trigger node of a details payload. The trigger is
/// the first webhook node, else the first node whose type mentions
/// "trigger".
fn trigger_description(details: &Value, field: &str) -> Option<String> {
    let nodes = ["/nodes", "/workflow/nodes", "/data/nodes"]
        .iter()
        .find_map(|p| details.pointer(p).and_then(Value::as_array))?;
    let node_type = |n: &Value| {
        n.get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase()
    };
    let trigger = nodes
        .iter()
        .find(|n| node_type(n).contains("webhook"))
        .or_else(|| nodes.iter().find(|n| node_type(n).contains("trigger")))?;
    trigger
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_accepts_wrapped_and_bare_arrays() {
        let wrapped = json!({"data": [
            {"id": "a1", "name": "Porch Light", "active": true},
            {"id": 7, "name": "Backup", "active": false},
            {"id": "a3", "name": "Morning Brief"}
        ]});
        let autos = parse_automations(&wrapped);
        assert_eq!(
            autos,
            vec![
                Automation {
                    id: "a1".into(),
                    name: "Porch Light".into()
                },
                Automation {
                    id: "a3".into(),
                    name: "Morning Brief".into()
                },
            ]
        );
        let bare = json!([{"id": 5, "name": "Feed Cat"}]);
        assert_eq!(parse_automations(&bare)[0].id, "5");
        assert!(parse_automations(&json!("nope")).is_empty());
    }

    #[test]
    fn description_comes_from_webhook_trigger_notes() {
        let details = json!({"workflow": {"nodes": [
            {"type": "n8n-nodes-base.set", "notes": "not me"},
            {"type": "n8n-nodes-base.webhook", "notes": "Turns on the porch light."}
        ]}});
        assert_eq!(
            trigger_description(&details, "notes").as_deref(),
            Some("Turns on the porch light.")
        );
    }

    #[test]
    fn falls_back_to_generic_trigger_node() {
        let details = json!({"nodes": [
            {"type": "scheduleTrigger", "notes": "Runs nightly."}
        ]});
        assert_eq!(
            trigger_description(&details, "notes").as_deref(),
            Some("Runs nightly.")
        );
        assert!(trigger_description(&json!({"nodes": []}), "notes").is_none());
        assert!(trigger_description(&details, "description").is_none());
    }

    #[test]
    fn webhook_url_escapes_automation_name() {
        let listing = Arc::new(ProtocolSource::new("n8n", "http://127.0.0.1:1/mcp"));
        let source = WorkflowSource::new("http://hooks.local/webhook/", listing);
        let url = source.webhook_url("Porch Light").unwrap();
        assert_eq!(url.as_str(), "http://hooks.local/webhook/Porch%20Light");
        assert_eq!(source.listing_server(), "n8n");
    }
}
