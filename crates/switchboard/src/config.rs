//! File and environment configuration.
//!
//! A [`SwitchboardConfig`] is read from a JSON file. Every field has a
//! default, so an empty object (or no file at all) is a valid config:
//!
//! ```json
//! {
//!   "inference": { "model": "openai/gpt-4o-mini" },
//!   "orchestrator": { "history_window": 20, "execution_order": "sequential" },
//!   "protocol_servers": [
//!     { "id": "n8n", "url": "http://localhost:5678/mcp", "bearer_token_env": "N8N_TOKEN" },
//!     { "id": "home", "url": "http://localhost:8123/mcp" }
//!   ],
//!   "workflow": { "webhook_base": "http://localhost:5678/webhook", "listing_server": "n8n" }
//! }
//! ```
//!
//! `SWITCHBOARD_MODEL` and `SWITCHBOARD_INFERENCE_URL` override the file.

use crate::agent::config::OrchestratorConfig;
use crate::sources::protocol::DEFAULT_PROTOCOL_TIMEOUT;
use crate::sources::workflow::{
    DEFAULT_DESCRIPTION_FIELD, DEFAULT_DETAILS_TOOL, DEFAULT_LIST_TOOL, DEFAULT_WORKFLOW_TIMEOUT,
};
use crate::sources::{ProtocolSource, SourceSet, WorkflowSource};
use crate::tools::core::LocalSource;
use crate::tools::names::SEPARATOR;
use crate::{DEFAULT_INFERENCE_URL, DEFAULT_MODEL, InferenceClient};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MODEL_ENV: &str = "SWITCHBOARD_MODEL";
pub const INFERENCE_URL_ENV: &str = "SWITCHBOARD_INFERENCE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub inference: InferenceConfig,
    pub orchestrator: OrchestratorConfig,
    pub protocol_servers: Vec<ProtocolServerConfig>,
    pub workflow: Option<WorkflowConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFERENCE_URL.into(),
            model: DEFAULT_MODEL.into(),
            api_key_env: "OPENROUTER_KEY".into(),
            max_tokens: 1024,
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolServerConfig {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token_env: Option<String>,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub webhook_base: String,
    /// Protocol server id used for automation discovery. Also receives bare
    /// tool names no other source claims.
    pub listing_server: String,
    #[serde(default = "default_list_tool")]
    pub list_tool: String,
    #[serde(default = "default_details_tool")]
    pub details_tool: String,
    #[serde(default = "default_description_field")]
    pub description_field: String,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

fn default_source_timeout() -> u64 {
    DEFAULT_PROTOCOL_TIMEOUT.as_secs()
}
fn default_list_tool() -> String {
    DEFAULT_LIST_TOOL.into()
}
fn default_details_tool() -> String {
    DEFAULT_DETAILS_TOOL.into()
}
fn default_description_field() -> String {
    DEFAULT_DESCRIPTION_FIELD.into()
}

impl SwitchboardConfig {
    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        let mut config = Self::from_json(&raw)
            .map_err(|e| format!("failed to parse config {}: {e}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        info!(
            "Loaded config from {} ({} protocol servers, workflow {})",
            path.display(),
            config.protocol_servers.len(),
            if config.workflow.is_some() { "on" } else { "off" }
        );
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }

    /// Apply `SWITCHBOARD_*` overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            debug!("{MODEL_ENV} overrides model: {model}");
            self.inference.model = model;
        }
        if let Some(url) = lookup(INFERENCE_URL_ENV).filter(|v| !v.is_empty()) {
            debug!("{INFERENCE_URL_ENV} overrides inference URL: {url}");
            self.inference.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for server in &self.protocol_servers {
            if server.id.trim().is_empty() {
                return Err("protocol server id must not be empty".into());
            }
            if server.id.contains(SEPARATOR) {
                return Err(format!(
                    "protocol server id '{}' must not contain '{SEPARATOR}'",
                    server.id
                ));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(format!("duplicate protocol server id '{}'", server.id));
            }
        }
        if let Some(ref workflow) = self.workflow
            && !seen.contains(workflow.listing_server.as_str())
        {
            return Err(format!(
                "workflow listing_server '{}' is not a configured protocol server",
                workflow.listing_server
            ));
        }
        Ok(())
    }

    /// Build the process-wide [`SourceSet`] around `local`.
    pub fn build_sources(&self, local: LocalSource) -> Result<SourceSet, String> {
        self.validate()?;
        let local = local
            .with_arg_validation(self.orchestrator.validate_local_args)
            .with_timeout(self.orchestrator.local_timeout());
        let mut set = SourceSet::new(local);

        for server in &self.protocol_servers {
            let mut source = ProtocolSource::new(&server.id, &server.url)
                .with_timeout(Duration::from_secs(server.timeout_secs));
            if let Some(ref var) = server.bearer_token_env {
                match std::env::var(var) {
                    Ok(token) => source = source.with_bearer_token(token),
                    Err(_) => warn!("Protocol server '{}': {var} is not set", server.id),
                }
            }
            set = set.with_protocol(source);
        }

        if let Some(ref wf) = self.workflow {
            let listing = set
                .protocol(&wf.listing_server)
                .cloned()
                .ok_or_else(|| format!("unknown listing_server '{}'", wf.listing_server))?;
            let timeout = if wf.timeout_secs == 0 {
                DEFAULT_WORKFLOW_TIMEOUT
            } else {
                Duration::from_secs(wf.timeout_secs)
            };
            let workflow = WorkflowSource::new(&wf.webhook_base, Arc::clone(&listing))
                .with_list_tool(&wf.list_tool)
                .with_details_tool(&wf.details_tool)
                .with_description_field(&wf.description_field)
                .with_timeout(timeout);
            set = set.with_workflow(workflow);
        }
        Ok(set)
    }

    /// Build the inference client, reading the key from `api_key_env`.
    pub fn build_client(&self) -> Result<InferenceClient, String> {
        let inf = &self.inference;
        let key = std::env::var(&inf.api_key_env)
            .map_err(|_| format!("{} environment variable not set", inf.api_key_env))?;
        Ok(InferenceClient::with_endpoint(
            key,
            &inf.base_url,
            &inf.model,
            Duration::from_secs(inf.timeout_secs),
        )?
        .with_max_tokens(inf.max_tokens)
        .with_temperature(inf.temperature))
    }
}
