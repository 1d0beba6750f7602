//! The closed set of tool sources.
//!
//! - [`ToolSource::Local`]: in-process [`LocalSource`].
//! - [`ToolSource::Workflow`]: webhook-triggered automations, [`WorkflowSource`].
//! - [`ToolSource::Protocol`]: one remote tool-protocol server, [`ProtocolSource`].
//!
//! Every variant offers the same two operations, `discover` and `invoke`.
//! A [`SourceSet`] holds the configured sources for a process; it is
//! read-only after construction and shared by every session.

pub mod protocol;
pub mod workflow;

use crate::tools::core::LocalSource;
use crate::tools::descriptor::{SourceKind, ToolDescriptor};
use crate::tools::invocation::ToolInvocationRequest;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use protocol::ProtocolSource;
pub use workflow::WorkflowSource;

/// Failure inside a source adapter. Converted to an error tool result at the
/// router; never propagated past it.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The remote tool ran and reported failure.
    #[error("{0}")]
    Remote(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("tool not found: no protocol server named '{0}'")]
    UnknownServer(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Local(String),
}

/// One tool source.
#[derive(Debug, Clone)]
pub enum ToolSource {
    Local(Arc<LocalSource>),
    Workflow(Arc<WorkflowSource>),
    Protocol(Arc<ProtocolSource>),
}

impl ToolSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ToolSource::Local(_) => SourceKind::Local,
            ToolSource::Workflow(_) => SourceKind::Workflow,
            ToolSource::Protocol(_) => SourceKind::Protocol,
        }
    }

    /// Instance label for logs: `local`, `workflow` or the protocol id.
    pub fn label(&self) -> &str {
        match self {
            ToolSource::Local(_) => "local",
            ToolSource::Workflow(_) => "workflow",
            ToolSource::Protocol(p) => p.id(),
        }
    }

    pub async fn discover(&self) -> Result<Vec<ToolDescriptor>, SourceError> {
        match self {
            ToolSource::Local(local) => Ok(local.descriptors()),
            ToolSource::Workflow(workflow) => workflow.discover().await,
            ToolSource::Protocol(protocol) => protocol.discover().await,
        }
    }

    /// Invoke `remote_name` on this source. Local tools are addressed by the
    /// request's own tool name.
    pub async fn invoke(
        &self,
        request: &ToolInvocationRequest,
        remote_name: &str,
    ) -> Result<Value, SourceError> {
        match self {
            ToolSource::Local(local) => local.invoke(request).await,
            ToolSource::Workflow(workflow) => {
                workflow.invoke(remote_name, &request.arguments).await
            }
            ToolSource::Protocol(protocol) => {
                protocol.call_tool(remote_name, &request.arguments).await
            }
        }
    }
}

/// The configured sources, in routing priority order.
#[derive(Debug, Clone)]
pub struct SourceSet {
    local: Arc<LocalSource>,
    workflow: Option<Arc<WorkflowSource>>,
    protocols: Vec<Arc<ProtocolSource>>,
}

impl SourceSet {
    pub fn new(local: LocalSource) -> Self {
        Self {
            local: Arc::new(local),
            workflow: None,
            protocols: Vec::new(),
        }
    }

    /// Add a protocol server. Ids must be unique; a later server with an
    /// existing id replaces the earlier one.
    pub fn with_protocol(mut self, source: ProtocolSource) -> Self {
        self.protocols.retain(|p| p.id() != source.id());
        self.protocols.push(Arc::new(source));
        self
    }

    pub fn with_workflow(mut self, source: WorkflowSource) -> Self {
        self.workflow = Some(Arc::new(source));
        self
    }

    pub fn local(&self) -> &LocalSource {
        &self.local
    }

    pub fn local_source(&self) -> ToolSource {
        ToolSource::Local(Arc::clone(&self.local))
    }

    pub fn workflow(&self) -> Option<&Arc<WorkflowSource>> {
        self.workflow.as_ref()
    }

    pub fn protocol(&self, id: &str) -> Option<&Arc<ProtocolSource>> {
        self.protocols.iter().find(|p| p.id() == id)
    }

    pub fn protocols(&self) -> &[Arc<ProtocolSource>] {
        &self.protocols
    }

    /// Protocol server that receives bare (unprefixed) tool names: the
    /// workflow listing server, when a workflow source is configured.
    pub fn default_protocol(&self) -> Option<&Arc<ProtocolSource>> {
        let id = self.workflow.as_ref()?.listing_server();
        self.protocol(id)
    }

    /// Every source as a [`ToolSource`], Local first, then Workflow, then
    /// Protocol servers in configuration order.
    pub fn sources(&self) -> Vec<ToolSource> {
        let mut out = vec![self.local_source()];
        if let Some(ref w) = self.workflow {
            out.push(ToolSource::Workflow(Arc::clone(w)));
        }
        out.extend(self.protocols.iter().cloned().map(ToolSource::Protocol));
        out
    }
}
