//! Tool invocation routing.
//!
//! A requested name resolves to exactly one source by checking, in order:
//!
//! 1. **Local**: a registered in-process tool. Always wins.
//! 2. **Workflow**: an automation in the session's catalog snapshot.
//! 3. **Protocol**: a name with the `__` separator addresses the server
//!    named by its prefix, with the remainder forwarded verbatim. A bare name
//!    goes to the workflow listing server.
//!
//! Routing never fails: an unresolvable name or a source error becomes an
//! error [`ToolInvocationResult`].

use crate::agent::catalog::Catalog;
use crate::sources::{SourceError, SourceSet, ToolSource};
use crate::tools::descriptor::SourceKind;
use crate::tools::invocation::{ToolInvocationRequest, ToolInvocationResult};
use crate::tools::names::split_qualified;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Where a tool call goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Local,
    Workflow { automation: String },
    Protocol { server: String, remote_name: String },
}

#[derive(Debug, Clone)]
pub struct Router {
    sources: Arc<SourceSet>,
}

impl Router {
    pub fn new(sources: Arc<SourceSet>) -> Self {
        Self { sources }
    }

    /// Resolve `name` against the sources and `catalog`. `None` means no
    /// source can take the call.
    pub fn resolve(&self, catalog: &Catalog, name: &str) -> Option<Route> {
        if self.sources.local().contains(name) {
            return Some(Route::Local);
        }

        if self.sources.workflow().is_some()
            && let Some(d) = catalog.get(name)
            && d.source_kind == SourceKind::Workflow
        {
            return Some(Route::Workflow {
                automation: d.remote_name.clone(),
            });
        }

        if let Some((server, remote_name)) = split_qualified(name) {
            return Some(Route::Protocol {
                server: server.to_string(),
                remote_name: remote_name.to_string(),
            });
        }

        self.sources
            .default_protocol()
            .map(|server| Route::Protocol {
                server: server.id().to_string(),
                remote_name: name.to_string(),
            })
    }

    /// Dispatch `request` and convert every outcome into a result.
    pub async fn route(
        &self,
        catalog: &Catalog,
        request: &ToolInvocationRequest,
    ) -> ToolInvocationResult {
        let name = request.tool_name.as_str();
        let Some(route) = self.resolve(catalog, name) else {
            warn!("No source for requested tool '{name}'");
            return ToolInvocationResult::failure(
                &request.call_id,
                name,
                format!("tool not found: {name}"),
            );
        };
        debug!("Routing {name} -> {route:?}");

        let start = Instant::now();
        let outcome = self.dispatch(&route, request).await;
        if let Err(ref e) = outcome {
            warn!(
                "Tool {name} failed after {:.0}ms: {e}",
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        ToolInvocationResult::for_request(request, outcome)
    }

    async fn dispatch(
        &self,
        route: &Route,
        request: &ToolInvocationRequest,
    ) -> Result<serde_json::Value, SourceError> {
        let (source, remote_name) = match route {
            Route::Local => (
                Some(self.sources.local_source()),
                request.tool_name.as_str(),
            ),
            Route::Workflow { automation } => (
                self.sources.workflow().cloned().map(ToolSource::Workflow),
                automation.as_str(),
            ),
            Route::Protocol {
                server,
                remote_name,
            } => {
                let source = self
                    .sources
                    .protocol(server)
                    .cloned()
                    .ok_or_else(|| SourceError::UnknownServer(server.clone()))?;
                (Some(ToolSource::Protocol(source)), remote_name.as_str())
            }
        };
        match source {
            Some(source) => source.invoke(request, remote_name).await,
            None => Err(SourceError::Local(format!(
                "source for '{}' is not configured",
                request.tool_name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolDef;
    use crate::sources::{ProtocolSource, WorkflowSource};
    use crate::tools::core::{FnTool, LocalSource};
    use crate::tools::descriptor::{ParameterSchema, ToolDescriptor};
    use serde_json::{Value, json};

    fn local_tool(name: &str) -> FnTool {
        FnTool::new(
            ToolDef::new(name, "local", json!({"type": "object", "properties": {}})),
            |_: Value| async move { Ok(json!({"local": true})) },
        )
    }

    fn sources(with_workflow: bool) -> Arc<SourceSet> {
        let set = SourceSet::new(LocalSource::new().with(local_tool("porch_light")))
            .with_protocol(ProtocolSource::new("n8n", "http://127.0.0.1:1/mcp"))
            .with_protocol(ProtocolSource::new("home", "http://127.0.0.1:2/mcp"));
        if !with_workflow {
            return Arc::new(set);
        }
        let listing = Arc::clone(set.protocol("n8n").unwrap());
        Arc::new(set.with_workflow(WorkflowSource::new("http://127.0.0.1:3/webhook", listing)))
    }

    fn workflow(name: &str, automation: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: String::new(),
            parameters: ParameterSchema::open(),
            source_kind: SourceKind::Workflow,
            source_id: "n8n".into(),
            remote_name: automation.into(),
        }
    }

    #[test]
    fn local_beats_workflow_with_same_name() {
        let router = Router::new(sources(true));
        let catalog = Catalog::new([workflow("porch_light", "Porch Light")]);
        assert_eq!(router.resolve(&catalog, "porch_light"), Some(Route::Local));
    }

    #[test]
    fn workflow_resolves_to_automation_name() {
        let router = Router::new(sources(true));
        let catalog = Catalog::new([workflow("morning_brief", "Morning Brief")]);
        assert_eq!(
            router.resolve(&catalog, "morning_brief"),
            Some(Route::Workflow {
                automation: "Morning Brief".into()
            })
        );
    }

    #[test]
    fn prefix_selects_server_and_forwards_remainder() {
        let router = Router::new(sources(false));
        assert_eq!(
            router.resolve(&Catalog::default(), "home__set__scene"),
            Some(Route::Protocol {
                server: "home".into(),
                remote_name: "set__scene".into()
            })
        );
    }

    #[test]
    fn bare_name_goes_to_listing_server() {
        let router = Router::new(sources(true));
        assert_eq!(
            router.resolve(&Catalog::default(), "search_workflows"),
            Some(Route::Protocol {
                server: "n8n".into(),
                remote_name: "search_workflows".into()
            })
        );
    }

    #[tokio::test]
    async fn unknown_bare_name_without_workflow_is_not_found() {
        let router = Router::new(sources(false));
        let req = ToolInvocationRequest::new("c1", "teleport", json!({}));
        let result = router.route(&Catalog::default(), &req).await;
        assert_eq!(result.error_message(), Some("tool not found: teleport"));
        assert_eq!(result.call_id, "c1");
    }

    #[tokio::test]
    async fn unknown_server_prefix_is_an_error_result() {
        let router = Router::new(sources(false));
        let req = ToolInvocationRequest::new("c1", "garage__open", json!({}));
        let result = router.route(&Catalog::default(), &req).await;
        assert!(result.error_message().unwrap().contains("garage"));
    }

    #[tokio::test]
    async fn local_route_invokes_local_tool() {
        let router = Router::new(sources(false));
        let req = ToolInvocationRequest::new("c1", "porch_light", json!({}));
        let result = router.route(&Catalog::default(), &req).await;
        assert_eq!(result.payload(), Some(&json!({"local": true})));
    }
}
