//! In-process tools.
//!
//! The [`Tool`] trait defines what every local callable provides: a static
//! API definition (name, description, JSON schema) and an async `execute`
//! method. Tools are collected into a [`LocalSource`], which exports their
//! canonical descriptors and dispatches calls with validation, timing and a
//! bounded timeout.

use crate::ToolDef;
use crate::sources::SourceError;
use crate::tools::descriptor::{ParameterSchema, ToolDescriptor};
use crate::tools::invocation::ToolInvocationRequest;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for a tool-result message before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Default timeout for local tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, String>> + Send + 'a>>;

/// An in-process callable operation.
///
/// # Example
///
/// ```ignore
/// struct Thermostat { hub: HubClient }
///
/// impl Tool for Thermostat {
///     fn definition(&self) -> ToolDef { /* ... */ }
///
///     fn execute(&self, arguments: &str) -> ToolFuture<'_> {
///         let arguments = arguments.to_string();
///         Box::pin(async move {
///             let args: SetTemp = parse_tool_args(&arguments)?;
///             self.hub.set_temperature(args.room, args.celsius).await
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The tool definition, including its JSON Schema parameters.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the given raw JSON arguments string.
    ///
    /// Returns the payload on success. An `Err` becomes an error result for
    /// the model; it never aborts the turn.
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    fn name(&self) -> String {
        self.definition().function.name.clone()
    }

    /// Canonical descriptor derived from [`definition`](Tool::definition).
    fn descriptor(&self) -> ToolDescriptor {
        let def = self.definition();
        ToolDescriptor::local(
            def.function.name,
            def.function.description,
            ParameterSchema::from_json_schema(&def.function.parameters),
        )
    }
}

// ── LocalSource ────────────────────────────────────────────────────

/// The registry of in-process tools.
///
/// Local tools take routing priority over every remote source, so a name
/// registered here shadows any workflow or protocol tool with the same name.
///
/// # Example
///
/// ```ignore
/// let local = LocalSource::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_arg_validation(true)
///     .with(FnTool::new(lights_def(), |args: LightArgs| async move {
///         Ok(json!({"room": args.room, "on": true}))
///     }));
/// ```
pub struct LocalSource {
    tools: HashMap<String, Box<dyn Tool>>,
    /// Registration order, for stable descriptor output.
    order: Vec<String>,
    validate_args: bool,
    timeout: Duration,
}

impl fmt::Debug for LocalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSource")
            .field("tools", &self.order)
            .field("validate_args", &self.validate_args)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LocalSource {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            validate_args: false,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Validate arguments against each tool's JSON Schema before execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name();
        if self.tools.insert(name.clone(), Box::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Register a tool only if `condition` is true.
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every registered tool, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.descriptor())
            .collect()
    }

    /// Invoke a registered tool, bounded by the source timeout.
    pub async fn invoke(&self, request: &ToolInvocationRequest) -> Result<Value, SourceError> {
        let name = request.tool_name.as_str();
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| SourceError::Local(format!("unknown local tool '{name}'")))?;
        let arguments = request.raw_arguments();

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.as_ref(), &arguments)
        {
            return Err(SourceError::InvalidArguments(error));
        }

        log_tool_call(name, &arguments);
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, tool.execute(&arguments)).await {
            Ok(r) => r,
            Err(_) => {
                info!(
                    "Tool {name} timed out after {:.1}s",
                    start.elapsed().as_secs_f64()
                );
                return Err(SourceError::Timeout(self.timeout));
            }
        };

        debug!(
            "Tool {name} completed in {:.0}ms (ok={})",
            start.elapsed().as_secs_f64() * 1000.0,
            result.is_ok()
        );
        result.map_err(SourceError::Local)
    }
}

impl Default for LocalSource {
    fn default() -> Self {
        Self::new()
    }
}

// ── FnTool ─────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler = Box<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync,
>;

/// A closure-based tool that auto-parses typed arguments.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct RoomArgs {
///     /// Room to act on.
///     room: String,
/// }
///
/// let tool = FnTool::new(
///     ToolDef::new("lights_on", "Turn the lights on", json_schema_for::<RoomArgs>()),
///     |args: RoomArgs| async move { Ok(json!({"room": args.room, "on": true})) },
/// );
/// ```
pub struct FnTool {
    def: ToolDef,
    handler: ErasedToolHandler,
}

impl FnTool {
    /// Create a closure-based tool. Arguments that fail to deserialize into
    /// `A` produce an error result without calling the handler.
    pub fn new<A, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let erased =
            move |raw: String| -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> {
                match parse_tool_args::<A>(&raw) {
                    Ok(args) => Box::pin(handler(args)),
                    Err(e) => Box::pin(async move { Err(e) }),
                }
            };

        Self {
            def,
            handler: Box::new(erased),
        }
    }
}

impl Tool for FnTool {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        (self.handler)(arguments.to_string())
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.def.function.name)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(message)` formatted for the model to
/// self-correct.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let args_value: Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "invalid JSON arguments for tool '{}': {e}. \
                 Please provide valid JSON matching the tool's parameter schema.",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().function.parameters;

    // An invalid schema disables validation for that tool.
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(_) => return None,
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "argument validation failed for tool '{}':\n{}",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 {
            "..."
        } else {
            ""
        }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes on a char boundary, appending a
/// notice if trimmed.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}...\n[truncated: {} bytes total]",
        s.get(..end).unwrap_or_default(),
        s.len()
    )
}

/// Parse raw JSON arguments into a typed struct, with an error message
/// suitable for returning to the model.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_schema_for;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct RoomArgs {
        room: String,
    }

    fn lights() -> FnTool {
        FnTool::new(
            ToolDef::new("lights_on", "Turn lights on", json_schema_for::<RoomArgs>()),
            |args: RoomArgs| async move { Ok(json!({"room": args.room, "on": true})) },
        )
    }

    struct Slow;

    impl Tool for Slow {
        fn definition(&self) -> ToolDef {
            ToolDef::new("slow", "Sleeps", json!({"type": "object", "properties": {}}))
        }

        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(json!("late"))
            })
        }
    }

    fn request(name: &str, args: Value) -> ToolInvocationRequest {
        ToolInvocationRequest::new("call-1", name, args)
    }

    #[tokio::test]
    async fn invokes_fn_tool_with_typed_args() {
        let local = LocalSource::new().with(lights());
        let out = local
            .invoke(&request("lights_on", json!({"room": "kitchen"})))
            .await
            .unwrap();
        assert_eq!(out, json!({"room": "kitchen", "on": true}));
    }

    #[tokio::test]
    async fn bad_args_are_an_error_not_a_panic() {
        let local = LocalSource::new().with(lights());
        let err = local
            .invoke(&request("lights_on", json!({"floor": 2})))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Local(ref m) if m.contains("invalid tool arguments")));
    }

    #[tokio::test]
    async fn validation_rejects_before_execution() {
        let local = LocalSource::new().with_arg_validation(true).with(lights());
        let err = local
            .invoke(&request("lights_on", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn timeout_is_a_failed_result() {
        let local = LocalSource::new()
            .with_timeout(Duration::from_millis(20))
            .with(Slow);
        let err = local.invoke(&request("slow", json!({}))).await.unwrap_err();
        assert!(matches!(err, SourceError::Timeout(_)));
    }

    #[test]
    fn descriptors_follow_registration_order() {
        let local = LocalSource::new().with(Slow).with(lights());
        let names: Vec<String> = local.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["slow", "lights_on"]);
        let d = &local.descriptors()[1];
        assert_eq!(d.parameters.required(), vec!["room"]);
        assert!(local.contains("slow"));
        assert!(!local.contains("fan_on"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "\u{e9}".repeat(10);
        let out = truncate_result(s, 5);
        assert!(out.starts_with("\u{e9}\u{e9}..."));
        assert!(out.ends_with("[truncated: 20 bytes total]"));
        assert_eq!(truncate_result("short".into(), 10), "short");
    }
}
