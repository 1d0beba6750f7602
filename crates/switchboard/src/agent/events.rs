//! Events, handlers, notifications and turn outcomes for the
//! [`Orchestrator`](super::orchestrator::Orchestrator).
//!
//! A turn reports its progress through [`TurnEvent`] variants. Callers
//! implement [`EventHandler`] to observe them: streaming answer text to a
//! speaker, updating a UI, logging.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget turns |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures, e.g. print each [`TurnEvent::TextDelta`] |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//!
//! Separately, a [`ToolNotification`] is pushed onto an unbounded channel as
//! soon as tool calls are detected, for observers that must not slow the
//! turn down (a UI showing "checking the weather...").

use crate::tools::invocation::ToolInvocationResult;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Which inference call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Detect,
    Respond,
}

/// Events emitted during a turn.
#[derive(Debug)]
pub enum TurnEvent<'a> {
    TurnStart {
        session_id: &'a str,
        catalog_size: usize,
    },
    /// The model asked for these tools, in this order.
    ToolsDetected {
        names: &'a [String],
        arguments: &'a [Value],
    },
    ToolExecuting {
        name: &'a str,
        call_id: &'a str,
        arguments: &'a Value,
    },
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a ToolInvocationResult,
    },
    /// A tool finished after the turn was cancelled; its result was dropped.
    ToolResultDiscarded { name: &'a str, call_id: &'a str },
    /// A chunk of the user-facing answer.
    TextDelta(&'a str),
    InferenceError { phase: Phase, error: &'a str },
    Cancelled,
    Finished { text: &'a str },
}

/// Handler for turn events.
///
/// # Example
///
/// ```ignore
/// struct Speaker(TtsClient);
///
/// impl EventHandler for Speaker {
///     fn on_event(&self, event: &TurnEvent<'_>) {
///         if let TurnEvent::TextDelta(chunk) = event {
///             self.0.speak(chunk);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &TurnEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let TurnEvent::TextDelta(text) = event {
///         print!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&TurnEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&TurnEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&TurnEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &TurnEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(speaker);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &TurnEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &TurnEvent<'_>) {
        match event {
            TurnEvent::TurnStart {
                session_id,
                catalog_size,
            } => {
                debug!("[{session_id}] turn started with {catalog_size} tools available");
            }
            TurnEvent::ToolsDetected { names, .. } => {
                info!("Model requested {} tool(s): {}", names.len(), names.join(", "));
            }
            TurnEvent::ToolExecuting { name, call_id, .. } => {
                debug!("Executing tool {name} ({call_id})");
            }
            TurnEvent::ToolResult { name, result, .. } => match result.error_message() {
                Some(e) => warn!("Tool {name} failed: {e}"),
                None => debug!("Tool {name} succeeded"),
            },
            TurnEvent::ToolResultDiscarded { name, .. } => {
                warn!("Discarded late result from {name} after cancellation");
            }
            TurnEvent::TextDelta(delta) => {
                let preview: String = delta.chars().take(80).collect();
                trace!("Stream text delta: {preview}");
            }
            TurnEvent::InferenceError { phase, error } => {
                warn!("Inference failed during {phase:?}: {error}");
            }
            TurnEvent::Cancelled => {
                info!("Turn cancelled");
            }
            TurnEvent::Finished { text } => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "Turn finished: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
        }
    }
}

// ── Notifications ──────────────────────────────────────────────────

/// Sent when tool calls are detected, before any of them runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolNotification {
    pub session_id: String,
    pub tool_names: Vec<String>,
    pub tool_args: Vec<Value>,
}

/// Fire-and-forget sender for [`ToolNotification`]s.
pub type NotificationSender = UnboundedSender<ToolNotification>;

// ── Turn outcome ───────────────────────────────────────────────────

/// The result of one [`Turn`](super::orchestrator::Turn).
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    /// The user-facing answer: direct text, the streamed response, or the
    /// error utterance.
    pub text: String,
    /// Results of every tool call that ran, in backend order.
    pub tool_results: Vec<ToolInvocationResult>,
    pub cancelled: bool,
    /// Set when the turn ended on an inference failure.
    pub inference_error: Option<String>,
}

impl TurnOutcome {
    pub fn used_tools(&self) -> bool {
        !self.tool_results.is_empty()
    }

    pub fn is_error(&self) -> bool {
        self.inference_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn notification_uses_camel_case_keys() {
        let n = ToolNotification {
            session_id: "s".into(),
            tool_names: vec!["weather".into()],
            tool_args: vec![json!({"city": "Oslo"})],
        };
        let v = serde_json::to_value(n).unwrap();
        assert_eq!(v["toolNames"], json!(["weather"]));
        assert_eq!(v["toolArgs"][0]["city"], "Oslo");
    }

    #[test]
    fn composite_dispatches_to_all() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::clone(&seen);
        let b = Arc::clone(&seen);
        let handler = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |e| {
                if let TurnEvent::TextDelta(t) = e {
                    a.lock().unwrap().push(format!("a:{t}"));
                }
            }))
            .with_if(false, NoopHandler)
            .with(FnEventHandler::new(move |e| {
                if let TurnEvent::TextDelta(t) = e {
                    b.lock().unwrap().push(format!("b:{t}"));
                }
            }));
        handler.on_event(&TurnEvent::TextDelta("hi"));
        assert_eq!(*seen.lock().unwrap(), vec!["a:hi", "b:hi"]);
    }
}
