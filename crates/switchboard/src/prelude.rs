//! Convenience re-exports for common `switchboard` types.
//!
//! ```ignore
//! use switchboard::prelude::*;
//! ```
//!
//! Covers the inference client, message types, the orchestrator and its
//! sessions, event handlers, local tools and configuration. Source adapters
//! and wire-level types stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{InferenceClient, Message, MessageRole, ToolCall, ToolDef, json_schema_for};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Catalog, CompositeEventHandler, EventHandler, ExecutionOrder, FnEventHandler, LoggingHandler,
    NoopHandler, Orchestrator, OrchestratorConfig, Session, SessionHandle, ToolNotification,
    TurnEvent, TurnOutcome,
};
pub use crate::api::{Detection, InferenceBackend};

// ── Tools and sources ───────────────────────────────────────────────
pub use crate::sources::{SourceError, SourceSet};
pub use crate::tools::{
    FnTool, LocalSource, Tool, ToolDescriptor, ToolInvocationRequest, ToolInvocationResult,
};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::config::SwitchboardConfig;
