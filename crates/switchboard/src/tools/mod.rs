//! Tool model: descriptors, invocation types, local tools and the tool data
//! cache.
//!
//! # Submodules
//!
//! - [`descriptor`]: [`ToolDescriptor`] and the canonical [`ParameterSchema`].
//! - [`names`]: the reserved `__` separator and tool-name sanitizing.
//! - [`invocation`]: [`ToolInvocationRequest`] / [`ToolInvocationResult`].
//! - [`core`]: the [`Tool`] trait, [`FnTool`] and the [`LocalSource`] registry.
//! - [`cache`]: [`ToolDataCache`], the FIFO of recent structured outputs.

pub mod cache;
pub mod core;
pub mod descriptor;
pub mod invocation;
pub mod names;

pub use cache::{DEFAULT_TOOL_DATA_CAPACITY, ToolDataCache, ToolDataEntry};
pub use core::{
    DEFAULT_MAX_RESULT_BYTES, DEFAULT_TOOL_TIMEOUT, FnTool, LocalSource, Tool, ToolFuture,
    parse_tool_args, truncate_result, validate_tool_arguments,
};
pub use descriptor::{ParamSpec, ParamType, ParameterSchema, SourceKind, ToolDescriptor};
pub use invocation::{ToolInvocationRequest, ToolInvocationResult};
pub use names::{SEPARATOR, qualify, sanitize_tool_name, split_qualified};
