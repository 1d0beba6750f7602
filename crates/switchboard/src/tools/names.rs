//! Tool-name namespacing.
//!
//! Protocol tools are exposed to the model as `{source_id}__{remote_name}`.
//! The separator is reserved: source ids may not contain it, and the router
//! splits on its first occurrence, so everything after it is forwarded to
//! the remote server verbatim.

/// Reserved separator between a protocol source id and a remote tool name.
pub const SEPARATOR: &str = "__";

/// Maximum tool-name length accepted by function-calling APIs.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Join a source id and a remote tool name.
pub fn qualify(source_id: &str, tool_name: &str) -> String {
    format!("{source_id}{SEPARATOR}{tool_name}")
}

/// Split a qualified name into `(source_id, remote_name)`.
///
/// Returns `None` for bare names. A leading separator (empty source id) or a
/// trailing one (empty remote name) is not a qualified name either.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    let (source, tool) = name.split_once(SEPARATOR)?;
    if source.is_empty() || tool.is_empty() {
        return None;
    }
    Some((source, tool))
}

/// Make an arbitrary label usable as a tool name: ASCII alphanumerics, `_`
/// and `-` only, no reserved separator, at most [`MAX_TOOL_NAME_LEN`] chars.
///
/// Automation names are user-authored ("Turn on porch light"), so they go
/// through here before being offered to the model.
pub fn sanitize_tool_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        // Never emit two underscores in a row: that would be the separator.
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches('_');
    let mut name: String = trimmed.chars().take(MAX_TOOL_NAME_LEN).collect();
    while name.ends_with('_') {
        name.pop();
    }
    if name.is_empty() {
        "unnamed".to_string()
    } else {
        name
    }
}
