//! Tool data cache: a small FIFO of recent structured tool outputs.
//!
//! The cache lives beside the visible history, not in it. It is rendered
//! into one synthetic system message on every turn so facts fetched by a
//! tool stay answerable after the exchange that fetched them has slid out
//! of the history window.

use crate::Message;
use crate::tools::invocation::ToolInvocationResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Default number of entries kept.
pub const DEFAULT_TOOL_DATA_CAPACITY: usize = 3;

/// One remembered tool output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDataEntry {
    pub tool_name: String,
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded FIFO of structured tool outputs. `len() <= capacity()` always
/// holds; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ToolDataCache {
    entries: VecDeque<ToolDataEntry>,
    capacity: usize,
}

impl ToolDataCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert an entry, evicting from the front while over capacity.
    pub fn record(&mut self, tool_name: impl Into<String>, data: Map<String, Value>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_back(ToolDataEntry {
            tool_name: tool_name.into(),
            data,
            timestamp: Utc::now(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Record a result if it is a successful JSON object. Returns whether an
    /// entry was added.
    pub fn record_result(&mut self, result: &ToolInvocationResult) -> bool {
        match result.structured_data() {
            Some(data) if self.capacity > 0 => {
                self.record(&result.tool_name, data.clone());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ToolDataEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render as a single system message, or `None` when empty.
    pub fn render(&self) -> Option<Message> {
        if self.entries.is_empty() {
            return None;
        }
        let mut text = String::from(
            "Data returned by recent tool calls (oldest first). \
             Use it to answer follow-up questions:\n",
        );
        for entry in &self.entries {
            let data = serde_json::to_string(&entry.data).unwrap_or_default();
            text.push_str(&format!(
                "\n[{}] at {}\n{data}\n",
                entry.tool_name,
                entry.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        Some(Message::system(text))
    }
}

impl Default for ToolDataCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_DATA_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn fourth_entry_evicts_the_oldest() {
        let mut cache = ToolDataCache::new(3);
        for i in 1..=4 {
            cache.record(format!("tool_{i}"), obj(json!({"n": i})));
        }
        assert_eq!(cache.len(), 3);
        let names: Vec<&str> = cache.entries().map(|e| e.tool_name.as_str()).collect();
        assert_eq!(names, vec!["tool_2", "tool_3", "tool_4"]);
    }

    #[test]
    fn only_structured_successes_are_recorded() {
        let mut cache = ToolDataCache::default();
        assert!(cache.record_result(&ToolInvocationResult::success(
            "c",
            "weather",
            json!({"temp": 18})
        )));
        assert!(!cache.record_result(&ToolInvocationResult::success("c", "say", json!("hi"))));
        assert!(!cache.record_result(&ToolInvocationResult::failure("c", "x", "boom")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = ToolDataCache::new(0);
        cache.record("t", obj(json!({"a": 1})));
        assert!(cache.is_empty());
        assert!(cache.render().is_none());
    }

    #[test]
    fn render_lists_every_entry() {
        let mut cache = ToolDataCache::default();
        assert!(cache.render().is_none());
        cache.record("weather", obj(json!({"city": "Oslo", "temp": 4})));
        cache.record("calendar", obj(json!({"next": "standup"})));
        let msg = cache.render().unwrap();
        let text = msg.content.unwrap();
        assert_eq!(msg.role, crate::MessageRole::System);
        assert!(text.contains("[weather]"));
        assert!(text.contains(r#""city":"Oslo""#));
        assert!(text.find("[weather]") < text.find("[calendar]"));
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = ToolDataCache::default();
        cache.record("t", obj(json!({"a": 1})));
        cache.clear();
        assert!(cache.is_empty());
    }
}
