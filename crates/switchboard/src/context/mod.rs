//! Per-turn context assembly.
//!
//! Every model call sees the same three-part layout:
//!
//! 1. **System instructions**: fixed for the process.
//! 2. **Tool data**: the [`ToolDataCache`](crate::tools::ToolDataCache)
//!    rendered as one synthetic system message. Rebuilt every turn and never
//!    written to durable history.
//! 3. **Recent history**: a [`window`] of the last N exchanges.
//!
//! Older history stays in the session; it is only left out of the call.

pub mod window;

pub use window::{DEFAULT_HISTORY_WINDOW, exchange_count};

use crate::Message;

/// Builds the message list for a Detect call.
#[derive(Debug, Clone)]
pub struct ContextBuilder<'a> {
    system_prompt: &'a str,
    history_window: usize,
    tool_data: Option<Message>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(system_prompt: &'a str) -> Self {
        Self {
            system_prompt,
            history_window: DEFAULT_HISTORY_WINDOW,
            tool_data: None,
        }
    }

    pub fn with_history_window(mut self, exchanges: usize) -> Self {
        self.history_window = exchanges;
        self
    }

    /// The rendered tool data message, if the cache is non-empty.
    pub fn with_tool_data(mut self, message: Option<Message>) -> Self {
        self.tool_data = message;
        self
    }

    pub fn build(&self, history: &[Message]) -> Vec<Message> {
        let recent = window::window(history, self.history_window);
        let mut messages = Vec::with_capacity(recent.len() + 2);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(self.system_prompt));
        }
        if let Some(ref data) = self.tool_data {
            messages.push(data.clone());
        }
        messages.extend_from_slice(recent);
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;

    #[test]
    fn layout_is_system_then_tool_data_then_history() {
        let history = vec![Message::user("hi"), Message::assistant_text("hello")];
        let msgs = ContextBuilder::new("You are a home assistant.")
            .with_tool_data(Some(Message::system("tool data")))
            .build(&history);
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].content.as_deref(), Some("You are a home assistant."));
        assert_eq!(msgs[1].content.as_deref(), Some("tool data"));
        assert_eq!(msgs[2].role, MessageRole::User);
    }

    #[test]
    fn empty_parts_are_omitted() {
        let history = vec![Message::user("hi")];
        let msgs = ContextBuilder::new("").build(&history);
        assert_eq!(msgs, history);
    }

    #[test]
    fn history_is_windowed() {
        let history: Vec<Message> = (0..10)
            .flat_map(|i| [Message::user(format!("q{i}")), Message::assistant_text("a")])
            .collect();
        let msgs = ContextBuilder::new("sys")
            .with_history_window(2)
            .build(&history);
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[1].content.as_deref(), Some("q8"));
    }
}
