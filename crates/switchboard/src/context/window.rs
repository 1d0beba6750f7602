//! Sliding window over durable session history.
//!
//! History is grouped into exchanges: a user message plus every assistant,
//! tool-call and tool-result message that follows it up to the next user
//! message. An exchange is complete once a plain assistant answer (one
//! without tool calls) follows its user message. The window keeps the most
//! recent N complete exchanges plus the exchange in progress, and always
//! starts on a user message, so tool results are never separated from the
//! call that produced them.

use crate::{Message, MessageRole};

/// Default number of exchanges sent to the model.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// The suffix of `history` covering the last `exchanges` complete exchanges
/// and the one in progress, if any.
///
/// Messages before the first user message (if any) belong to no exchange
/// and are only included when the whole history fits. A window of zero
/// still keeps the latest exchange.
pub fn window(history: &[Message], exchanges: usize) -> &[Message] {
    let wanted = (exchanges + usize::from(in_progress(history))).max(1);
    let mut seen = 0;
    for (i, msg) in history.iter().enumerate().rev() {
        if msg.role == MessageRole::User {
            seen += 1;
            if seen == wanted {
                return history.get(i..).unwrap_or_default();
            }
        }
    }
    history
}

/// Whether the last exchange still awaits its final answer.
fn in_progress(history: &[Message]) -> bool {
    let Some(start) = history.iter().rposition(|m| m.role == MessageRole::User) else {
        return false;
    };
    !history.iter().skip(start + 1).any(|m| {
        m.role == MessageRole::Assistant && m.tool_calls.as_ref().is_none_or(Vec::is_empty)
    })
}

/// Number of exchanges in `history`.
pub fn exchange_count(history: &[Message]) -> usize {
    history
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;

    fn exchange(i: usize, with_tool: bool) -> Vec<Message> {
        let mut out = vec![Message::user(format!("q{i}"))];
        if with_tool {
            let id = format!("c{i}");
            out.push(Message::assistant_tool_calls(vec![ToolCall::new(
                &id, "weather", "{}",
            )]));
            out.push(Message::tool_result(&id, "{}"));
        }
        out.push(Message::assistant_text(format!("a{i}")));
        out
    }

    fn history(n: usize) -> Vec<Message> {
        (1..=n).flat_map(|i| exchange(i, i % 2 == 0)).collect()
    }

    #[test]
    fn keeps_last_n_exchanges() {
        let h = history(25);
        let w = window(&h, 20);
        assert_eq!(exchange_count(w), 20);
        assert_eq!(w[0].content.as_deref(), Some("q6"));
        assert_eq!(w.last().and_then(|m| m.content.as_deref()), Some("a25"));
    }

    #[test]
    fn short_history_is_returned_whole() {
        let h = history(3);
        assert_eq!(window(&h, 20).len(), h.len());
    }

    #[test]
    fn window_starts_on_a_user_message() {
        let h = history(6);
        for n in 1..=6 {
            assert_eq!(window(&h, n)[0].role, MessageRole::User);
        }
    }

    #[test]
    fn exchange_in_progress_rides_on_top_of_the_window() {
        let mut h = history(25);
        h.push(Message::user("q26"));
        let w = window(&h, 20);
        assert_eq!(exchange_count(w), 21);
        assert_eq!(w[0].content.as_deref(), Some("q6"));

        // tool round-trip without a final answer is still in progress
        h.push(Message::assistant_tool_calls(vec![ToolCall::new(
            "c26", "weather", "{}",
        )]));
        h.push(Message::tool_result("c26", "{}"));
        let w = window(&h, 20);
        assert_eq!(exchange_count(w), 21);
        assert_eq!(w[0].content.as_deref(), Some("q6"));
    }

    #[test]
    fn zero_window_keeps_current_exchange() {
        let mut h = history(4);
        h.push(Message::user("now"));
        let w = window(&h, 0);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].content.as_deref(), Some("now"));
    }
}
