//! The inference backend contract used by the two-phase orchestrator.
//!
//! The backend is a black box with two calls:
//!
//! - [`detect`](InferenceBackend::detect): non-streaming, with tool schemas
//!   attached. Returns either direct text or the tool calls the model wants.
//! - [`respond`](InferenceBackend::respond): streaming, without tools.
//!   Returns a [`TextStream`] of answer chunks.
//!
//! [`InferenceClient`] implements the contract against an OpenAI-compatible
//! HTTP endpoint. Tests plug in scripted implementations.

use crate::api::streaming::TextStream;
use crate::{ChatCompletion, InferenceClient, Message, ToolCall, ToolDef};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`InferenceBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// Outcome of the Detect phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// The model answered directly. This is the final answer for the turn.
    Text(String),
    /// The model wants one or more tools run, in this order.
    ToolCalls {
        calls: Vec<ToolCall>,
        /// Any preamble text the model produced alongside the calls.
        text: Option<String>,
    },
}

impl Detection {
    /// Classify a completed (non-streaming) response.
    ///
    /// A response with neither text nor tool calls is malformed and reported
    /// as an error so the turn ends with the error utterance.
    pub fn from_completion(completion: ChatCompletion) -> Result<Self, String> {
        let text = completion.content.filter(|t| !t.trim().is_empty());
        if !completion.tool_calls.is_empty() {
            return Ok(Detection::ToolCalls {
                calls: completion.tool_calls,
                text,
            });
        }
        match text {
            Some(text) => Ok(Detection::Text(text)),
            None => Err("inference response had neither text nor tool calls".into()),
        }
    }
}

/// A language-model backend usable by the orchestrator.
///
/// Uses boxed futures so the trait is dyn-compatible and can be shared as
/// `Arc<dyn InferenceBackend>` across sessions.
pub trait InferenceBackend: Send + Sync {
    /// Non-streaming call with the catalog's tool schemas attached.
    fn detect<'a>(
        &'a self,
        tools: &'a [ToolDef],
        messages: &'a [Message],
    ) -> BackendFuture<'a, Detection>;

    /// Streaming call without tools.
    fn respond<'a>(&'a self, messages: &'a [Message]) -> BackendFuture<'a, TextStream>;
}

impl InferenceBackend for InferenceClient {
    fn detect<'a>(
        &'a self,
        tools: &'a [ToolDef],
        messages: &'a [Message],
    ) -> BackendFuture<'a, Detection> {
        Box::pin(async move {
            let tools = if tools.is_empty() {
                None
            } else {
                Some(tools.to_vec())
            };
            let body = self.request(messages.to_vec(), tools);
            let completion = self.chat(&body).await?;
            Detection::from_completion(completion)
        })
    }

    fn respond<'a>(&'a self, messages: &'a [Message]) -> BackendFuture<'a, TextStream> {
        Box::pin(async move {
            let body = self.request(messages.to_vec(), None);
            self.chat_stream(&body).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(content: Option<&str>, calls: Vec<ToolCall>) -> ChatCompletion {
        ChatCompletion {
            content: content.map(String::from),
            tool_calls: calls,
            usage: None,
            finish_reason: None,
        }
    }

    #[test]
    fn text_only_is_final_answer() {
        let d = Detection::from_completion(completion(Some("It is sunny."), vec![])).unwrap();
        assert_eq!(d, Detection::Text("It is sunny.".into()));
    }

    #[test]
    fn tool_calls_take_precedence_over_text() {
        let call = ToolCall::new("c1", "weather", "{}");
        let d = Detection::from_completion(completion(Some("Checking..."), vec![call.clone()]))
            .unwrap();
        assert_eq!(
            d,
            Detection::ToolCalls {
                calls: vec![call],
                text: Some("Checking...".into())
            }
        );
    }

    #[test]
    fn empty_response_is_malformed() {
        assert!(Detection::from_completion(completion(None, vec![])).is_err());
        assert!(Detection::from_completion(completion(Some("  "), vec![])).is_err());
    }
}
