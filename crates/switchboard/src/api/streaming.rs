//! Server-Sent Events (SSE) streaming for the chat completions API.
//!
//! Provides [`StreamEvent`], the incremental [`SseDecoder`], and
//! [`InferenceClient::chat_stream`], which turns a streaming HTTP response
//! into a [`TextStream`] of answer chunks that the orchestrator forwards to
//! the caller as they arrive.

use crate::{ChatRequest, InferenceClient, UsageInfo};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// A stream of answer text chunks. An `Err` item ends the stream.
pub type TextStream = BoxStream<'static, Result<String, String>>;

/// A single event decoded from an SSE stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// Token usage information (sent in the final chunk).
    Usage { prompt_tokens: u32, completion_tokens: u32 },
    /// The stream is complete.
    Done,
    /// The server reported an error mid-stream.
    Error(String),
}

/// Raw SSE data chunk.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
    error: Option<StreamError>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamError {
    message: String,
}

/// Incremental decoder for `data:` lines of an SSE body.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, pushing every event from completed lines into `out`.
    pub fn push(&mut self, bytes: &[u8], out: &mut VecDeque<StreamEvent>) {
        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            decode_line(&String::from_utf8_lossy(&line), out);
        }
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self, out: &mut VecDeque<StreamEvent>) {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            decode_line(&String::from_utf8_lossy(&rest), out);
        }
    }
}

fn decode_line(line: &str, out: &mut VecDeque<StreamEvent>) {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        out.push_back(StreamEvent::Done);
        return;
    }
    parse_sse_data(data, out);
}

/// Parse a single SSE `data:` payload into stream events.
fn parse_sse_data(data: &str, out: &mut VecDeque<StreamEvent>) {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e} (data: {data})");
            return;
        }
    };

    if let Some(err) = chunk.error {
        out.push_back(StreamEvent::Error(err.message));
        return;
    }

    for choice in chunk.choices.unwrap_or_default() {
        if let Some(content) = choice.delta.and_then(|d| d.content)
            && !content.is_empty()
        {
            out.push_back(StreamEvent::TextDelta(content));
        }
        if choice.finish_reason.is_some() {
            trace!("Stream finish_reason: {:?}", choice.finish_reason);
        }
    }

    if let Some(usage) = chunk.usage {
        out.push_back(StreamEvent::Usage {
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
        });
    }
}

impl InferenceClient {
    /// Send a chat completion request with SSE streaming and return the
    /// answer as a [`TextStream`].
    ///
    /// Tool definitions are stripped from the body: the streaming call only
    /// ever produces text. Chunks are read off the wire lazily as the stream
    /// is polled, so dropping the stream stops reading.
    pub async fn chat_stream(&self, body: &ChatRequest) -> Result<TextStream, String> {
        let mut body = body.clone();
        body.stream = true;
        body.tools = None;

        debug!(
            "Sending streaming inference request ({} messages)",
            body.messages.len()
        );

        let resp = self
            .post(&body)
            .send()
            .await
            .map_err(|e| format!("streaming request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("inference API HTTP {status}: {text}"));
        }

        Ok(sse_text_stream(resp))
    }
}

struct SseState {
    resp: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

fn sse_text_stream(resp: reqwest::Response) -> TextStream {
    let state = SseState {
        resp,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                match event {
                    StreamEvent::TextDelta(text) => return Some((Ok(text), st)),
                    StreamEvent::Error(e) => {
                        st.finished = true;
                        st.pending.clear();
                        return Some((Err(format!("inference stream error: {e}")), st));
                    }
                    StreamEvent::Done => {
                        debug!("Inference stream completed");
                        return None;
                    }
                    StreamEvent::Usage {
                        prompt_tokens,
                        completion_tokens,
                    } => {
                        debug!(
                            "Token usage: prompt={prompt_tokens}, completion={completion_tokens}"
                        );
                        continue;
                    }
                }
            }
            if st.finished {
                return None;
            }
            match st.resp.chunk().await {
                Ok(Some(bytes)) => st.decoder.push(&bytes, &mut st.pending),
                Ok(None) => {
                    st.decoder.finish(&mut st.pending);
                    st.finished = true;
                }
                Err(e) => {
                    st.finished = true;
                    return Some((Err(format!("failed to read streaming chunk: {e}")), st));
                }
            }
        }
    })
    .boxed()
}

/// Assemble the complete text from a sequence of stream events.
pub fn collect_text<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(delta);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut decoder = SseDecoder::new();
        let mut out = VecDeque::new();
        for chunk in chunks {
            decoder.push(chunk, &mut out);
        }
        decoder.finish(&mut out);
        out.into_iter().collect()
    }

    fn decode_lines(chunks: &[&str]) -> Vec<StreamEvent> {
        let bytes: Vec<&[u8]> = chunks.iter().map(|c| c.as_bytes()).collect();
        decode_all(&bytes)
    }

    #[test]
    fn decodes_text_deltas_and_done() {
        let events = decode_lines(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"world\"}}]}\n\ndata: [DONE]\n",
        ]);
        assert_eq!(collect_text(&events), "Hello world");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn line_split_across_chunks() {
        let events = decode_lines(&[
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"split\"}}]}\n",
        ]);
        assert_eq!(events, vec![StreamEvent::TextDelta("split".into())]);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('\u{e9}').unwrap() + 1;
        let events = decode_all(&[&bytes[..split], &bytes[split..]]);
        assert_eq!(collect_text(&events), "caf\u{e9}");
    }

    #[test]
    fn comments_and_garbage_are_skipped() {
        let events = decode_lines(&[": keep-alive\n", "data: not-json\n", "event: ping\n"]);
        assert!(events.is_empty());
    }

    #[test]
    fn error_chunk_becomes_error_event() {
        let events = decode_lines(&["data: {\"error\":{\"message\":\"overloaded\"}}\n"]);
        assert_eq!(events, vec![StreamEvent::Error("overloaded".into())]);
    }

    #[test]
    fn usage_chunk_is_reported() {
        let events = decode_lines(&[
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5}}\n",
        ]);
        assert_eq!(
            events,
            vec![StreamEvent::Usage {
                prompt_tokens: 10,
                completion_tokens: 5
            }]
        );
    }

    #[test]
    fn unterminated_final_line_is_flushed() {
        let events = decode_lines(&["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]);
        assert_eq!(collect_text(&events), "tail");
    }
}
