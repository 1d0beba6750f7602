//! The two-phase turn loop.
//!
//! Each user utterance is one [`Turn`]:
//!
//! 1. **Detect**: a non-streaming inference call with the session's catalog
//!    attached. Direct text ends the turn.
//! 2. Tool calls are announced (event + [`ToolNotification`]), then run
//!    through the [`Router`] in backend order.
//! 3. **Respond**: a streaming call without tools over the same messages
//!    plus the tool results. Chunks reach the caller as
//!    [`TurnEvent::TextDelta`].
//!
//! Inference failures end the turn with the configured error utterance and
//! are never retried. Tool failures are folded into the tool-result
//! messages and the turn continues.

use crate::Message;
use crate::agent::catalog::{Catalog, DiscoveryAggregator};
use crate::agent::config::{ExecutionOrder, OrchestratorConfig};
use crate::agent::events::{
    EventHandler, NoopHandler, NotificationSender, Phase, ToolNotification, TurnEvent,
    TurnOutcome,
};
use crate::agent::router::Router;
use crate::agent::session::Session;
use crate::api::backend::{Detection, InferenceBackend};
use crate::context::ContextBuilder;
use crate::sources::SourceSet;
use crate::tools::invocation::{ToolInvocationRequest, ToolInvocationResult};
use futures::StreamExt;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

type StopCheck<'s> = &'s (dyn Fn() -> bool + Sync);

/// Long-lived orchestrator shared by every session.
pub struct Orchestrator {
    backend: Arc<dyn InferenceBackend>,
    aggregator: DiscoveryAggregator,
    router: Router,
    config: OrchestratorConfig,
    notifier: Option<NotificationSender>,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        sources: Arc<SourceSet>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            aggregator: DiscoveryAggregator::new(Arc::clone(&sources)),
            router: Router::new(sources),
            config,
            notifier: None,
        }
    }

    /// Push a [`ToolNotification`] onto `sender` whenever tool calls are
    /// detected. Sending never blocks; a dropped receiver is ignored.
    pub fn with_notifier(mut self, sender: NotificationSender) -> Self {
        self.notifier = Some(sender);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// A new session sized by this orchestrator's config.
    pub fn session(&self, id: impl Into<String>) -> Session {
        Session::with_tool_data_capacity(id, self.config.tool_data_capacity)
    }

    /// The session's catalog, discovering it on first use.
    pub async fn catalog(&self, session: &Session) -> Arc<Catalog> {
        self.aggregator.discover(session).await
    }

    /// Start configuring a turn for `session`.
    pub fn turn<'a>(&'a self, session: &'a mut Session) -> Turn<'a> {
        Turn {
            orchestrator: self,
            session,
            event_handler: &NoopHandler,
            stop_signal: None,
        }
    }

    /// Run one turn with no event handler and no stop signal.
    pub async fn run_turn(&self, session: &mut Session, user_text: &str) -> TurnOutcome {
        self.turn(session).run(user_text).await
    }

    fn notify(
        &self,
        session_id: &str,
        requests: &[ToolInvocationRequest],
        events: &dyn EventHandler,
    ) {
        let names: Vec<String> = requests.iter().map(|r| r.tool_name.clone()).collect();
        let arguments: Vec<Value> = requests.iter().map(|r| r.arguments.clone()).collect();
        events.on_event(&TurnEvent::ToolsDetected {
            names: &names,
            arguments: &arguments,
        });
        if let Some(ref tx) = self.notifier {
            let note = ToolNotification {
                session_id: session_id.to_string(),
                tool_names: names,
                tool_args: arguments,
            };
            if tx.send(note).is_err() {
                debug!("Tool notification receiver dropped");
            }
        }
    }

    /// Run every request. Returns the accepted results in backend order and
    /// whether the turn was cancelled meanwhile.
    async fn execute(
        &self,
        catalog: &Catalog,
        requests: &[ToolInvocationRequest],
        events: &dyn EventHandler,
        stopped: StopCheck<'_>,
    ) -> (Vec<ToolInvocationResult>, bool) {
        match self.config.execution_order {
            ExecutionOrder::Sequential => {
                let mut results = Vec::with_capacity(requests.len());
                for request in requests {
                    if stopped() {
                        return (results, true);
                    }
                    announce(events, request);
                    let result = self.router.route(catalog, request).await;
                    if stopped() {
                        discard(events, &result);
                        return (results, true);
                    }
                    report(events, &result);
                    results.push(result);
                }
                (results, false)
            }
            ExecutionOrder::Concurrent => {
                if stopped() {
                    return (Vec::new(), true);
                }
                for request in requests {
                    announce(events, request);
                }
                let results =
                    join_all(requests.iter().map(|r| self.router.route(catalog, r))).await;
                if stopped() {
                    results.iter().for_each(|r| discard(events, r));
                    return (Vec::new(), true);
                }
                results.iter().for_each(|r| report(events, r));
                (results, false)
            }
        }
    }
}

/// One turn, configured with builder methods and consumed by
/// [`run`](Turn::run).
///
/// ```ignore
/// let outcome = orchestrator
///     .turn(&mut session)
///     .with_event_handler(&speaker)
///     .with_stop_signal(|| barge_in.load(Ordering::Relaxed))
///     .run("what's the weather tomorrow?")
///     .await;
/// ```
pub struct Turn<'a> {
    orchestrator: &'a Orchestrator,
    session: &'a mut Session,
    event_handler: &'a dyn EventHandler,
    stop_signal: Option<Box<dyn Fn() -> bool + Send + Sync + 'a>>,
}

impl<'a> Turn<'a> {
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Attach a stop signal. It is checked before each phase, around every
    /// tool call and between streamed chunks. Once it returns `true`, output
    /// stops and results of tools still running are discarded.
    pub fn with_stop_signal(mut self, signal: impl Fn() -> bool + Send + Sync + 'a) -> Self {
        self.stop_signal = Some(Box::new(signal));
        self
    }

    pub async fn run(self, user_text: &str) -> TurnOutcome {
        let Turn {
            orchestrator: orch,
            session,
            event_handler: events,
            stop_signal,
        } = self;
        let stopped = || stop_signal.as_ref().is_some_and(|s| s());
        let config = &orch.config;
        let start = Instant::now();
        let mut outcome = TurnOutcome::default();

        let catalog = orch.aggregator.discover(session).await;
        events.on_event(&TurnEvent::TurnStart {
            session_id: session.id(),
            catalog_size: catalog.len(),
        });
        info!(
            "[{}] turn {} started: {}",
            session.id(),
            session.exchange_count() + 1,
            preview(user_text)
        );

        session.push(Message::user(user_text));
        let mut messages = ContextBuilder::new(&config.system_prompt)
            .with_history_window(config.history_window)
            .with_tool_data(session.with_tool_data(|cache| cache.render()))
            .build(session.history());

        if stopped() {
            return cancelled(events, outcome);
        }

        // ── Detect ──
        let tool_defs = catalog.tool_defs();
        debug!(
            "Detect: {} messages, {} tools",
            messages.len(),
            tool_defs.len()
        );
        let detection = match orch.backend.detect(&tool_defs, &messages).await {
            Ok(d) => d,
            Err(e) => return fail(config, session, events, Phase::Detect, e, outcome),
        };

        let (calls, preamble) = match detection {
            Detection::Text(text) => {
                if stopped() {
                    return cancelled(events, outcome);
                }
                events.on_event(&TurnEvent::TextDelta(&text));
                session.push(Message::assistant_text(&text));
                events.on_event(&TurnEvent::Finished { text: &text });
                info!(
                    "[{}] answered directly in {:.0}ms",
                    session.id(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                outcome.text = text;
                return outcome;
            }
            Detection::ToolCalls { calls, text } => (calls, text),
        };

        // ── Tools ──
        let requests: Vec<ToolInvocationRequest> = calls
            .iter()
            .map(ToolInvocationRequest::from_tool_call)
            .collect();
        orch.notify(session.id(), &requests, events);

        let mut assistant = Message::assistant_tool_calls(calls);
        assistant.content = preamble;
        let rollback_len = session.history().len();
        session.push(assistant.clone());
        messages.push(assistant);

        let (results, was_stopped) = orch.execute(&catalog, &requests, events, &stopped).await;
        if was_stopped {
            // An unanswered tool-call message would poison the next request.
            session.truncate_history(rollback_len);
            return cancelled(events, outcome);
        }

        for result in &results {
            session.with_tool_data(|cache| cache.record_result(result));
            let message = result.to_message(config.max_result_bytes);
            session.push(message.clone());
            messages.push(message);
        }
        outcome.tool_results = results;

        // ── Respond ──
        debug!("Respond: {} messages", messages.len());
        let mut stream = match orch.backend.respond(&messages).await {
            Ok(s) => s,
            Err(e) => return fail(config, session, events, Phase::Respond, e, outcome),
        };

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            if stopped() {
                outcome.cancelled = true;
                break;
            }
            match chunk {
                Ok(delta) if delta.is_empty() => {}
                Ok(delta) => {
                    events.on_event(&TurnEvent::TextDelta(&delta));
                    text.push_str(&delta);
                }
                Err(e) if text.is_empty() => {
                    return fail(config, session, events, Phase::Respond, e, outcome);
                }
                Err(e) => {
                    warn!("Response stream ended early after {} bytes: {e}", text.len());
                    break;
                }
            }
        }
        drop(stream);

        if outcome.cancelled {
            if !text.is_empty() {
                session.push(Message::assistant_text(&text));
            }
            outcome.text = text;
            return cancelled(events, outcome);
        }
        if text.is_empty() {
            return fail(
                config,
                session,
                events,
                Phase::Respond,
                "response stream produced no text".into(),
                outcome,
            );
        }

        session.push(Message::assistant_text(&text));
        events.on_event(&TurnEvent::Finished { text: &text });
        info!(
            "[{}] turn finished in {:.0}ms ({} tool call(s))",
            session.id(),
            start.elapsed().as_secs_f64() * 1000.0,
            outcome.tool_results.len()
        );
        outcome.text = text;
        outcome
    }
}

fn announce(events: &dyn EventHandler, request: &ToolInvocationRequest) {
    events.on_event(&TurnEvent::ToolExecuting {
        name: &request.tool_name,
        call_id: &request.call_id,
        arguments: &request.arguments,
    });
}

fn report(events: &dyn EventHandler, result: &ToolInvocationResult) {
    events.on_event(&TurnEvent::ToolResult {
        name: &result.tool_name,
        call_id: &result.call_id,
        result,
    });
}

fn discard(events: &dyn EventHandler, result: &ToolInvocationResult) {
    events.on_event(&TurnEvent::ToolResultDiscarded {
        name: &result.tool_name,
        call_id: &result.call_id,
    });
}

fn cancelled(events: &dyn EventHandler, mut outcome: TurnOutcome) -> TurnOutcome {
    events.on_event(&TurnEvent::Cancelled);
    outcome.cancelled = true;
    outcome
}

/// End the turn with the error utterance.
fn fail(
    config: &OrchestratorConfig,
    session: &mut Session,
    events: &dyn EventHandler,
    phase: Phase,
    error: String,
    mut outcome: TurnOutcome,
) -> TurnOutcome {
    events.on_event(&TurnEvent::InferenceError {
        phase,
        error: &error,
    });
    let utterance = config.error_utterance.clone();
    events.on_event(&TurnEvent::TextDelta(&utterance));
    session.push(Message::assistant_text(&utterance));
    events.on_event(&TurnEvent::Finished { text: &utterance });
    outcome.text = utterance;
    outcome.inference_error = Some(error);
    outcome
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        format!("{head}...")
    } else {
        head
    }
}
