use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::SessionError;
use crate::llm::{CompletionRequest, LlmProvider, Message, StreamChunk, ToolCall};
use crate::prompts::system_prompt;
use crate::result::TurnResult;
use crate::tools::{Dispatcher, EventEmitter, EventSink, ToolContext, ToolResult, UiEvent};

/// What the caller sees of a running turn, in order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Text { content: String },
    ToolCall { id: String, name: String, arguments: Value },
    ToolResult { id: String, name: String, result: Value },
    Event { name: String, payload: Value },
    Done { content: String },
    Error { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingModel,
    StreamingResponse,
    ExecutingTools,
    Finished,
    Failed,
}

/// Forwards tool side-channel events into the session stream.
struct SessionEventSink {
    tx: UnboundedSender<SessionEvent>,
}

impl EventSink for SessionEventSink {
    fn deliver(&self, event: UiEvent) -> Result<(), String> {
        self.tx
            .send(SessionEvent::Event {
                name: event.name,
                payload: event.payload,
            })
            .map_err(|_| "session event channel closed".to_string())
    }
}

pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    dispatcher: Dispatcher,
    config: AgentConfig,
    system_prompt: String,
}

impl Agent {
    pub fn new(provider: Arc<dyn LlmProvider>, dispatcher: Dispatcher, config: AgentConfig) -> Self {
        Self {
            provider,
            dispatcher,
            config,
            system_prompt: system_prompt(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs one user turn to completion.
    ///
    /// `history` must already end with the user's message. Text is forwarded
    /// through `events` as it streams; tool calls of a round run concurrently
    /// and their results are appended in call order. Cancelling `cancel`, or
    /// dropping the receiving end of `events`, stops the turn between chunks.
    pub async fn run_turn(
        &self,
        history: Vec<Message>,
        ctx: ToolContext,
        events: UnboundedSender<SessionEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnResult, SessionError> {
        let ctx = ctx.with_events(EventEmitter::new(Arc::new(SessionEventSink { tx: events.clone() })));
        let catalog = self.dispatcher.catalog();
        let start = history.len();
        let mut messages = history;
        let mut rounds = 0usize;
        let mut state = SessionState::AwaitingModel;

        loop {
            transition(&mut state, SessionState::AwaitingModel);
            let request = CompletionRequest {
                system: self.system_prompt.clone(),
                messages: messages.clone(),
                tools: catalog.clone(),
                model: Some(self.config.model.clone()),
                temperature: Some(self.config.temperature),
                max_tokens: Some(self.config.max_tokens),
                provider: Some(self.config.provider.clone()),
            };

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                opened = self.provider.stream_with_tools(request) => opened,
            };
            let mut stream = match opened {
                Ok(stream) => stream,
                Err(err) => {
                    transition(&mut state, SessionState::Failed);
                    return Err(fail(&events, SessionError::Provider(err.to_string())));
                }
            };

            transition(&mut state, SessionState::StreamingResponse);
            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                    chunk = stream.next() => chunk,
                };
                match chunk {
                    Some(StreamChunk::Text { content }) => {
                        text.push_str(&content);
                        send(&events, &cancel, SessionEvent::Text { content })?;
                    }
                    Some(StreamChunk::ToolCalls { calls: batch }) => calls.extend(batch),
                    Some(StreamChunk::Done) => break,
                    Some(StreamChunk::Error { content }) => {
                        transition(&mut state, SessionState::Failed);
                        return Err(fail(&events, SessionError::Provider(content)));
                    }
                    None => {
                        transition(&mut state, SessionState::Failed);
                        return Err(fail(
                            &events,
                            SessionError::Provider("stream ended without a done chunk".to_string()),
                        ));
                    }
                }
            }

            if calls.is_empty() {
                transition(&mut state, SessionState::Finished);
                messages.push(Message::assistant(text.clone(), Vec::new()));
                send(&events, &cancel, SessionEvent::Done { content: text.clone() })?;
                info!(tool_rounds = rounds, chars = text.len(), "turn finished");
                return Ok(TurnResult {
                    content: text,
                    messages: messages.split_off(start),
                    tool_rounds: rounds,
                });
            }

            if rounds >= self.config.max_tool_rounds {
                transition(&mut state, SessionState::Failed);
                warn!(limit = self.config.max_tool_rounds, "tool loop limit reached");
                return Err(fail(
                    &events,
                    SessionError::ToolLoopExceeded {
                        limit: self.config.max_tool_rounds,
                    },
                ));
            }
            rounds += 1;

            transition(&mut state, SessionState::ExecutingTools);
            messages.push(Message::assistant(text, calls.clone()));
            for call in &calls {
                send(
                    &events,
                    &cancel,
                    SessionEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                )?;
            }

            let results = self.execute_tools(&calls, &ctx, &cancel).await?;
            for (call, result) in calls.iter().zip(results) {
                let value = result.to_value();
                send(
                    &events,
                    &cancel,
                    SessionEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        result: value.clone(),
                    },
                )?;
                messages.push(Message::tool(call, &value));
            }
        }
    }

    /// Dispatches every call on its own task. Results come back in call
    /// order; on cancellation the tasks keep running but are abandoned.
    async fn execute_tools(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>, SessionError> {
        let handles: Vec<_> = calls
            .iter()
            .map(|call| {
                let dispatcher = self.dispatcher.clone();
                let ctx = ctx.clone();
                let call = call.clone();
                tokio::spawn(async move { dispatcher.dispatch(&call.name, &call.arguments, &ctx).await })
            })
            .collect();

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(pending = calls.len(), "turn cancelled; discarding tool results");
                return Err(SessionError::Cancelled);
            }
            joined = join_all(handles) => joined,
        };

        Ok(calls
            .iter()
            .zip(joined)
            .map(|(call, outcome)| {
                outcome.unwrap_or_else(|err| ToolResult::error(format!("tool {} failed: {}", call.name, err)))
            })
            .collect())
    }
}

fn transition(state: &mut SessionState, next: SessionState) {
    if *state != next {
        debug!(from = ?*state, to = ?next, "session state");
        *state = next;
    }
}

fn send(
    events: &UnboundedSender<SessionEvent>,
    cancel: &CancellationToken,
    event: SessionEvent,
) -> Result<(), SessionError> {
    events.send(event).map_err(|_| {
        cancel.cancel();
        SessionError::Cancelled
    })
}

fn fail(events: &UnboundedSender<SessionEvent>, err: SessionError) -> SessionError {
    let _ = events.send(SessionEvent::Error {
        message: err.to_string(),
    });
    err
}
