//! Helper structures for the chat stream service
//!
//! These group the state of one streaming turn so the main service code
//! reads as a sequence of steps.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;
use inference_providers::ToolCallDelta;
use serde_json::{json, Value};

use super::assembly::apply_event;
use super::errors::{ChatError, ToolError};
use super::models::{ChatId, FinishReason, Message, MessageId, Role, StreamEvent};
use crate::auth::AuthenticatedUser;
use crate::common::generate_id;
use crate::id_prefixes::PREFIX_CALL;

/// State of one streaming turn
pub struct ChatStreamContext {
    pub chat_id: ChatId,
    pub user: AuthenticatedUser,
    /// Messages as sent by the client, minus a continued assistant message
    history: Vec<Message>,
    /// The assistant message being produced
    pub assistant: Message,
    pub is_continuation: bool,
}

impl ChatStreamContext {
    /// Start a turn. When the last request message is from the assistant,
    /// the turn extends that message instead of opening a new one.
    pub fn new(chat_id: ChatId, user: AuthenticatedUser, mut messages: Vec<Message>) -> Self {
        let continued = match messages.last() {
            Some(last) if last.role == Role::Assistant => messages.pop(),
            _ => None,
        };
        let is_continuation = continued.is_some();
        let assistant = continued
            .unwrap_or_else(|| Message::new(MessageId::generate(), Role::Assistant, Vec::new()));

        Self {
            chat_id,
            user,
            history: messages,
            assistant,
            is_continuation,
        }
    }

    /// Record an emitted event on the assistant message
    pub fn record(&mut self, event: &StreamEvent) {
        if let Err(e) = apply_event(&mut self.assistant, event) {
            tracing::warn!(
                chat_id = %self.chat_id,
                message_id = %self.assistant.id,
                error = %e,
                "Ignoring out-of-order tool event"
            );
        }
    }

    /// Request messages followed by the assistant message of this turn
    pub fn into_messages(self) -> Vec<Message> {
        let mut messages = self.history;
        messages.push(self.assistant);
        messages
    }
}

/// Helper for emitting stream events
pub struct EventEmitter {
    tx: UnboundedSender<StreamEvent>,
}

impl EventEmitter {
    pub fn new(tx: UnboundedSender<StreamEvent>) -> Self {
        Self { tx }
    }

    /// True once the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Record the event on the turn and send it to the consumer. The event
    /// is recorded even when the consumer is gone so partial output can
    /// still be persisted.
    async fn send(
        &mut self,
        ctx: &mut ChatStreamContext,
        event: StreamEvent,
    ) -> Result<(), ChatError> {
        use futures::SinkExt;
        ctx.record(&event);
        self.tx
            .send(event)
            .await
            .map_err(|_e| ChatError::InternalError("Failed to send event".to_string()))
    }

    pub async fn emit_start(&mut self, ctx: &mut ChatStreamContext) -> Result<(), ChatError> {
        let message_id = ctx.assistant.id.clone();
        self.send(ctx, StreamEvent::Start { message_id }).await
    }

    pub async fn emit_start_step(&mut self, ctx: &mut ChatStreamContext) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::StartStep).await
    }

    pub async fn emit_text_delta(
        &mut self,
        ctx: &mut ChatStreamContext,
        delta: String,
    ) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::TextDelta { delta }).await
    }

    /// Emit smoothed text chunks, pausing `delay` after each one that was
    /// delivered. Every chunk is recorded; the first send error is returned.
    pub async fn emit_text_chunks(
        &mut self,
        ctx: &mut ChatStreamContext,
        chunks: Vec<String>,
        delay: Duration,
    ) -> Result<(), ChatError> {
        let mut result = Ok(());
        for chunk in chunks {
            match self.emit_text_delta(ctx, chunk).await {
                Ok(()) if !delay.is_zero() => tokio::time::sleep(delay).await,
                Ok(()) => {}
                Err(e) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    pub async fn emit_reasoning_delta(
        &mut self,
        ctx: &mut ChatStreamContext,
        delta: String,
    ) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::ReasoningDelta { delta }).await
    }

    pub async fn emit_tool_call_start(
        &mut self,
        ctx: &mut ChatStreamContext,
        tool_call: &ToolCallInfo,
    ) -> Result<(), ChatError> {
        let event = StreamEvent::ToolCallStart {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            input: tool_call.input_or_raw(),
        };
        self.send(ctx, event).await
    }

    pub async fn emit_tool_call_output(
        &mut self,
        ctx: &mut ChatStreamContext,
        tool_call: &ToolCallInfo,
        output: Value,
        is_error: bool,
    ) -> Result<(), ChatError> {
        let event = StreamEvent::ToolCallOutput {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            output,
            is_error,
        };
        self.send(ctx, event).await
    }

    pub async fn emit_source_url(
        &mut self,
        ctx: &mut ChatStreamContext,
        source_id: String,
        url: String,
        title: Option<String>,
    ) -> Result<(), ChatError> {
        let event = StreamEvent::SourceUrl {
            source_id,
            url,
            title,
        };
        self.send(ctx, event).await
    }

    pub async fn emit_file(
        &mut self,
        ctx: &mut ChatStreamContext,
        media_type: String,
        url: String,
    ) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::File { media_type, url }).await
    }

    pub async fn emit_finish_step(&mut self, ctx: &mut ChatStreamContext) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::FinishStep).await
    }

    pub async fn emit_message_boundary(
        &mut self,
        ctx: &mut ChatStreamContext,
    ) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::MessageBoundary).await
    }

    pub async fn emit_error(
        &mut self,
        ctx: &mut ChatStreamContext,
        error_text: String,
    ) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::Error { error_text }).await
    }

    pub async fn emit_stream_end(
        &mut self,
        ctx: &mut ChatStreamContext,
        finish_reason: FinishReason,
    ) -> Result<(), ChatError> {
        self.send(ctx, StreamEvent::StreamEnd { finish_reason }).await
    }

    /// Send a raw event, e.g. tool input updates from the accumulator
    pub async fn send_raw(
        &mut self,
        ctx: &mut ChatStreamContext,
        event: StreamEvent,
    ) -> Result<(), ChatError> {
        self.send(ctx, event).await
    }
}

/// A tool call whose arguments have finished streaming
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallInfo {
    pub id: String,
    pub name: String,
    /// Raw JSON argument text as produced by the model
    pub arguments: String,
}

impl ToolCallInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parsed arguments; empty argument text means no arguments
    pub fn input(&self) -> Result<Value, ToolError> {
        if self.arguments.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&self.arguments).map_err(|e| ToolError::invalid_input(&self.name, e))
    }

    /// Parsed arguments, or the raw text when it is not valid JSON
    pub fn input_or_raw(&self) -> Value {
        self.input()
            .unwrap_or_else(|_| Value::String(self.arguments.clone()))
    }
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    announced: bool,
}

/// Accumulator for streaming tool calls, keyed by the provider's call index
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<i64, PendingToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Fold one fragment in and return the input events it produces.
    ///
    /// A call is announced with `tool-input-start` once its name is known;
    /// argument text seen before that is sent as the first delta.
    pub fn push(&mut self, delta: &ToolCallDelta) -> Vec<StreamEvent> {
        let call = self.calls.entry(delta.index.unwrap_or(0)).or_default();

        if call.id.is_none() {
            call.id = delta.id.clone().filter(|id| !id.is_empty());
        }
        let function = delta.function.as_ref();
        if call.name.is_none() {
            call.name = function
                .and_then(|f| f.name.clone())
                .filter(|name| !name.is_empty());
        }
        let fragment = function
            .and_then(|f| f.arguments.as_deref())
            .unwrap_or_default();
        call.arguments.push_str(fragment);

        let mut events = Vec::new();
        match (&call.name, call.announced) {
            (Some(name), false) => {
                let id = call
                    .id
                    .get_or_insert_with(|| generate_id(PREFIX_CALL, 24))
                    .clone();
                call.announced = true;
                events.push(StreamEvent::ToolInputStart {
                    tool_call_id: id.clone(),
                    tool_name: name.clone(),
                });
                if !call.arguments.is_empty() {
                    events.push(StreamEvent::ToolInputDelta {
                        tool_call_id: id,
                        delta: call.arguments.clone(),
                    });
                }
            }
            (Some(_), true) if !fragment.is_empty() => {
                if let Some(id) = &call.id {
                    events.push(StreamEvent::ToolInputDelta {
                        tool_call_id: id.clone(),
                        delta: fragment.to_string(),
                    });
                }
            }
            _ => {}
        }
        events
    }

    /// Completed calls in index order. Calls that never got a name are dropped.
    pub fn finish(self) -> Vec<ToolCallInfo> {
        self.calls
            .into_iter()
            .filter_map(|(index, call)| match (call.id, call.name) {
                (Some(id), Some(name)) => Some(ToolCallInfo::new(id, name, call.arguments)),
                _ => {
                    tracing::warn!(index, "Dropping tool call without a name");
                    None
                }
            })
            .collect()
    }
}
