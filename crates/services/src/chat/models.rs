use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::UserId;
use crate::common::generate_id;
use crate::id_prefixes::{MESSAGE_ID_SIZE, PREFIX_MSG};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        ChatId(value)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        ChatId(value.to_string())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// New server-side message id, `msg-` plus 16 random characters
    pub fn generate() -> Self {
        MessageId(generate_id(PREFIX_MSG, MESSAGE_ID_SIZE))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId(value.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Lifecycle of a tool invocation. Ordering follows the lifecycle, so a
/// transition is legal only when it does not decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolStateError {
    #[error("tool call {tool_call_id} cannot move from {from:?} back to {to:?}")]
    Regression {
        tool_call_id: String,
        from: ToolState,
        to: ToolState,
    },
    #[error("tool call {tool_call_id} already has an output")]
    AlreadyCompleted { tool_call_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ToolInvocation {
    /// A call whose arguments are still streaming
    pub fn streaming(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            state: ToolState::InputStreaming,
            input: None,
            output: None,
            error_text: None,
        }
    }

    /// A call whose arguments are complete
    pub fn with_input(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Value,
    ) -> Self {
        Self {
            state: ToolState::InputAvailable,
            input: Some(input),
            ..Self::streaming(tool_call_id, tool_name)
        }
    }

    /// Move to `next`. Staying in a non-terminal state is a no-op; going
    /// backwards or producing a second output is rejected.
    pub fn advance(&mut self, next: ToolState) -> Result<(), ToolStateError> {
        if next < self.state {
            return Err(ToolStateError::Regression {
                tool_call_id: self.tool_call_id.clone(),
                from: self.state,
                to: next,
            });
        }
        if next == ToolState::OutputAvailable && self.state == ToolState::OutputAvailable {
            return Err(ToolStateError::AlreadyCompleted {
                tool_call_id: self.tool_call_id.clone(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn set_input(&mut self, input: Value) -> Result<(), ToolStateError> {
        self.advance(ToolState::InputAvailable)?;
        self.input = Some(input);
        Ok(())
    }

    /// Record the result. Failed executions still complete the call; the
    /// error is kept alongside the output so the model and UI can see it.
    pub fn complete(&mut self, output: Value, is_error: bool) -> Result<(), ToolStateError> {
        self.advance(ToolState::OutputAvailable)?;
        if is_error {
            self.error_text = output
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(output.to_string()));
        }
        self.output = Some(output);
        Ok(())
    }

    pub fn has_output(&self) -> bool {
        self.state == ToolState::OutputAvailable
    }
}

/// One piece of a message. Parts keep the order in which they were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Part {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    File {
        media_type: String,
        url: String,
    },
    ToolInvocation(ToolInvocation),
    SourceUrl {
        source_id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    StepStart,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_tool_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            Part::ToolInvocation(invocation) => Some(invocation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    pub fn new(id: MessageId, role: Role, parts: Vec<Part>) -> Self {
        Self {
            id,
            role,
            parts,
            metadata: None,
        }
    }

    pub fn user_text(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, vec![Part::text(text)])
    }

    pub fn assistant_text(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, vec![Part::text(text)])
    }

    pub fn has_text(&self) -> bool {
        self.parts.iter().any(|part| matches!(part, Part::Text { .. }))
    }

    /// All text parts joined together
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(Part::as_tool_invocation)
    }

    pub fn tool_invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.parts.iter_mut().find_map(|part| match part {
            Part::ToolInvocation(invocation) if invocation.tool_call_id == tool_call_id => {
                Some(invocation)
            }
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The model finished without requesting more tools
    Stop,
    /// The step limit was reached while the model still wanted tools
    MaxSteps,
    /// The consumer went away before generation finished
    Cancelled,
    Error,
}

/// Incremental update for one assistant message, sent to the client as one
/// SSE `data:` line each. Tool events carry an explicit `toolCallId` so
/// start and output are correlated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Start {
        message_id: MessageId,
    },
    StartStep,
    TextDelta {
        delta: String,
    },
    ReasoningDelta {
        delta: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolInputDelta {
        tool_call_id: String,
        delta: String,
    },
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolCallOutput {
        tool_call_id: String,
        tool_name: String,
        output: Value,
        is_error: bool,
    },
    SourceUrl {
        source_id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    File {
        media_type: String,
        url: String,
    },
    FinishStep,
    MessageBoundary,
    Error {
        error_text: String,
    },
    StreamEnd {
        finish_reason: FinishReason,
    },
}

impl StreamEvent {
    /// The `type` tag, also used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::StartStep => "start-step",
            StreamEvent::TextDelta { .. } => "text-delta",
            StreamEvent::ReasoningDelta { .. } => "reasoning-delta",
            StreamEvent::ToolInputStart { .. } => "tool-input-start",
            StreamEvent::ToolInputDelta { .. } => "tool-input-delta",
            StreamEvent::ToolCallStart { .. } => "tool-call-start",
            StreamEvent::ToolCallOutput { .. } => "tool-call-output",
            StreamEvent::SourceUrl { .. } => "source-url",
            StreamEvent::File { .. } => "file",
            StreamEvent::FinishStep => "finish-step",
            StreamEvent::MessageBoundary => "message-boundary",
            StreamEvent::Error { .. } => "error",
            StreamEvent::StreamEnd { .. } => "stream-end",
        }
    }
}

/// Body of a chat turn request
#[derive(Debug, Clone)]
pub struct ChatStreamRequest {
    pub chat_id: ChatId,
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub web_search: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub user_id: UserId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_state_ordering() {
        assert!(ToolState::InputStreaming < ToolState::InputAvailable);
        assert!(ToolState::InputAvailable < ToolState::OutputAvailable);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut invocation = ToolInvocation::streaming("call_1", "imageGenerator");
        invocation.set_input(json!({"prompt": "a cat"})).unwrap();
        invocation
            .complete(json!({"url": "https://cdn/cat.png"}), false)
            .unwrap();

        let regression = invocation.advance(ToolState::InputAvailable);
        assert!(matches!(regression, Err(ToolStateError::Regression { .. })));

        let second_output = invocation.complete(json!({"url": "other"}), false);
        assert!(matches!(
            second_output,
            Err(ToolStateError::AlreadyCompleted { .. })
        ));
        assert_eq!(invocation.output, Some(json!({"url": "https://cdn/cat.png"})));
    }

    #[test]
    fn test_advance_same_non_terminal_state_is_noop() {
        let mut invocation = ToolInvocation::with_input("call_1", "webSearcher", json!({}));
        assert!(invocation.advance(ToolState::InputAvailable).is_ok());
        assert_eq!(invocation.state, ToolState::InputAvailable);
    }

    #[test]
    fn test_complete_with_error_sets_error_text() {
        let mut invocation = ToolInvocation::with_input("call_1", "emailSender", json!({}));
        invocation
            .complete(json!({"error": "invalid recipient"}), true)
            .unwrap();
        assert_eq!(invocation.error_text.as_deref(), Some("invalid recipient"));
        assert!(invocation.has_output());
    }

    #[test]
    fn test_part_wire_format() {
        let part = Part::ToolInvocation(ToolInvocation::with_input(
            "call_1",
            "webSearcher",
            json!({"query": "rust"}),
        ));
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool-invocation");
        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["state"], "input-available");

        let file = serde_json::to_value(Part::File {
            media_type: "image/png".to_string(),
            url: "https://cdn/x.png".to_string(),
        })
        .unwrap();
        assert_eq!(file, json!({"type": "file", "mediaType": "image/png", "url": "https://cdn/x.png"}));

        let step: Part = serde_json::from_value(json!({"type": "step-start"})).unwrap();
        assert_eq!(step, Part::StepStart);
    }

    #[test]
    fn test_message_round_trip_from_client_json() {
        let message: Message = serde_json::from_value(json!({
            "id": "msg-abc",
            "role": "assistant",
            "parts": [
                {"type": "step-start"},
                {"type": "text", "text": "Here you go"},
                {"type": "tool-invocation", "toolCallId": "call_1", "toolName": "imageGenerator",
                 "state": "output-available", "input": {"prompt": "cat"}, "output": {"url": "u"}}
            ]
        }))
        .unwrap();

        assert_eq!(message.role, Role::Assistant);
        assert!(message.has_text());
        assert_eq!(message.text(), "Here you go");
        assert_eq!(message.tool_invocations().count(), 1);
    }

    #[test]
    fn test_stream_event_wire_format() {
        let event = StreamEvent::ToolCallOutput {
            tool_call_id: "call_1".to_string(),
            tool_name: "webSearcher".to_string(),
            output: json!([]),
            is_error: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.event_type());
        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["isError"], false);

        let end = serde_json::to_value(StreamEvent::StreamEnd {
            finish_reason: FinishReason::MaxSteps,
        })
        .unwrap();
        assert_eq!(end, json!({"type": "stream-end", "finishReason": "max-steps"}));
    }

    #[test]
    fn test_message_id_generate() {
        let id = MessageId::generate();
        assert!(id.as_str().starts_with("msg-"));
        assert_eq!(id.as_str().len(), 20);
    }
}
