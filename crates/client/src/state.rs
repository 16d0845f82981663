use serde::{Deserialize, Serialize};
use services::chat::assembly::apply_event;
use services::chat::{ChatId, Message, MessageId, Part, Role, StreamEvent};

use crate::continuation::last_assistant_message_is_complete_with_tool_calls;
use crate::errors::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Idle,
    /// The request is out, no event has arrived yet
    Submitted,
    Streaming,
    Error,
}

/// A file the user attaches to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub media_type: String,
    pub url: String,
}

/// Messages of one chat as the user sees them, updated event by event
#[derive(Debug, Clone)]
pub struct ChatState {
    pub chat_id: ChatId,
    pub messages: Vec<Message>,
    pub status: ChatStatus,
    pub error: Option<String>,
    /// Index of the assistant message receiving content
    open: Option<usize>,
    /// (message id, part count) of the last continuation handed out
    continued: Option<(MessageId, usize)>,
    /// Set by `stop`; events of the stopped request are dropped
    stopped: bool,
}

impl ChatState {
    pub fn new(chat_id: ChatId) -> Self {
        Self::with_messages(chat_id, Vec::new())
    }

    /// Resume a chat from its stored transcript
    pub fn with_messages(chat_id: ChatId, messages: Vec<Message>) -> Self {
        Self {
            chat_id,
            messages,
            status: ChatStatus::Idle,
            error: None,
            open: None,
            continued: None,
            stopped: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.status, ChatStatus::Submitted | ChatStatus::Streaming)
    }

    /// Append the user's message right away, before any network round trip
    pub fn submit_user_message(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Message, ClientError> {
        if self.is_busy() {
            return Err(ClientError::Busy);
        }

        let mut parts: Vec<Part> = attachments
            .into_iter()
            .map(|file| Part::File {
                media_type: file.media_type,
                url: file.url,
            })
            .collect();
        parts.push(Part::text(text));

        let message = Message::new(MessageId::generate(), Role::User, parts);
        self.messages.push(message.clone());
        self.begin_request();
        Ok(message)
    }

    /// Mark a request as sent without adding a message (regenerate, continuation)
    pub fn begin_request(&mut self) {
        self.status = ChatStatus::Submitted;
        self.error = None;
        self.open = None;
        self.stopped = false;
    }

    /// Fold one stream event into the message list
    pub fn apply(&mut self, event: &StreamEvent) {
        if self.stopped {
            return;
        }
        if self.status == ChatStatus::Submitted {
            self.status = ChatStatus::Streaming;
        }

        match event {
            StreamEvent::Start { message_id } => self.open_message(Some(message_id)),
            StreamEvent::MessageBoundary => self.open = None,
            StreamEvent::Error { error_text } => {
                tracing::warn!(chat_id = %self.chat_id, error = %error_text, "Stream reported an error");
                self.error = Some(error_text.clone());
                self.status = ChatStatus::Error;
            }
            StreamEvent::StreamEnd { finish_reason } => {
                tracing::debug!(chat_id = %self.chat_id, ?finish_reason, "Stream ended");
                self.open = None;
                if self.status != ChatStatus::Error {
                    self.status = ChatStatus::Idle;
                }
            }
            StreamEvent::FinishStep => {}
            content => {
                let index = match self.open {
                    Some(index) => index,
                    None => {
                        self.open_message(None);
                        self.messages.len() - 1
                    }
                };
                if let Err(e) = apply_event(&mut self.messages[index], content) {
                    tracing::debug!(chat_id = %self.chat_id, error = %e, "Ignoring stale tool event");
                }
            }
        }
    }

    /// Reopen the trailing assistant message when the id matches, otherwise
    /// start a new one
    fn open_message(&mut self, message_id: Option<&MessageId>) {
        if let Some(id) = message_id {
            if let Some(last) = self.messages.last() {
                if last.role == Role::Assistant && &last.id == id {
                    self.open = Some(self.messages.len() - 1);
                    return;
                }
            }
        }

        let id = message_id.cloned().unwrap_or_else(MessageId::generate);
        self.messages
            .push(Message::new(id, Role::Assistant, Vec::new()));
        self.open = Some(self.messages.len() - 1);
    }

    /// The user stopped the response; whatever arrived stays
    pub fn stop(&mut self) {
        self.open = None;
        self.stopped = true;
        if self.is_busy() {
            self.status = ChatStatus::Idle;
        }
    }

    /// The request failed; the user's message stays so it can be retried
    pub fn fail(&mut self, error: impl Into<String>) {
        self.open = None;
        self.error = Some(error.into());
        self.status = ChatStatus::Error;
    }

    /// The stream closed without a `stream-end` event
    pub fn finish_stream(&mut self) {
        self.open = None;
        if self.is_busy() {
            self.status = ChatStatus::Idle;
        }
    }

    /// Drop the trailing assistant message so the last user message can be
    /// answered again. Returns false when there is no user message to answer.
    pub fn truncate_for_regenerate(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        if self
            .messages
            .last()
            .is_some_and(|message| message.role == Role::Assistant)
        {
            self.messages.pop();
        }
        self.open = None;
        self.messages
            .last()
            .is_some_and(|message| message.role == Role::User)
    }

    /// Whether to send the conversation back for another round. Yields the
    /// assistant message id at most once per state of that message.
    pub fn take_continuation(&mut self) -> Option<MessageId> {
        if self.status != ChatStatus::Idle
            || !last_assistant_message_is_complete_with_tool_calls(&self.messages)
        {
            return None;
        }

        let last = self.messages.last()?;
        let key = (last.id.clone(), last.parts.len());
        if self.continued.as_ref() == Some(&key) {
            return None;
        }
        self.continued = Some(key);
        Some(last.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use services::chat::{FinishReason, ToolState};

    fn start(id: &str) -> StreamEvent {
        StreamEvent::Start {
            message_id: MessageId::from(id),
        }
    }

    fn text(delta: &str) -> StreamEvent {
        StreamEvent::TextDelta {
            delta: delta.to_string(),
        }
    }

    fn end() -> StreamEvent {
        StreamEvent::StreamEnd {
            finish_reason: FinishReason::Stop,
        }
    }

    fn tool_call(id: &str) -> [StreamEvent; 2] {
        [
            StreamEvent::ToolCallStart {
                tool_call_id: id.to_string(),
                tool_name: "webSearcher".to_string(),
                input: json!({"query": "rust"}),
            },
            StreamEvent::ToolCallOutput {
                tool_call_id: id.to_string(),
                tool_name: "webSearcher".to_string(),
                output: json!([]),
                is_error: false,
            },
        ]
    }

    fn submitted() -> ChatState {
        let mut state = ChatState::new(ChatId::from("c1"));
        state.submit_user_message("hello", Vec::new()).unwrap();
        state
    }

    #[test]
    fn test_submit_is_optimistic_and_exclusive() {
        let mut state = ChatState::new(ChatId::from("c1"));
        let message = state
            .submit_user_message(
                "look",
                vec![Attachment {
                    media_type: "image/png".to_string(),
                    url: "https://cdn/x.png".to_string(),
                }],
            )
            .unwrap();

        assert_eq!(state.status, ChatStatus::Submitted);
        assert_eq!(state.messages, vec![message.clone()]);
        assert!(matches!(message.parts[0], Part::File { .. }));
        assert_eq!(message.text(), "look");
        assert_eq!(
            state.submit_user_message("again", Vec::new()),
            Err(ClientError::Busy)
        );
    }

    #[test]
    fn test_stream_builds_assistant_message() {
        let mut state = submitted();
        state.apply(&start("a1"));
        assert_eq!(state.status, ChatStatus::Streaming);
        for event in [StreamEvent::StartStep, text("Hi "), text("there")] {
            state.apply(&event);
        }
        state.apply(&StreamEvent::FinishStep);
        state.apply(&StreamEvent::MessageBoundary);
        state.apply(&end());

        assert_eq!(state.status, ChatStatus::Idle);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].id.as_str(), "a1");
        assert_eq!(state.messages[1].parts, vec![Part::StepStart, Part::text("Hi there")]);
    }

    #[test]
    fn test_start_with_same_id_reopens_message() {
        let mut state = submitted();
        state.apply(&start("a1"));
        state.apply(&text("first"));
        state.apply(&StreamEvent::MessageBoundary);
        state.apply(&end());

        state.begin_request();
        state.apply(&start("a1"));
        state.apply(&StreamEvent::StartStep);
        state.apply(&text("second"));

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].text(), "firstsecond");
    }

    #[test]
    fn test_content_without_start_opens_message() {
        let mut state = submitted();
        state.apply(&text("orphan"));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(state.messages[1].text(), "orphan");
    }

    #[test]
    fn test_tool_output_never_regresses() {
        let mut state = submitted();
        state.apply(&start("a1"));
        for event in tool_call("call_1") {
            state.apply(&event);
        }
        // A late start for an answered call changes nothing
        state.apply(&tool_call("call_1")[0]);
        state.apply(&StreamEvent::ToolCallOutput {
            tool_call_id: "call_1".to_string(),
            tool_name: "webSearcher".to_string(),
            output: json!(["duplicate"]),
            is_error: false,
        });

        let invocation = state.messages[1].tool_invocations().next().unwrap();
        assert_eq!(invocation.state, ToolState::OutputAvailable);
        assert_eq!(invocation.output, Some(json!([])));
    }

    #[test]
    fn test_error_event_keeps_error_status() {
        let mut state = submitted();
        state.apply(&start("a1"));
        state.apply(&StreamEvent::Error {
            error_text: "Model error: overloaded".to_string(),
        });
        state.apply(&end());

        assert_eq!(state.status, ChatStatus::Error);
        assert_eq!(state.error.as_deref(), Some("Model error: overloaded"));
    }

    #[test]
    fn test_stop_and_fail() {
        let mut state = submitted();
        state.apply(&start("a1"));
        state.apply(&text("partial"));
        state.stop();
        assert_eq!(state.status, ChatStatus::Idle);
        assert_eq!(state.messages[1].text(), "partial");

        let mut state = submitted();
        state.fail("connection refused");
        assert_eq!(state.status, ChatStatus::Error);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, Role::User);
    }

    #[test]
    fn test_events_after_stop_are_dropped() {
        let mut state = submitted();
        state.apply(&start("a1"));
        state.apply(&text("Once "));
        state.stop();
        state.apply(&text("upon"));
        state.apply(&end());

        assert_eq!(state.status, ChatStatus::Idle);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].text(), "Once ");

        state.submit_user_message("go on", Vec::new()).unwrap();
        state.apply(&start("a2"));
        state.apply(&text("a time"));
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.messages[3].text(), "a time");
    }

    #[test]
    fn test_truncate_for_regenerate() {
        let mut state = submitted();
        state.apply(&start("a1"));
        state.apply(&text("meh"));
        state.apply(&end());

        assert!(state.truncate_for_regenerate());
        assert_eq!(state.messages.len(), 1);
        assert!(state.truncate_for_regenerate());
        assert_eq!(state.messages.len(), 1);

        let mut empty = ChatState::new(ChatId::from("c2"));
        assert!(!empty.truncate_for_regenerate());
    }

    #[test]
    fn test_continuation_fires_once() {
        let mut state = submitted();
        state.apply(&start("a1"));
        state.apply(&StreamEvent::StartStep);
        for event in tool_call("call_1") {
            state.apply(&event);
        }
        assert_eq!(state.take_continuation(), None);

        state.apply(&StreamEvent::FinishStep);
        state.apply(&end());
        assert_eq!(state.take_continuation(), Some(MessageId::from("a1")));
        assert_eq!(state.take_continuation(), None);
        assert_eq!(state.take_continuation(), None);
    }
}
