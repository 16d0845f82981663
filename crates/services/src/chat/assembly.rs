//! Folds content events into an assistant message.
//!
//! The server uses this to build the message it persists and the client
//! uses it to render the message it shows, so both agree on the result.

use serde_json::Value;

use super::models::{Message, Part, StreamEvent, ToolInvocation, ToolState, ToolStateError};

/// Apply one event to `message`.
///
/// Lifecycle events (`start`, `finish-step`, `message-boundary`, `error`,
/// `stream-end`) do not change content and are ignored here. A tool event
/// that would move an invocation backwards or complete it twice is
/// rejected and leaves the message unchanged.
pub fn apply_event(message: &mut Message, event: &StreamEvent) -> Result<(), ToolStateError> {
    match event {
        StreamEvent::TextDelta { delta } => {
            match message.parts.last_mut() {
                Some(Part::Text { text }) => text.push_str(delta),
                _ => message.parts.push(Part::text(delta.clone())),
            }
            Ok(())
        }
        StreamEvent::ReasoningDelta { delta } => {
            match message.parts.last_mut() {
                Some(Part::Reasoning { text }) => text.push_str(delta),
                _ => message.parts.push(Part::Reasoning {
                    text: delta.clone(),
                }),
            }
            Ok(())
        }
        StreamEvent::ToolInputStart {
            tool_call_id,
            tool_name,
        } => {
            if message.tool_invocation_mut(tool_call_id).is_none() {
                message
                    .parts
                    .push(Part::ToolInvocation(ToolInvocation::streaming(
                        tool_call_id.clone(),
                        tool_name.clone(),
                    )));
            }
            Ok(())
        }
        StreamEvent::ToolInputDelta {
            tool_call_id,
            delta,
        } => {
            // Raw argument text is kept as a string until the input is complete
            if let Some(invocation) = message.tool_invocation_mut(tool_call_id) {
                if invocation.state == ToolState::InputStreaming {
                    let mut raw = match invocation.input.take() {
                        Some(Value::String(raw)) => raw,
                        _ => String::new(),
                    };
                    raw.push_str(delta);
                    invocation.input = Some(Value::String(raw));
                }
            }
            Ok(())
        }
        StreamEvent::ToolCallStart {
            tool_call_id,
            tool_name,
            input,
        } => match message.tool_invocation_mut(tool_call_id) {
            Some(invocation) => invocation.set_input(input.clone()),
            None => {
                message
                    .parts
                    .push(Part::ToolInvocation(ToolInvocation::with_input(
                        tool_call_id.clone(),
                        tool_name.clone(),
                        input.clone(),
                    )));
                Ok(())
            }
        },
        StreamEvent::ToolCallOutput {
            tool_call_id,
            tool_name,
            output,
            is_error,
        } => match message.tool_invocation_mut(tool_call_id) {
            Some(invocation) => invocation.complete(output.clone(), *is_error),
            None => {
                let mut invocation =
                    ToolInvocation::with_input(tool_call_id.clone(), tool_name.clone(), Value::Null);
                invocation.complete(output.clone(), *is_error)?;
                message.parts.push(Part::ToolInvocation(invocation));
                Ok(())
            }
        },
        StreamEvent::SourceUrl {
            source_id,
            url,
            title,
        } => {
            message.parts.push(Part::SourceUrl {
                source_id: source_id.clone(),
                url: url.clone(),
                title: title.clone(),
            });
            Ok(())
        }
        StreamEvent::File { media_type, url } => {
            message.parts.push(Part::File {
                media_type: media_type.clone(),
                url: url.clone(),
            });
            Ok(())
        }
        StreamEvent::StartStep => {
            message.parts.push(Part::StepStart);
            Ok(())
        }
        StreamEvent::Start { .. }
        | StreamEvent::FinishStep
        | StreamEvent::MessageBoundary
        | StreamEvent::Error { .. }
        | StreamEvent::StreamEnd { .. } => Ok(()),
    }
}
