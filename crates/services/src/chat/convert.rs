//! Maps transcript messages to the provider's chat format.

use inference_providers::{ChatMessage, MessageRole, ToolCall};

use super::models::{Message, Part, Role};

/// Build the model context for a turn: the system prompt followed by every
/// message in order.
///
/// Reasoning and source parts are not sent back. Tool invocations without
/// output are dropped so the model never sees a call without a result.
pub fn convert_to_model_messages(messages: &[Message], system_prompt: &str) -> Vec<ChatMessage> {
    let mut converted = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        converted.push(ChatMessage::system(system_prompt));
    }

    for message in messages {
        match message.role {
            Role::System => {
                let text = message.text();
                if !text.is_empty() {
                    converted.push(ChatMessage::system(text));
                }
            }
            Role::User => converted.push(ChatMessage::user(user_content(message))),
            Role::Assistant => push_assistant(&mut converted, message),
        }
    }

    converted
}

fn user_content(message: &Message) -> String {
    let mut content = String::new();
    for part in &message.parts {
        match part {
            Part::Text { text } => content.push_str(text),
            Part::File { media_type, url } => {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&format!("[Attached file ({media_type}): {url}]"));
            }
            _ => {}
        }
    }
    content
}

/// An assistant message becomes one model message per step, each followed
/// by the tool results of that step.
fn push_assistant(converted: &mut Vec<ChatMessage>, message: &Message) {
    let mut text = String::new();
    let mut calls: Vec<ToolCall> = Vec::new();
    let mut results: Vec<ChatMessage> = Vec::new();

    let mut flush = |text: &mut String, calls: &mut Vec<ToolCall>, results: &mut Vec<ChatMessage>| {
        if text.is_empty() && calls.is_empty() {
            return;
        }
        converted.push(ChatMessage {
            role: MessageRole::Assistant,
            content: (!text.is_empty()).then(|| std::mem::take(text)),
            name: None,
            tool_call_id: None,
            tool_calls: (!calls.is_empty()).then(|| std::mem::take(calls)),
        });
        converted.append(results);
    };

    for part in &message.parts {
        match part {
            Part::StepStart => flush(&mut text, &mut calls, &mut results),
            Part::Text { text: delta } => text.push_str(delta),
            Part::ToolInvocation(invocation) => {
                let Some(output) = invocation.output.as_ref().filter(|_| invocation.has_output())
                else {
                    continue;
                };
                let arguments = invocation
                    .input
                    .as_ref()
                    .map(|input| input.to_string())
                    .unwrap_or_else(|| "{}".to_string());
                calls.push(ToolCall::function(
                    invocation.tool_call_id.clone(),
                    invocation.tool_name.clone(),
                    arguments,
                ));
                results.push(ChatMessage::tool(
                    invocation.tool_call_id.clone(),
                    output.to_string(),
                ));
            }
            Part::Reasoning { .. }
            | Part::File { .. }
            | Part::SourceUrl { .. } => {}
        }
    }
    flush(&mut text, &mut calls, &mut results);
}
