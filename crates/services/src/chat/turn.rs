//! Picks the (user, assistant) pair that is persisted when a stream finishes.

use std::collections::HashSet;

use super::models::{Message, Role};

/// Decides whether an assistant message is finished enough to store.
///
/// A message qualifies when it has at least one text part and every
/// invocation of a blocking tool has produced output.
#[derive(Debug, Clone, Default)]
pub struct CompletenessGate {
    blocking_tools: HashSet<String>,
}

impl CompletenessGate {
    pub fn new<I, S>(blocking_tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocking_tools: blocking_tools.into_iter().map(Into::into).collect(),
        }
    }

    pub fn blocks(&self, tool_name: &str) -> bool {
        self.blocking_tools.contains(tool_name)
    }

    pub fn is_complete(&self, message: &Message) -> bool {
        message.role == Role::Assistant
            && message.has_text()
            && message
                .tool_invocations()
                .filter(|invocation| self.blocks(&invocation.tool_name))
                .all(|invocation| invocation.has_output())
    }
}

/// The latest complete assistant message and the nearest user message before it
pub fn select_turn<'a>(
    messages: &'a [Message],
    gate: &CompletenessGate,
) -> Option<(&'a Message, &'a Message)> {
    let assistant_index = messages
        .iter()
        .rposition(|message| gate.is_complete(message))?;

    let user = messages[..assistant_index]
        .iter()
        .rev()
        .find(|message| message.role == Role::User)?;

    Some((user, &messages[assistant_index]))
}
