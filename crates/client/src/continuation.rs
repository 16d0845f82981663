use services::chat::{Message, Part, Role, ToolState};

/// True when the last message is from the assistant and its latest step
/// called at least one tool, with every call of that step answered.
///
/// Only parts after the last `StepStart` count, so tool calls answered in
/// an earlier step do not trigger another round.
pub fn last_assistant_message_is_complete_with_tool_calls(messages: &[Message]) -> bool {
    let Some(last) = messages.last() else {
        return false;
    };
    if last.role != Role::Assistant {
        return false;
    }

    let step_start = last
        .parts
        .iter()
        .rposition(|part| matches!(part, Part::StepStart))
        .map_or(0, |index| index + 1);

    let mut invocations = last.parts[step_start..]
        .iter()
        .filter_map(Part::as_tool_invocation)
        .peekable();

    invocations.peek().is_some()
        && invocations.all(|invocation| invocation.state == ToolState::OutputAvailable)
}
