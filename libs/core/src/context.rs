use crate::types::{ContentPart, Message, MessageContent, Role};

const CHARS_PER_TOKEN: usize = 4;

/// Whether the conversation can be cut right before `index`.
///
/// A message holding a tool result would lose its call, and a message holding
/// a tool call is only safe when the next message carries its result. A tool
/// call in the last message is accepted.
pub fn is_valid_trim_index(messages: &[Message], index: usize) -> bool {
    let Some(current) = messages.get(index) else {
        return false;
    };

    if current.has_tool_result() {
        return false;
    }

    !(current.has_tool_call()
        && messages
            .get(index + 1)
            .is_some_and(|next| !next.has_tool_result()))
}

/// Find the first index at or after `target_trim` where the conversation can
/// be cut without splitting a tool call from its result. Returns `None` when
/// no index before the end qualifies.
pub fn find_valid_trim_index(messages: &[Message], target_trim: usize) -> Option<usize> {
    (target_trim..messages.len()).find(|&index| is_valid_trim_index(messages, index))
}

/// Rough token estimate: characters of text parts divided by four, per part.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

fn estimate_message_tokens(message: &Message) -> usize {
    let text_tokens = |text: &str| text.chars().count() / CHARS_PER_TOKEN;

    match &message.content {
        MessageContent::Text(text) => text_tokens(text),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(ContentPart::as_text)
            .map(text_tokens)
            .sum(),
    }
}

/// Number of leading system messages.
pub fn leading_system_len(messages: &[Message]) -> usize {
    messages
        .iter()
        .take_while(|message| message.role == Role::System)
        .count()
}

/// Counts of tool calls and tool results across the conversation.
pub fn count_tool_parts(messages: &[Message]) -> (usize, usize) {
    messages
        .iter()
        .flat_map(|message| message.content.structured_parts())
        .fold((0, 0), |(calls, results), part| {
            (
                calls + usize::from(part.is_tool_call()),
                results + usize::from(part.is_tool_result()),
            )
        })
}
