//! Transcript messages as the conversation managers see them.
//!
//! Only the tool call / tool result structure matters for trimming; text is
//! kept for token estimates and display.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A bare string on the wire, or an array of tagged parts.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Structured parts; plain text content has none.
    pub fn structured_parts(&self) -> &[ContentPart] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Parts(parts) => parts,
        }
    }

    /// Text of the content, with text parts concatenated in order.
    pub fn text(&self) -> Option<String> {
        match self {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Parts(parts) => {
                let mut fragments = parts.iter().filter_map(ContentPart::as_text).peekable();
                fragments.peek()?;
                Some(fragments.collect())
            }
        }
    }
}

impl Serialize for MessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageContent::Text(text) => serializer.serialize_str(text),
            MessageContent::Parts(parts) => parts.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(text) => Ok(MessageContent::Text(text)),
            parts @ serde_json::Value::Array(_) => serde_json::from_value(parts)
                .map(MessageContent::Parts)
                .map_err(|error| D::Error::custom(format!("invalid content parts: {error}"))),
            other => Err(D::Error::custom(format!(
                "message content must be a string or an array of parts, got {other}"
            ))),
        }
    }
}

impl Message {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn text(&self) -> Option<String> {
        self.content.text()
    }

    pub fn has_tool_call(&self) -> bool {
        self.content
            .structured_parts()
            .iter()
            .any(ContentPart::is_tool_call)
    }

    pub fn has_tool_result(&self) -> bool {
        self.content
            .structured_parts()
            .iter()
            .any(ContentPart::is_tool_result)
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// Tool/function result message
    Tool,
}

/// A part of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text {
        /// The text content
        text: String,
    },
    /// Tool invocation requested by the assistant
    ToolCall {
        /// Unique ID for this tool call
        id: String,
        /// Name of the function to call
        name: String,
        /// Arguments as JSON
        arguments: serde_json::Value,
    },
    /// Result of a tool invocation
    ToolResult {
        /// ID of the tool call this is responding to
        tool_call_id: String,
        /// Result content (can be text or JSON)
        content: serde_json::Value,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, ContentPart::ToolCall { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, ContentPart::ToolResult { .. })
    }

    /// Create a tool call content part
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool result content part
    pub fn tool_result(tool_call_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content,
        }
    }
}

/// Window settings for [`crate::SlidingWindowConversationManager`].
///
/// `preserve_important` is on by default and pins the leading run of system
/// messages. A transcript that opens with a system prompt therefore keeps it
/// and trims from the messages after it, so the cut differs from a plain
/// window over the whole transcript. Set it to `false` to treat every message
/// alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlidingWindowConfig {
    pub max_messages: usize,
    pub preserve_important: bool,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            max_messages: 50,
            preserve_important: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBudgetConfig {
    pub max_tokens: usize,
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self { max_tokens: 8000 }
    }
}
