//! Conversation data model: roles, content, messages, and tool calls.

use serde::{Deserialize, Serialize};

use crate::size::ByteCounter;

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A system instruction.
    System,
    /// A human user.
    User,
    /// An AI assistant.
    Assistant,
    /// Output from a tool invocation.
    Tool,
}

/// Message content: plain text or an ordered list of text parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    /// A single text body.
    Text(String),
    /// Multiple text parts, joined with newlines when read as one string.
    Parts(Vec<String>),
}

impl Content {
    /// Total UTF-8 byte length of the content.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Content::Text(text) => text.len(),
            Content::Parts(parts) => parts.iter().map(String::len).sum(),
        }
    }

    /// The content as one string, joining parts with newlines.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts.join("\n"),
        }
    }

    /// Case-insensitive substring check across all parts.
    #[must_use]
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        match self {
            Content::Text(text) => text.to_lowercase().contains(&needle),
            Content::Parts(parts) => parts.iter().any(|p| p.to_lowercase().contains(&needle)),
        }
    }

    /// Whether the content holds no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

/// A tool invocation recorded on a message.
///
/// `content` carries the call's primary payload (new file text, a patch,
/// or a shell command) when the arguments have one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the invoked tool.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: serde_json::Value,
    /// File-like path the call operates on, if any.
    pub path: Option<String>,
    /// Primary content fragment (new text, patch text, or command).
    pub content: Option<String>,
}

impl ToolCall {
    /// Create a tool call with empty arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: serde_json::Value::Object(serde_json::Map::new()),
            path: None,
            content: None,
        }
    }

    /// Set the JSON arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set the target path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the primary content fragment.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Look up a named argument.
    #[must_use]
    pub fn argument(&self, key: &str) -> Option<&serde_json::Value> {
        self.arguments.get(key)
    }

    /// The text to scan when classifying this call: the content fragment
    /// when present, otherwise the serialized arguments.
    #[must_use]
    pub fn scan_text(&self) -> String {
        match &self.content {
            Some(content) => content.clone(),
            None => self.arguments.to_string(),
        }
    }

    /// Approximate UTF-8 byte size of the call.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.name.len()
            + self.arguments.to_string().len()
            + self.path.as_deref().map_or(0, str::len)
            + self.content.as_deref().map_or(0, str::len)
    }
}

/// An ordered element of a conversation.
///
/// Messages are appended by agent nodes and never mutated in place; the
/// streaming reducer is the only component that evicts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: Content,
    /// Tool calls recorded on this message (usually assistant messages).
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Optional stable identifier used for merge-by-id reduction.
    #[serde(default)]
    pub id: Option<String>,
}

impl Message {
    /// Create a user message.
    ///
    /// # Example
    ///
    /// ```
    /// use cortex_types::Message;
    /// let msg = Message::user("fix the failing test");
    /// ```
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, text)
    }

    /// Create a system message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, text)
    }

    /// Create a tool-output message.
    #[must_use]
    pub fn tool(text: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, text)
    }

    fn with_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Content::Text(text.into()),
            tool_calls: Vec::new(),
            id: None,
        }
    }

    /// Attach a stable identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach tool calls.
    #[must_use]
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Derived UTF-8 byte size of this message.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        ByteCounter::default().message_bytes(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hi").role, Role::Assistant);
        assert_eq!(Message::system("hi").role, Role::System);
        assert_eq!(Message::tool("hi").role, Role::Tool);
    }

    #[test]
    fn content_byte_len_counts_utf8_bytes() {
        assert_eq!(Content::Text("héllo".into()).byte_len(), 6);
        assert_eq!(
            Content::Parts(vec!["ab".into(), "cd".into()]).byte_len(),
            4
        );
    }

    #[test]
    fn contains_ignore_case_spans_parts() {
        let content = Content::Parts(vec!["build OK".into(), "Task Completed".into()]);
        assert!(content.contains_ignore_case("task completed"));
        assert!(!content.contains_ignore_case("failed"));
    }

    #[test]
    fn scan_text_prefers_content_fragment() {
        let call = ToolCall::new("write_file")
            .with_arguments(json!({"path": "src/lib.rs"}))
            .with_content("fn main() {}");
        assert_eq!(call.scan_text(), "fn main() {}");

        let bare = ToolCall::new("ls").with_arguments(json!({"dir": "/tmp"}));
        assert!(bare.scan_text().contains("/tmp"));
    }

    #[test]
    fn message_roundtrips_through_serde() {
        let msg = Message::assistant("done")
            .with_id("m-1")
            .with_tool_calls(vec![ToolCall::new("edit").with_path("a.rs")]);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
