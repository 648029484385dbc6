//! Byte accounting for messages and JSON values.

use crate::message::{Content, Message};

/// Fixed per-message overhead (role marker, framing) added to content bytes.
const MESSAGE_OVERHEAD: usize = 16;

/// Estimates UTF-8 byte sizes for the bounded structures.
///
/// All bounds in this workspace are expressed in bytes, not tokens; the
/// counter is the single definition of "size" so every component accounts
/// the same way.
///
/// # Example
///
/// ```
/// use cortex_types::{ByteCounter, Message};
///
/// let counter = ByteCounter::default();
/// let msgs = vec![Message::user("hello")];
/// assert!(counter.messages_bytes(&msgs) > 5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCounter;

impl ByteCounter {
    /// UTF-8 byte length of a text string.
    #[must_use]
    pub fn text_bytes(&self, text: &str) -> usize {
        text.len()
    }

    /// Byte size of one message: content + tool calls + fixed overhead.
    #[must_use]
    pub fn message_bytes(&self, message: &Message) -> usize {
        let content = match &message.content {
            Content::Text(text) => text.len(),
            Content::Parts(parts) => parts.iter().map(String::len).sum(),
        };
        let calls: usize = message.tool_calls.iter().map(|c| c.byte_size()).sum();
        let id = message.id.as_deref().map_or(0, str::len);
        MESSAGE_OVERHEAD + content + calls + id
    }

    /// Total byte size of a message slice.
    #[must_use]
    pub fn messages_bytes(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.message_bytes(m)).sum()
    }

    /// Byte size of a JSON value as it would serialize compactly.
    #[must_use]
    pub fn value_bytes(&self, value: &serde_json::Value) -> usize {
        match value {
            serde_json::Value::Null => 4,
            serde_json::Value::Bool(b) => {
                if *b {
                    4
                } else {
                    5
                }
            }
            serde_json::Value::String(s) => s.len() + 2,
            serde_json::Value::Number(n) => n.to_string().len(),
            serde_json::Value::Array(items) => {
                2 + items.iter().map(|v| self.value_bytes(v) + 1).sum::<usize>()
            }
            serde_json::Value::Object(map) => {
                2 + map
                    .iter()
                    .map(|(k, v)| k.len() + 3 + self.value_bytes(v) + 1)
                    .sum::<usize>()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_bytes_includes_overhead() {
        let counter = ByteCounter::default();
        let msg = Message::user("a".repeat(100));
        assert_eq!(counter.message_bytes(&msg), 100 + MESSAGE_OVERHEAD);
    }

    #[test]
    fn messages_bytes_sums() {
        let counter = ByteCounter::default();
        let msgs = vec![Message::user("ab"), Message::assistant("cd")];
        assert_eq!(
            counter.messages_bytes(&msgs),
            counter.message_bytes(&msgs[0]) + counter.message_bytes(&msgs[1])
        );
    }

    #[test]
    fn value_bytes_tracks_serialized_size() {
        let counter = ByteCounter::default();
        let value = json!({"key": [1, 2, 3], "s": "text"});
        let serialized = value.to_string().len();
        let estimate = counter.value_bytes(&value);
        // Close to the compact encoding, never off by an order of magnitude.
        assert!(estimate >= serialized / 2 && estimate <= serialized * 2);
    }
}
