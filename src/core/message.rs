//! Incoming messages and conversation turns.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single user utterance.
///
/// Immutable once created. Whitespace-only text is rejected.
///
/// # Examples
///
/// ```
/// use director_rs::core::Message;
///
/// let msg = Message::new("Show my equipment").unwrap();
/// assert_eq!(msg.text(), "Show my equipment");
/// assert!(Message::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MessageFields")]
pub struct Message {
    text: String,
    timestamp: i64,
}

#[derive(Deserialize)]
struct MessageFields {
    text: String,
    timestamp: i64,
}

impl TryFrom<MessageFields> for Message {
    type Error = Error;

    fn try_from(fields: MessageFields) -> Result<Self> {
        Self::at(fields.text, fields.timestamp)
    }
}

impl Message {
    /// Creates a message stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the text is empty after trimming.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        Self::at(text, now())
    }

    /// Creates a message with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the text is empty after trimming.
    pub fn at(text: impl Into<String>, timestamp: i64) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(Error::InvalidState {
                message: "message text is empty".to_string(),
            });
        }
        Ok(Self { text, timestamp })
    }

    /// The trimmed message text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Unix timestamp (seconds) at creation.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// A reply produced by a node.
    Assistant,
}

impl Role {
    /// Lowercase role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One entry in a conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker.
    pub role: Role,
    /// Turn text.
    pub text: String,
}

impl Turn {
    /// A user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// An assistant turn.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Returns current Unix timestamp.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_trims() {
        let msg = Message::at("  hello  ", 42).unwrap();
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.timestamp(), 42);
    }

    #[test]
    fn test_message_rejects_blank() {
        assert!(Message::new("").is_err());
        assert!(Message::new("\n\t ").is_err());
    }

    #[test]
    fn test_message_deserialize_checks_text() {
        let msg: Message = serde_json::from_str(r#"{"text": " hi ", "timestamp": 7}"#).unwrap();
        assert_eq!(msg, Message::at("hi", 7).unwrap());

        let blank = serde_json::from_str::<Message>(r#"{"text": "   ", "timestamp": 7}"#);
        assert!(blank.is_err());
    }

    #[test]
    fn test_turn_constructors() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::assistant("hello").role.as_str(), "assistant");
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&Turn::user("x")).unwrap();
        assert_eq!(json, r#"{"role":"user","text":"x"}"#);
    }
}
