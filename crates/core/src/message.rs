//! Prompt message domain types.
//!
//! A turn's prompt is an ordered list of role/content pairs: an optional
//! system message, optional memory context folded into it, and the user
//! message. These are the value objects handed to the completion provider.

use serde::{Deserialize, Serialize};

/// The role of a message in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, rules, injected context)
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

/// A single prompt message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who speaks
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    /// Total characters across a prompt, the input to usage estimation.
    pub fn total_chars(messages: &[Message]) -> usize {
        messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello!");
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::system("Be helpful.");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"system\""));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::assistant("Sure thing.");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn counts_chars_across_prompt() {
        let prompt = vec![Message::system("abcd"), Message::user("efgh")];
        assert_eq!(Message::total_chars(&prompt), 8);
    }
}
