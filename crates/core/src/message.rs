//! Message and Conversation domain types.
//!
//! These are the value objects that flow through a turn:
//! history is loaded → user turn appended → retrieval folded in →
//! provider generates a reply → history saved.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Static instructions or retrieved knowledge
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged message.
///
/// Serialises as `{"role": ..., "content": ...}`, which is also the shape
/// stored in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// An ordered, append-only sequence of messages owned by one session.
///
/// Begins with the static system instructions. Earlier messages are never
/// rewritten; the only mutation is [`Conversation::push`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation with system instructions, in the given order.
    pub fn seeded<I, S>(instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: instructions.into_iter().map(Message::system).collect(),
        }
    }

    /// Add a message to the end of the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Ordered messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of leading system messages (the static instructions).
    pub fn leading_system_count(&self) -> usize {
        self.messages.iter().take_while(|m| m.is_system()).count()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, assistant!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, assistant!");
    }

    #[test]
    fn seeded_conversation_keeps_order() {
        let conv = Conversation::seeded(["rules", "guidelines"]);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0], Message::system("rules"));
        assert_eq!(conv.messages()[1], Message::system("guidelines"));
        assert_eq!(conv.leading_system_count(), 2);
    }

    #[test]
    fn leading_system_count_stops_at_first_turn() {
        let mut conv = Conversation::seeded(["rules"]);
        conv.push(Message::user("hi"));
        conv.push(Message::system("retrieved"));
        assert_eq!(conv.leading_system_count(), 1);
    }

    #[test]
    fn conversation_serialises_as_plain_list() {
        let mut conv = Conversation::seeded(["rules"]);
        conv.push(Message::user("Do you have laptops?"));

        let json = serde_json::to_value(&conv).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "system", "content": "rules"},
                {"role": "user", "content": "Do you have laptops?"},
            ])
        );

        let back: Conversation = serde_json::from_value(json).unwrap();
        assert_eq!(back, conv);
    }
}
