//! Conversation types and message-log management

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id given to the seed greeting that opens every conversation
pub const SEED_MESSAGE_ID: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// Feedback a user can leave on an assistant message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Like,
    Dislike,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub disliked: bool,
}

impl Message {
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::User,
            liked: false,
            disliked: false,
        }
    }

    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::Assistant,
            liked: false,
            disliked: false,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }

    /// Returns a copy of this message with the feedback flag toggled.
    ///
    /// Setting one flag always clears the other, so `liked` and `disliked`
    /// are never both true.
    pub fn with_feedback(&self, kind: Feedback) -> Self {
        let (liked, disliked) = match kind {
            Feedback::Like => (!self.liked, false),
            Feedback::Dislike => (false, !self.disliked),
        };
        Self {
            liked,
            disliked,
            ..self.clone()
        }
    }
}

/// Ordered message log of a single mounted chat session
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    messages: Vec<Message>,
    #[serde(skip)]
    last_stamp: i64,
}

impl Conversation {
    /// Start a conversation seeded with one assistant greeting
    pub fn new(greeting: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: vec![Message::assistant(SEED_MESSAGE_ID, greeting)],
            last_stamp: 1,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn add_user(&mut self, text: &str) -> &Message {
        let id = self.next_id();
        self.push(Message::user(id, text))
    }

    pub fn add_assistant(&mut self, text: &str) -> &Message {
        let id = self.next_id();
        self.push(Message::assistant(id, text))
    }

    /// Toggle feedback on an assistant message.
    ///
    /// Returns `false` when the id is unknown or names a user message; the
    /// log is left untouched in that case.
    pub fn apply_feedback(&mut self, id: &str, kind: Feedback) -> bool {
        let Some(slot) = self
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.is_assistant())
        else {
            return false;
        };
        *slot = slot.with_feedback(kind);
        true
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    // Millisecond timestamps, bumped past the previous id on collision.
    fn next_id(&mut self) -> String {
        let stamp = Utc::now().timestamp_millis().max(self.last_stamp + 1);
        self.last_stamp = stamp;
        stamp.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_has_seed_greeting() {
        let conversation = Conversation::new("Hello!");
        assert_eq!(conversation.messages().len(), 1);

        let seed = &conversation.messages()[0];
        assert_eq!(seed.id, SEED_MESSAGE_ID);
        assert_eq!(seed.sender, Sender::Assistant);
        assert_eq!(seed.text, "Hello!");
        assert!(!seed.liked && !seed.disliked);
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut conversation = Conversation::new("Hello!");
        for i in 0..50 {
            conversation.add_user(&format!("message {}", i));
        }

        let stamps: Vec<i64> = conversation
            .messages()
            .iter()
            .map(|m| m.id.parse().unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_like_toggles_back_off() {
        let mut conversation = Conversation::new("Hello!");

        assert!(conversation.apply_feedback(SEED_MESSAGE_ID, Feedback::Like));
        assert!(conversation.get(SEED_MESSAGE_ID).unwrap().liked);

        assert!(conversation.apply_feedback(SEED_MESSAGE_ID, Feedback::Like));
        let seed = conversation.get(SEED_MESSAGE_ID).unwrap();
        assert!(!seed.liked);
        assert!(!seed.disliked);
    }

    #[test]
    fn test_like_and_dislike_are_exclusive() {
        let mut conversation = Conversation::new("Hello!");

        conversation.apply_feedback(SEED_MESSAGE_ID, Feedback::Like);
        conversation.apply_feedback(SEED_MESSAGE_ID, Feedback::Dislike);
        let seed = conversation.get(SEED_MESSAGE_ID).unwrap();
        assert!(!seed.liked);
        assert!(seed.disliked);

        conversation.apply_feedback(SEED_MESSAGE_ID, Feedback::Like);
        let seed = conversation.get(SEED_MESSAGE_ID).unwrap();
        assert!(seed.liked);
        assert!(!seed.disliked);
    }

    #[test]
    fn test_feedback_ignores_user_and_unknown_messages() {
        let mut conversation = Conversation::new("Hello!");
        let user_id = conversation.add_user("hi").id.clone();
        let before = conversation.messages().to_vec();

        assert!(!conversation.apply_feedback(&user_id, Feedback::Like));
        assert!(!conversation.apply_feedback("no-such-id", Feedback::Dislike));
        assert_eq!(conversation.messages(), before.as_slice());
    }

    #[test]
    fn test_message_serializes_lowercase_sender() {
        let message = Message::assistant("7", "Hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["sender"], "assistant");
        assert_eq!(json["liked"], false);
    }
}
