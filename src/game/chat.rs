//! Chat Log
//!
//! Bounded, append-only log shared by player messages and the
//! flavor lines generated for each successful action.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::StateHasher;
use crate::core::time::Timestamp;
use crate::game::state::UserId;

/// Maximum number of messages kept. Oldest are evicted first.
pub const CHAT_CAPACITY: usize = 10;

/// A single chat line. Never modified after it is appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Author
    pub user_id: UserId,
    /// Text
    pub message: String,
    /// When it was posted
    pub date: Timestamp,
}

impl ChatMessage {
    /// Create a message.
    pub fn new(user_id: UserId, message: impl Into<String>, date: Timestamp) -> Self {
        Self {
            user_id,
            message: message.into(),
            date,
        }
    }
}

/// Chat validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// User id was missing or blank.
    #[error("Missing userId")]
    MissingUser,

    /// Message body was missing or blank.
    #[error("Missing message")]
    MissingMessage,
}

/// Validate a direct chat submission.
pub fn validate_chat(user_id: &str, message: &str) -> Result<ChatMessageDraft, ChatError> {
    let user_id = UserId::parse(user_id).ok_or(ChatError::MissingUser)?;
    if message.trim().is_empty() {
        return Err(ChatError::MissingMessage);
    }
    Ok(ChatMessageDraft {
        user_id,
        message: message.to_string(),
    })
}

/// A validated chat submission still waiting for its timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessageDraft {
    /// Author
    pub user_id: UserId,
    /// Text
    pub message: String,
}

impl ChatMessageDraft {
    /// Stamp the draft.
    pub fn stamp(self, date: Timestamp) -> ChatMessage {
        ChatMessage::new(self.user_id, self.message, date)
    }
}

/// Bounded chat history, oldest first.
///
/// Serializes as a plain JSON array. Deserializing an over-long
/// array keeps only the newest `CHAT_CAPACITY` entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ChatMessage>", into = "Vec<ChatMessage>")]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail, evicting from the head past capacity.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        if self.messages.len() > CHAT_CAPACITY {
            let excess = self.messages.len() - CHAT_CAPACITY;
            self.messages.drain(..excess);
        }
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Is the log empty?
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Most recent message.
    pub fn latest(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Hash the log into a world hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.messages.len() as u64);
        for msg in &self.messages {
            hasher.update_str(msg.user_id.as_str());
            hasher.update_str(&msg.message);
            hasher.update_i64(msg.date);
        }
    }
}

impl From<Vec<ChatMessage>> for ChatLog {
    fn from(messages: Vec<ChatMessage>) -> Self {
        let mut log = Self { messages };
        log.enforce_capacity();
        log
    }
}

impl From<ChatLog> for Vec<ChatMessage> {
    fn from(log: ChatLog) -> Self {
        log.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn msg(n: i64) -> ChatMessage {
        ChatMessage::new(UserId::parse("tester").unwrap(), format!("msg {}", n), n)
    }

    #[test]
    fn test_append_under_capacity() {
        let mut log = ChatLog::new();
        for i in 0..5 {
            log.append(msg(i));
        }
        assert_eq!(log.len(), 5);
        assert_eq!(log.messages()[0].date, 0);
        assert_eq!(log.latest().unwrap().date, 4);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut log = ChatLog::new();
        for i in 0..CHAT_CAPACITY as i64 {
            log.append(msg(i));
        }
        assert_eq!(log.len(), CHAT_CAPACITY);

        log.append(msg(100));
        assert_eq!(log.len(), CHAT_CAPACITY);
        assert_eq!(log.messages()[0].date, 1);
        assert_eq!(log.latest().unwrap().date, 100);
    }

    #[test]
    fn test_overlong_snapshot_is_trimmed() {
        let raw: Vec<ChatMessage> = (0..15).map(msg).collect();
        let json = serde_json::to_string(&raw).unwrap();
        let log: ChatLog = serde_json::from_str(&json).unwrap();

        assert_eq!(log.len(), CHAT_CAPACITY);
        assert_eq!(log.messages()[0].date, 5);
    }

    #[test]
    fn test_serializes_as_array() {
        let mut log = ChatLog::new();
        log.append(msg(7));
        let json = serde_json::to_value(&log).unwrap();

        assert!(json.is_array());
        assert_eq!(json[0]["userId"], "tester");
        assert_eq!(json[0]["date"], 7);
    }

    #[test]
    fn test_validate_chat() {
        assert_eq!(validate_chat("", "hi"), Err(ChatError::MissingUser));
        assert_eq!(validate_chat("bob", "  "), Err(ChatError::MissingMessage));

        let draft = validate_chat("bob", "warm in here").unwrap();
        let stamped = draft.stamp(99);
        assert_eq!(stamped.user_id.as_str(), "bob");
        assert_eq!(stamped.message, "warm in here");
        assert_eq!(stamped.date, 99);
    }

    proptest! {
        #[test]
        fn prop_capacity_never_exceeded(count in 0usize..40) {
            let mut log = ChatLog::new();
            for i in 0..count {
                log.append(msg(i as i64));
                prop_assert!(log.len() <= CHAT_CAPACITY);
            }
            if count > 0 {
                prop_assert_eq!(log.latest().unwrap().date, count as i64 - 1);
                let first = count.saturating_sub(CHAT_CAPACITY) as i64;
                prop_assert_eq!(log.messages()[0].date, first);
            }
        }
    }
}
