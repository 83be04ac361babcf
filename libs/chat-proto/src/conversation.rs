use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pairing key shared by both participants: `min(a,b)-max(a,b)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn between(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}-{}", low, high))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A derived conversation plus the participant ids it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    id: ConversationId,
    participants: [String; 2],
}

impl Conversation {
    pub fn between(a: &str, b: &str) -> Self {
        let mut participants = [a.to_string(), b.to_string()];
        participants.sort();
        Self {
            id: ConversationId::between(a, b),
            participants,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn participants(&self) -> &[String; 2] {
        &self.participants
    }

    pub fn includes(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The other participant, if `user_id` takes part at all.
    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        match &self.participants {
            [a, b] if a == user_id => Some(b.as_str()),
            [a, b] if b == user_id => Some(a.as_str()),
            _ => None,
        }
    }
}

/// Stored under `chats/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub users: Vec<String>,
    pub last_message: String,
    #[serde(default)]
    pub last_message_timestamp: Option<DateTime<Utc>>,
}
