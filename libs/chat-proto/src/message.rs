use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message exactly as stored; `timestamp` is null until the server clock
/// resolves a pending write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub text: String,
    pub sender_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn from_record(id: String, record: MessageRecord, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text: record.text,
            sender_id: record.sender_id,
            timestamp: record.timestamp.unwrap_or(now),
        }
    }

    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}
