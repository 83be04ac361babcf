use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Fields;

/// Online/typing flag pair stored under `isOnline/{user_id}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub is_typing: bool,
}

impl PresenceRecord {
    pub const fn new(is_online: bool, is_typing: bool) -> Self {
        Self {
            is_online,
            is_typing,
        }
    }

    pub const fn signed_in() -> Self {
        Self::new(true, false)
    }

    pub const fn typing() -> Self {
        Self::new(true, true)
    }

    pub const fn idle() -> Self {
        Self::new(true, false)
    }

    /// Written for the peer after a message is delivered to them.
    pub const fn sent() -> Self {
        Self::new(true, false)
    }

    pub const fn offline() -> Self {
        Self::new(false, false)
    }

    /// Both flags as a merge-patch body.
    pub fn to_fields(self) -> Fields {
        Fields::from_iter([
            ("isOnline".to_string(), Value::Bool(self.is_online)),
            ("isTyping".to_string(), Value::Bool(self.is_typing)),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Offline,
    Online,
    Typing,
}

impl PresenceStatus {
    pub fn from_record(record: Option<&PresenceRecord>) -> Self {
        match record {
            Some(r) if r.is_online && r.is_typing => PresenceStatus::Typing,
            Some(r) if r.is_online => PresenceStatus::Online,
            _ => PresenceStatus::Offline,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PresenceStatus::Offline => "Offline",
            PresenceStatus::Online => "Online",
            PresenceStatus::Typing => "Typing...",
        }
    }
}
