pub mod conversation;
pub mod document;
pub mod message;
pub mod presence;
pub mod user;

pub use conversation::{Conversation, ConversationId, ConversationRecord};
pub use document::{server_timestamp, to_fields, Document, Fields};
pub use message::{Message, MessageRecord};
pub use presence::{PresenceRecord, PresenceStatus};
pub use user::User;

/// Collection names used by the document store.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PRESENCE: &str = "isOnline";
    pub const CHATS: &str = "chats";
    pub const MESSAGES: &str = "messages";

    /// Path of the message sub-collection owned by one conversation.
    pub fn messages(conversation_id: &str) -> String {
        format!("{}/{}/{}", CHATS, conversation_id, MESSAGES)
    }

}
