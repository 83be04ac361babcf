//! Seam between the client and the managed auth/document-store backend.
//!
//! Every listener follows snapshot semantics: the callback receives the full
//! current state of what it watches, once right away and again after every
//! change, until the returned [`Subscription`] is disposed.

mod accounts;
pub mod error;
pub mod memory;
mod subscription;

use async_trait::async_trait;
use chat_proto::{collections, Conversation, ConversationId, Document, Fields, MessageRecord, User};
use serde::{Deserialize, Serialize};

pub use error::GatewayError;
pub use memory::{FederatedIdentity, MemoryGateway, WriteRecord};
pub use subscription::Subscription;

pub type GatewayResult<T> = Result<T, GatewayError>;

pub type SessionCallback = Box<dyn Fn(Option<Session>) + Send + Sync>;
pub type CollectionCallback = Box<dyn Fn(Vec<Document>) + Send + Sync>;
pub type DocumentCallback = Box<dyn Fn(Option<Document>) + Send + Sync>;
pub type MessagesCallback = Box<dyn Fn(Vec<(String, MessageRecord)>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Password,
    Federated,
}

/// The signed-in account as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider: AuthProvider,
}

impl Session {
    /// Profile document mirrored into `users/{uid}`.
    pub fn profile(&self) -> User {
        User {
            id: self.uid.clone(),
            name: Some(self.display_name.clone().unwrap_or_default()),
            email: self.email.clone(),
            photo_url: Some(self.photo_url.clone().unwrap_or_default()),
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn sign_up_email(&self, email: &str, password: &str) -> GatewayResult<Session>;

    async fn sign_in_email(&self, email: &str, password: &str) -> GatewayResult<Session>;

    async fn sign_in_federated(&self) -> GatewayResult<Session>;

    async fn sign_out(&self) -> GatewayResult<()>;

    fn current_session(&self) -> Option<Session>;

    fn on_session_change(&self, callback: SessionCallback) -> Subscription;

    async fn get_document(&self, collection: &str, id: &str) -> GatewayResult<Option<Document>>;

    /// `merge` patches only the given top-level fields; otherwise the
    /// document is replaced.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> GatewayResult<()>;

    fn subscribe_collection(&self, collection: &str, callback: CollectionCallback) -> Subscription;

    fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> Subscription;

    /// Append to `chats/{id}/messages`, creating `chats/{id}` on first use.
    async fn append_message(
        &self,
        conversation: &Conversation,
        sender_id: &str,
        text: &str,
    ) -> GatewayResult<()>;

    fn subscribe_messages(
        &self,
        conversation_id: &ConversationId,
        callback: MessagesCallback,
    ) -> Subscription {
        let scope = conversation_id.to_string();
        self.subscribe_collection(
            &collections::messages(conversation_id.as_str()),
            Box::new(move |documents| {
                let records = documents
                    .into_iter()
                    .filter_map(|doc| match doc.decode::<MessageRecord>() {
                        Ok(record) => Some((doc.id, record)),
                        Err(e) => {
                            tracing::warn!(
                                component = "gateway.messages",
                                conversation_id = %scope,
                                message_id = %doc.id,
                                error = %e,
                                "skipping malformed message"
                            );
                            None
                        }
                    })
                    .collect();
                callback(records);
            }),
        )
    }
}
