//! In-process backend implementing [`Gateway`].
//!
//! Behaves like the hosted auth/document service the client is written
//! against: an email/password and federated account table, a signed-in
//! session with listeners, documents grouped by collection path, snapshot
//! listeners on collections and single documents, and a monotonic server
//! clock that resolves [`server_timestamp`] sentinels at write time.
//!
//! With local echo enabled, a write carrying a server timestamp is first
//! delivered to listeners with the timestamp still null, the way a latency
//! compensated client cache reports pending writes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use chat_proto::document::is_server_timestamp;
use chat_proto::{collections, server_timestamp, Conversation, Document, Fields};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use super::accounts::{Account, AccountTable};
use super::{
    AuthProvider, CollectionCallback, DocumentCallback, Gateway, GatewayError, GatewayResult,
    Session, SessionCallback, Subscription,
};

type CollectionFn = dyn Fn(Vec<Document>) + Send + Sync;
type DocumentFn = dyn Fn(Option<Document>) + Send + Sync;
type SessionFn = dyn Fn(Option<Session>) + Send + Sync;

/// Identity returned by the federated provider on the next sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// One accepted `set_document`/`append_message` write, as requested.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub collection: String,
    pub id: String,
    pub fields: Fields,
    pub merge: bool,
}

#[derive(Clone)]
enum Listener {
    Collection {
        collection: String,
        callback: Arc<CollectionFn>,
    },
    Document {
        collection: String,
        id: String,
        callback: Arc<DocumentFn>,
    },
}

impl Listener {
    fn watches(&self, collection: &str, id: &str) -> bool {
        match self {
            Listener::Collection { collection: c, .. } => c == collection,
            Listener::Document {
                collection: c,
                id: d,
                ..
            } => c == collection && d == id,
        }
    }
}

#[derive(Default)]
struct Inner {
    accounts: AccountTable,
    federated: Mutex<Option<FederatedIdentity>>,
    session: Mutex<Option<Session>>,
    session_listeners: DashMap<u64, Arc<SessionFn>>,
    documents: Mutex<BTreeMap<String, BTreeMap<String, Fields>>>,
    listeners: DashMap<u64, Listener>,
    writes: Mutex<Vec<WriteRecord>>,
    next_listener_id: AtomicU64,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
    offline: AtomicBool,
    local_echo: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Inner>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_federated_identity(self, identity: FederatedIdentity) -> Self {
        *lock(&self.inner.federated) = Some(identity);
        self
    }

    pub fn with_local_echo(self, enabled: bool) -> Self {
        self.inner.local_echo.store(enabled, Ordering::SeqCst);
        self
    }

    /// While offline every auth call, read and write fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Stored fields of a document, bypassing the offline switch.
    pub fn document(&self, collection: &str, id: &str) -> Option<Fields> {
        lock(&self.inner.documents)
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        lock(&self.inner.writes).clone()
    }

    pub fn writes_to(&self, collection: &str) -> Vec<WriteRecord> {
        lock(&self.inner.writes)
            .iter()
            .filter(|w| w.collection == collection)
            .cloned()
            .collect()
    }

    /// Live collection/document listeners (session listeners excluded).
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn ensure_online(&self) -> GatewayResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable);
        }
        Ok(())
    }

    fn next_listener_id(&self) -> u64 {
        self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Strictly increasing, so equal wall-clock reads still order writes.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = lock(&self.inner.last_timestamp);
        let now = Utc::now();
        let ts = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(ts);
        ts
    }

    fn start_session(&self, account: Account, provider: AuthProvider) -> Session {
        let session = Session {
            uid: account.uid,
            email: Some(account.email),
            display_name: account.display_name,
            photo_url: account.photo_url,
            provider,
        };
        *lock(&self.inner.session) = Some(session.clone());
        self.notify_session(Some(session.clone()));
        session
    }

    fn notify_session(&self, session: Option<Session>) {
        let callbacks: Vec<Arc<SessionFn>> = self
            .inner
            .session_listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for callback in callbacks {
            callback(session.clone());
        }
    }

    fn read(&self, collection: &str, id: &str) -> Option<Document> {
        self.document(collection, id)
            .map(|fields| Document::new(id, fields))
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        lock(&self.inner.documents)
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Store a write, resolving server timestamps, then fan out snapshots.
    fn commit(&self, collection: &str, id: &str, fields: Fields, merge: bool) {
        lock(&self.inner.writes).push(WriteRecord {
            collection: collection.to_string(),
            id: id.to_string(),
            fields: fields.clone(),
            merge,
        });

        let pending = fields.values().any(is_server_timestamp);
        if pending && self.inner.local_echo.load(Ordering::SeqCst) {
            self.apply(collection, id, resolve_timestamps(&fields, Value::Null), merge);
            self.notify(collection, id);
        }

        let resolved = if pending {
            let stamp = self
                .next_timestamp()
                .to_rfc3339_opts(SecondsFormat::Micros, true);
            resolve_timestamps(&fields, Value::String(stamp))
        } else {
            fields
        };
        self.apply(collection, id, resolved, merge);
        self.notify(collection, id);
    }

    fn apply(&self, collection: &str, id: &str, fields: Fields, merge: bool) {
        let mut documents = lock(&self.inner.documents);
        let entry = documents
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        if merge {
            entry.extend(fields);
        } else {
            *entry = fields;
        }
    }

    // Callbacks run with no lock held; they may subscribe or write.
    fn notify(&self, collection: &str, id: &str) {
        let targets: Vec<(u64, Listener)> = self
            .inner
            .listeners
            .iter()
            .filter(|entry| entry.value().watches(collection, id))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (listener_id, listener) in targets {
            if !self.inner.listeners.contains_key(&listener_id) {
                continue;
            }
            self.deliver(&listener);
        }
    }

    fn deliver(&self, listener: &Listener) {
        match listener {
            Listener::Collection {
                collection,
                callback,
            } => callback(self.snapshot(collection)),
            Listener::Document {
                collection,
                id,
                callback,
            } => callback(self.read(collection, id)),
        }
    }

    fn register(&self, listener: Listener) -> Subscription {
        let listener_id = self.next_listener_id();
        self.inner.listeners.insert(listener_id, listener.clone());
        self.deliver(&listener);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.remove(&listener_id);
            }
        })
    }
}

fn resolve_timestamps(fields: &Fields, replacement: Value) -> Fields {
    fields
        .iter()
        .map(|(key, value)| {
            let value = if is_server_timestamp(value) {
                replacement.clone()
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn sign_up_email(&self, email: &str, password: &str) -> GatewayResult<Session> {
        self.ensure_online()?;
        let account = self.inner.accounts.create(email, password)?;
        tracing::info!(component = "gateway.auth", uid = %account.uid, "account created");
        Ok(self.start_session(account, AuthProvider::Password))
    }

    async fn sign_in_email(&self, email: &str, password: &str) -> GatewayResult<Session> {
        self.ensure_online()?;
        let account = self.inner.accounts.authenticate(email, password)?;
        Ok(self.start_session(account, AuthProvider::Password))
    }

    async fn sign_in_federated(&self) -> GatewayResult<Session> {
        self.ensure_online()?;
        let identity = lock(&self.inner.federated)
            .clone()
            .ok_or(GatewayError::ProviderUnavailable)?;
        let account = self.inner.accounts.link_federated(
            &identity.email,
            identity.display_name,
            identity.photo_url,
        );
        Ok(self.start_session(account, AuthProvider::Federated))
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        self.ensure_online()?;
        let previous = lock(&self.inner.session).take();
        if previous.is_some() {
            self.notify_session(None);
        }
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        lock(&self.inner.session).clone()
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        let listener_id = self.next_listener_id();
        let callback: Arc<SessionFn> = Arc::from(callback);
        self.inner
            .session_listeners
            .insert(listener_id, callback.clone());
        callback(self.current_session());

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.session_listeners.remove(&listener_id);
            }
        })
    }

    async fn get_document(&self, collection: &str, id: &str) -> GatewayResult<Option<Document>> {
        self.ensure_online()?;
        Ok(self.read(collection, id))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> GatewayResult<()> {
        self.ensure_online()?;
        self.commit(collection, id, fields, merge);
        Ok(())
    }

    fn subscribe_collection(&self, collection: &str, callback: CollectionCallback) -> Subscription {
        self.register(Listener::Collection {
            collection: collection.to_string(),
            callback: Arc::from(callback),
        })
    }

    fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> Subscription {
        self.register(Listener::Document {
            collection: collection.to_string(),
            id: id.to_string(),
            callback: Arc::from(callback),
        })
    }

    async fn append_message(
        &self,
        conversation: &Conversation,
        sender_id: &str,
        text: &str,
    ) -> GatewayResult<()> {
        self.ensure_online()?;
        let session = self.current_session().ok_or(GatewayError::NotSignedIn)?;
        if session.uid != sender_id {
            return Err(GatewayError::Rejected(
                "sender does not match the signed-in user".to_string(),
            ));
        }
        let peer_id = conversation.peer_of(sender_id).ok_or_else(|| {
            GatewayError::Rejected("sender is not a participant".to_string())
        })?;

        let chat_id = conversation.id().as_str();
        let exists = self.read(collections::CHATS, chat_id).is_some();
        let mut chat = Fields::new();
        if !exists {
            chat.insert(
                "users".to_string(),
                Value::from(vec![sender_id.to_string(), peer_id.to_string()]),
            );
        }
        chat.insert("lastMessage".to_string(), Value::from(text));
        chat.insert("lastMessageTimestamp".to_string(), server_timestamp());
        self.commit(collections::CHATS, chat_id, chat, exists);

        let message_id = Uuid::new_v4().simple().to_string();
        let message = Fields::from_iter([
            ("text".to_string(), Value::from(text)),
            ("senderId".to_string(), Value::from(sender_id)),
            ("timestamp".to_string(), server_timestamp()),
        ]);
        self.commit(&collections::messages(chat_id), &message_id, message, false);

        tracing::debug!(
            component = "gateway.messages",
            conversation_id = %chat_id,
            message_id = %message_id,
            "message appended"
        );
        Ok(())
    }
}
