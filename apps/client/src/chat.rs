//! Right-hand pane: peer header, message list and composer.
//!
//! Subscriptions are keyed by the store's user and peer. `reconcile` tears
//! down whatever no longer matches and opens what is missing, so at most one
//! profile, presence and message subscription is live at a time.

use std::sync::Arc;
use std::time::Duration;

use chat_proto::{collections, Conversation, PresenceStatus, User};
use serde::Serialize;
use tokio::sync::watch;

use crate::conversation::ConversationSelector;
use crate::gateway::{Gateway, Session, Subscription};
use crate::messaging::{Bubble, Composer, MessageStream, SendOutcome};
use crate::notify::Notifier;
use crate::presence::{go_offline, PeerPresence, TypingState};
use crate::store::SessionStore;

pub const NO_PEER_PLACEHOLDER: &str = "Select a user to start chatting";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatHeader {
    pub title: String,
    pub photo_url: Option<String>,
    pub avatar_initial: Option<char>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatScreen {
    Placeholder {
        message: String,
    },
    Conversation {
        header: ChatHeader,
        bubbles: Vec<Bubble>,
        composer_text: String,
        can_send: bool,
        scroll_anchor: Option<String>,
    },
}

struct PeerSubscription {
    peer_id: String,
    profile: watch::Receiver<Option<User>>,
    presence: PeerPresence,
    _profile_subscription: Subscription,
}

impl PeerSubscription {
    fn open(gateway: &dyn Gateway, peer_id: &str) -> Self {
        let (tx, rx) = watch::channel(None);
        let scope = peer_id.to_string();
        let profile_subscription = gateway.subscribe_document(
            collections::USERS,
            peer_id,
            Box::new(move |doc| {
                let user = doc.and_then(|doc| match User::from_document(&doc) {
                    Ok(user) => Some(user),
                    Err(e) => {
                        tracing::warn!(
                            component = "chat",
                            peer_id = %scope,
                            error = %e,
                            "ignoring malformed peer profile"
                        );
                        None
                    }
                });
                tx.send_replace(user);
            }),
        );

        Self {
            peer_id: peer_id.to_string(),
            profile: rx,
            presence: PeerPresence::watch(gateway, peer_id),
            _profile_subscription: profile_subscription,
        }
    }
}

pub struct ChatView {
    gateway: Arc<dyn Gateway>,
    store: SessionStore,
    user_rx: watch::Receiver<Option<Session>>,
    peer_rx: watch::Receiver<Option<String>>,
    user_id: Option<String>,
    peer: Option<PeerSubscription>,
    selector: ConversationSelector,
    stream: Option<MessageStream>,
    composer: Composer,
}

impl ChatView {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: SessionStore,
        notifier: Notifier,
        typing_idle: Duration,
    ) -> Self {
        let composer = Composer::new(Arc::clone(&gateway), notifier, typing_idle);
        let mut view = Self {
            user_rx: store.watch_user(),
            peer_rx: store.watch_peer(),
            gateway,
            store,
            user_id: None,
            peer: None,
            selector: ConversationSelector::new(),
            stream: None,
            composer,
        };
        view.reconcile();
        view
    }

    /// Bring subscriptions in line with the store's current user and peer.
    pub fn reconcile(&mut self) {
        let user_id = self.store.current_user_id();
        let peer_id = self.store.selected_peer_id();

        if self.user_id != user_id {
            self.composer.cancel_typing();
            self.user_id = user_id.clone();
        }

        if self.peer.as_ref().map(|p| p.peer_id.as_str()) != peer_id.as_deref() {
            self.peer = peer_id
                .as_deref()
                .map(|id| PeerSubscription::open(self.gateway.as_ref(), id));
        }

        if self.selector.update(user_id.as_deref(), peer_id.as_deref()) {
            if let Some(stream) = self.stream.take() {
                stream.close();
            }
            self.stream = self
                .selector
                .current()
                .cloned()
                .map(|conversation| MessageStream::open(self.gateway.as_ref(), conversation));
        }
    }

    /// Wait for the next store change and reconcile; false once the store is gone.
    pub async fn changed(&mut self) -> bool {
        let alive = tokio::select! {
            r = self.user_rx.changed() => r.is_ok(),
            r = self.peer_rx.changed() => r.is_ok(),
        };
        self.reconcile();
        alive
    }

    pub fn peer(&self) -> Option<User> {
        self.peer.as_ref().and_then(|p| p.profile.borrow().clone())
    }

    pub fn peer_status(&self) -> PresenceStatus {
        self.peer
            .as_ref()
            .map(|p| p.presence.status())
            .unwrap_or(PresenceStatus::Offline)
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.selector.current()
    }

    pub fn has_message_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn typing_state(&self) -> TypingState {
        self.composer.typing_state()
    }

    pub fn screen(&self) -> ChatScreen {
        let Some(peer) = self.peer() else {
            return ChatScreen::Placeholder {
                message: NO_PEER_PLACEHOLDER.to_string(),
            };
        };
        let me = self.user_id.as_deref().unwrap_or_default();

        ChatScreen::Conversation {
            header: ChatHeader {
                title: peer.header_title().to_string(),
                photo_url: peer.photo().map(str::to_string),
                avatar_initial: peer.avatar_initial(),
                status: self.peer_status().label().to_string(),
            },
            bubbles: self
                .stream
                .as_ref()
                .map(|s| s.bubbles(me))
                .unwrap_or_default(),
            composer_text: self.composer.text().to_string(),
            can_send: self.composer.can_send(),
            scroll_anchor: self.stream.as_ref().and_then(MessageStream::scroll_anchor),
        }
    }

    pub async fn input(&mut self, value: impl Into<String>) {
        self.composer.input(value, self.user_id.as_deref()).await;
    }

    pub async fn send(&mut self) -> SendOutcome {
        let peer_id = self.peer.as_ref().map(|p| p.peer_id.clone());
        self.composer
            .send(
                self.selector.current(),
                self.user_id.as_deref(),
                peer_id.as_deref(),
            )
            .await
    }

    /// Always completes; backend failures are logged and the store is
    /// cleared regardless.
    pub async fn logout(&mut self) {
        self.composer.cancel_typing();
        if let Some(user_id) = self.store.current_user_id() {
            go_offline(self.gateway.as_ref(), &user_id).await;
        }
        if let Err(e) = self.gateway.sign_out().await {
            tracing::warn!(component = "chat", error = %e, "sign-out failed");
        }
        // The session listener normally clears this; a failed sign-out never
        // notifies it, and logout must still leave the chat screen.
        self.store.set_current_user(None);
        self.reconcile();
        tracing::info!(component = "chat", "logged out");
    }
}
