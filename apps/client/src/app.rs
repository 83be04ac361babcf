use std::sync::Arc;

use tokio::sync::broadcast;

use crate::auth::AuthFlows;
use crate::chat::ChatView;
use crate::config::ClientConfig;
use crate::gateway::{Gateway, Subscription};
use crate::notify::{Notice, Notifier};
use crate::roster::Roster;
use crate::store::SessionStore;

/// Root owner: the store, the notice channel and the auth-state listener
/// that keeps the store's user in sync with the backend session.
pub struct ChatApp {
    gateway: Arc<dyn Gateway>,
    config: ClientConfig,
    store: SessionStore,
    notifier: Notifier,
    _session_listener: Subscription,
}

impl ChatApp {
    pub fn new(gateway: Arc<dyn Gateway>, config: ClientConfig) -> Self {
        let store = SessionStore::new();
        let notifier = Notifier::new(config.notice_capacity);

        let sink = store.clone();
        let session_listener = gateway.on_session_change(Box::new(move |session| {
            tracing::debug!(
                component = "app",
                uid = session.as_ref().map(|s| s.uid.as_str()).unwrap_or("-"),
                "auth state changed"
            );
            sink.set_current_user(session);
        }));

        tracing::info!(
            component = "app",
            typing_idle_ms = config.typing_idle.as_millis() as u64,
            "chat client ready"
        );

        Self {
            gateway,
            config,
            store,
            notifier,
            _session_listener: session_listener,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn auth(&self) -> AuthFlows {
        AuthFlows::new(Arc::clone(&self.gateway), self.notifier.clone())
    }

    pub fn roster(&self) -> Roster {
        Roster::open(self.gateway.as_ref(), self.store.clone())
    }

    pub fn chat_view(&self) -> ChatView {
        ChatView::new(
            Arc::clone(&self.gateway),
            self.store.clone(),
            self.notifier.clone(),
            self.config.typing_idle,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatScreen;
    use crate::gateway::MemoryGateway;
    use crate::messaging::SendOutcome;
    use crate::notify::NoticeLevel;

    #[tokio::test]
    async fn session_listener_drives_the_store() {
        let gateway = MemoryGateway::new();
        let app = ChatApp::new(Arc::new(gateway.clone()), ClientConfig::default());
        assert!(app.store().current_user().is_none());

        let session = app.auth().sign_up("ann@x.com", "secret1").await.expect("sign up");
        assert_eq!(app.store().current_user_id(), Some(session.uid));

        gateway.sign_out().await.expect("sign out");
        assert!(app.store().current_user().is_none());
    }

    #[tokio::test]
    async fn two_users_exchange_a_message() {
        let gateway = MemoryGateway::new();
        let app = ChatApp::new(Arc::new(gateway.clone()), ClientConfig::default());
        let mut notices = app.notices();

        let bob = app.auth().sign_up("bob@x.com", "secret1").await.expect("bob");
        let ann = app.auth().sign_up("ann@x.com", "secret1").await.expect("ann");
        assert_eq!(notices.recv().await.expect("notice").level, NoticeLevel::Success);

        let mut roster = app.roster();
        roster.set_search("bob");
        let visible = roster.visible();
        assert_eq!(visible.len(), 1);
        roster.select(&visible[0].id);

        let mut chat = app.chat_view();
        assert!(matches!(chat.screen(), ChatScreen::Conversation { .. }));
        chat.input("hi bob").await;
        assert_eq!(chat.send().await, SendOutcome::Sent);

        let conversation = chat.conversation().cloned().expect("conversation");
        assert!(conversation.includes(&ann.uid));
        assert_eq!(conversation.peer_of(&ann.uid), Some(bob.uid.as_str()));

        chat.logout().await;
        assert!(app.store().current_user().is_none());
        assert!(matches!(chat.screen(), ChatScreen::Placeholder { .. }));
    }

    #[tokio::test]
    async fn dropping_the_app_detaches_its_listener() {
        let gateway = MemoryGateway::new();
        let app = ChatApp::new(Arc::new(gateway.clone()), ClientConfig::default());
        let store = app.store().clone();
        drop(app);

        gateway
            .sign_up_email("ann@x.com", "secret1")
            .await
            .expect("sign up");
        assert!(store.current_user().is_none());
    }
}
