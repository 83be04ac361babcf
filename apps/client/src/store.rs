//! Cross-view session/selection cache.
//!
//! Created by the application root and handed to each view explicitly. The
//! session listener owns the user slot and the roster selection owns the peer
//! id. One exception: `ChatView::logout` also clears the user, because a
//! failed backend sign-out never reaches the session listener.

use std::sync::Arc;

use tokio::sync::watch;

use crate::gateway::Session;

#[derive(Clone)]
pub struct SessionStore {
    user: Arc<watch::Sender<Option<Session>>>,
    peer: Arc<watch::Sender<Option<String>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        let (peer, _) = watch::channel(None);
        Self {
            user: Arc::new(user),
            peer: Arc::new(peer),
        }
    }

    pub fn current_user(&self) -> Option<Session> {
        self.user.borrow().clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.user.borrow().as_ref().map(|s| s.uid.clone())
    }

    pub fn selected_peer_id(&self) -> Option<String> {
        self.peer.borrow().clone()
    }

    /// Signing out (None) also drops the peer selection.
    pub fn set_current_user(&self, session: Option<Session>) {
        let signed_out = session.is_none();
        set_if_changed(&self.user, session);
        if signed_out {
            self.select_peer(None);
        }
    }

    pub fn select_peer(&self, peer_id: Option<String>) {
        set_if_changed(&self.peer, peer_id);
    }

    pub fn watch_user(&self) -> watch::Receiver<Option<Session>> {
        self.user.subscribe()
    }

    pub fn watch_peer(&self) -> watch::Receiver<Option<String>> {
        self.peer.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn set_if_changed<T: PartialEq>(tx: &watch::Sender<T>, next: T) {
    tx.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
