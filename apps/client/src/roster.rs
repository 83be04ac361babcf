//! Left-hand user list: every profile except the signed-in user, filtered by
//! a local search term.

use chat_proto::{collections, Document, User};
use tokio::sync::watch;

use crate::gateway::{Gateway, Subscription};
use crate::store::SessionStore;

pub const EMPTY_ROSTER_LABEL: &str = "No users found.";

pub struct Roster {
    store: SessionStore,
    users: watch::Receiver<Vec<User>>,
    search: String,
    _subscription: Subscription,
}

impl Roster {
    pub fn open(gateway: &dyn Gateway, store: SessionStore) -> Self {
        let (tx, rx) = watch::channel(Vec::new());
        let subscription = gateway.subscribe_collection(
            collections::USERS,
            Box::new(move |documents| {
                tx.send_replace(decode_users(documents));
            }),
        );

        Self {
            store,
            users: rx,
            search: String::new(),
            _subscription: subscription,
        }
    }

    /// All known users except the signed-in one, in backend order.
    pub fn entries(&self) -> Vec<User> {
        let me = self.store.current_user_id();
        self.users
            .borrow()
            .iter()
            .filter(|user| Some(user.id.as_str()) != me.as_deref())
            .cloned()
            .collect()
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn visible(&self) -> Vec<User> {
        self.entries()
            .into_iter()
            .filter(|user| matches_search(user, &self.search))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.visible().is_empty()
    }

    pub fn select(&self, user_id: &str) {
        tracing::debug!(component = "roster", peer_id = %user_id, "peer selected");
        self.store.select_peer(Some(user_id.to_string()));
    }

    /// Resolves after the next roster push; false once the backend is gone.
    pub async fn changed(&mut self) -> bool {
        self.users.changed().await.is_ok()
    }
}

/// Case-insensitive substring match on name or email. A blank term matches.
pub fn matches_search(user: &User, term: &str) -> bool {
    // Whitespace-only input counts as an empty search box, not as a filter on " ".
    if term.trim().is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    [user.name.as_deref(), user.email.as_deref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

fn decode_users(documents: Vec<Document>) -> Vec<User> {
    documents
        .iter()
        .filter_map(|doc| match User::from_document(doc) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(
                    component = "roster",
                    user_id = %doc.id,
                    error = %e,
                    "skipping malformed profile"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AuthProvider, MemoryGateway, Session};
    use chat_proto::to_fields;

    fn user(id: &str, name: &str, email: &str) -> User {
        User {
            id: id.into(),
            name: Some(name.into()),
            email: Some(email.into()),
            photo_url: None,
        }
    }

    async fn seed(gateway: &MemoryGateway) {
        for u in [
            user("me", "Me", "me@x.com"),
            user("u1", "John", "john@x.com"),
            user("u2", "", "joe@x.com"),
            user("u3", "Amy", "amy@x.com"),
        ] {
            gateway
                .set_document(collections::USERS, &u.id, to_fields(&u).expect("fields"), false)
                .await
                .expect("seed profile");
        }
    }

    fn signed_in(store: &SessionStore, uid: &str) {
        store.set_current_user(Some(Session {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            provider: AuthProvider::Password,
        }));
    }

    fn ids(users: Vec<User>) -> Vec<String> {
        users.into_iter().map(|u| u.id).collect()
    }

    #[tokio::test]
    async fn excludes_the_signed_in_user() {
        let gateway = MemoryGateway::new();
        seed(&gateway).await;
        let store = SessionStore::new();
        signed_in(&store, "me");

        let roster = Roster::open(&gateway, store.clone());
        assert_eq!(ids(roster.entries()), vec!["u1", "u2", "u3"]);

        signed_in(&store, "u3");
        assert_eq!(ids(roster.entries()), vec!["me", "u1", "u2"]);
    }

    #[tokio::test]
    async fn search_matches_name_or_email() {
        let gateway = MemoryGateway::new();
        seed(&gateway).await;
        let store = SessionStore::new();
        signed_in(&store, "me");

        let mut roster = Roster::open(&gateway, store);
        roster.set_search("jo");
        assert_eq!(ids(roster.visible()), vec!["u1", "u2"]);

        roster.set_search("JOHN@");
        assert_eq!(ids(roster.visible()), vec!["u1"]);

        roster.set_search("zzz");
        assert!(roster.is_empty());

        roster.set_search("  ");
        assert_eq!(roster.visible().len(), 3);
    }

    #[tokio::test]
    async fn self_stays_hidden_when_the_filter_matches_it() {
        let gateway = MemoryGateway::new();
        seed(&gateway).await;
        let store = SessionStore::new();
        signed_in(&store, "me");

        let mut roster = Roster::open(&gateway, store);
        for term in ["", "x.com", "me", "ME@X", "  "] {
            roster.set_search(term);
            assert!(
                roster.visible().iter().all(|u| u.id != "me"),
                "signed-in user listed for {:?}",
                term
            );
        }

        roster.set_search("me@x.com");
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn pushes_replace_list_and_selection_reaches_store() {
        let gateway = MemoryGateway::new();
        let store = SessionStore::new();
        let mut roster = Roster::open(&gateway, store.clone());
        assert!(roster.is_empty());

        seed(&gateway).await;
        assert!(roster.changed().await);
        assert_eq!(roster.entries().len(), 4);

        roster.select("u1");
        assert_eq!(store.selected_peer_id().as_deref(), Some("u1"));

        drop(roster);
        assert_eq!(gateway.listener_count(), 0);
    }
}
