use chat_proto::{Conversation, Message, MessageRecord};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::gateway::{Gateway, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bubble {
    pub id: String,
    pub text: String,
    pub alignment: Alignment,
    pub time_label: String,
}

/// Map raw records to messages in display order.
///
/// Pending writes carry no server timestamp yet and take `now`, which keeps
/// them at the bottom until the resolved snapshot arrives. The sort is stable
/// so equal timestamps keep delivery order.
pub fn normalize(records: Vec<(String, MessageRecord)>, now: DateTime<Utc>) -> Vec<Message> {
    let mut messages: Vec<Message> = records
        .into_iter()
        .map(|(id, record)| Message::from_record(id, record, now))
        .collect();
    messages.sort_by_key(|m| m.timestamp);
    messages
}

pub fn time_label(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

/// Live, ordered message list of one conversation.
pub struct MessageStream {
    conversation: Conversation,
    messages: watch::Receiver<Vec<Message>>,
    subscription: Subscription,
}

impl MessageStream {
    pub fn open(gateway: &dyn Gateway, conversation: Conversation) -> Self {
        let (tx, rx) = watch::channel(Vec::new());
        let subscription = gateway.subscribe_messages(
            conversation.id(),
            Box::new(move |records| {
                tx.send_replace(normalize(records, Utc::now()));
            }),
        );
        tracing::debug!(
            component = "messaging.stream",
            conversation_id = %conversation.id(),
            "message stream opened"
        );

        Self {
            conversation,
            messages: rx,
            subscription,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn bubbles(&self, me: &str) -> Vec<Bubble> {
        self.messages
            .borrow()
            .iter()
            .map(|m| Bubble {
                id: m.id.clone(),
                text: m.text.clone(),
                alignment: if m.is_from(me) {
                    Alignment::Outgoing
                } else {
                    Alignment::Incoming
                },
                time_label: time_label(m.timestamp),
            })
            .collect()
    }

    /// Id of the newest message, the element to keep in view after a push.
    pub fn scroll_anchor(&self) -> Option<String> {
        self.messages.borrow().last().map(|m| m.id.clone())
    }

    pub async fn changed(&mut self) -> bool {
        self.messages.changed().await.is_ok()
    }

    pub fn close(self) {
        self.subscription.unsubscribe();
        tracing::debug!(
            component = "messaging.stream",
            conversation_id = %self.conversation.id(),
            "message stream closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use chrono::TimeZone;

    fn record(text: &str, sender: &str, secs: Option<i64>) -> MessageRecord {
        MessageRecord {
            text: text.into(),
            sender_id: sender.into(),
            timestamp: secs.map(|s| Utc.timestamp_opt(s, 0).single().expect("valid timestamp")),
        }
    }

    #[test]
    fn sorts_by_server_timestamp() {
        let records = vec![
            ("c".to_string(), record("three", "a", Some(3))),
            ("a".to_string(), record("one", "a", Some(1))),
            ("b".to_string(), record("two", "b", Some(2))),
        ];
        let ordered = normalize(records, Utc::now());
        let texts: Vec<_> = ordered.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn pending_message_sorts_last() {
        let now = Utc.timestamp_opt(100, 0).single().expect("valid timestamp");
        let records = vec![
            ("p".to_string(), record("pending", "a", None)),
            ("x".to_string(), record("old", "b", Some(5))),
        ];
        let ordered = normalize(records, now);
        assert_eq!(ordered[1].id, "p");
        assert_eq!(ordered[1].timestamp, now);
    }

    #[test]
    fn equal_timestamps_keep_delivery_order() {
        let records = vec![
            ("first".to_string(), record("1", "a", Some(7))),
            ("second".to_string(), record("2", "a", Some(7))),
        ];
        let ids: Vec<_> = normalize(records, Utc::now()).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn stream_tracks_appends_and_aligns_bubbles() {
        let gateway = MemoryGateway::new();
        let alice = gateway.sign_up_email("alice@x.com", "secret1").await.expect("sign up");
        let conversation = Conversation::between(&alice.uid, "bob");

        let mut stream = MessageStream::open(&gateway, conversation.clone());
        assert!(stream.messages().is_empty());
        assert!(stream.scroll_anchor().is_none());

        gateway
            .append_message(&conversation, &alice.uid, "hello")
            .await
            .expect("append");
        assert!(stream.changed().await);

        let bubbles = stream.bubbles(&alice.uid);
        assert_eq!(bubbles.len(), 1);
        assert_eq!(bubbles[0].alignment, Alignment::Outgoing);
        assert_eq!(bubbles[0].time_label.len(), 5);
        assert_eq!(stream.bubbles("bob")[0].alignment, Alignment::Incoming);
        assert_eq!(stream.scroll_anchor(), Some(bubbles[0].id.clone()));

        stream.close();
        assert_eq!(gateway.listener_count(), 0);
    }
}
