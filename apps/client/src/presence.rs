//! Presence writes for the local user and presence reads for the peer.
//!
//! The local user's typing flag follows a two-state debounce: every
//! keystroke writes `typing` and restarts a single idle timer; the timer
//! writes `idle` only after a full quiet period. Presence records never
//! expire, so a client that dies while online stays "online".

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chat_proto::{collections, PresenceRecord, PresenceStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::gateway::{Gateway, GatewayResult, Subscription};

pub async fn write_presence(
    gateway: &dyn Gateway,
    user_id: &str,
    record: PresenceRecord,
) -> GatewayResult<()> {
    gateway
        .set_document(collections::PRESENCE, user_id, record.to_fields(), true)
        .await
}

/// Best-effort logout write; failures are logged and swallowed.
pub async fn go_offline(gateway: &dyn Gateway, user_id: &str) {
    if let Err(e) = write_presence(gateway, user_id, PresenceRecord::offline()).await {
        tracing::warn!(
            component = "presence",
            user_id = %user_id,
            error = %e,
            "offline presence write failed"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    Idle,
    Typing,
}

struct TimerSlot {
    state: TypingState,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct TypingInner {
    gateway: Arc<dyn Gateway>,
    user_id: String,
    idle_after: Duration,
    slot: Mutex<TimerSlot>,
    // Held across each presence write so an idle write never overtakes the
    // typing write it follows.
    lane: tokio::sync::Mutex<()>,
}

impl TypingInner {
    fn slot(&self) -> MutexGuard<'_, TimerSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.slot().generation == generation
    }

    async fn write(&self, record: PresenceRecord) {
        if let Err(e) = write_presence(self.gateway.as_ref(), &self.user_id, record).await {
            tracing::warn!(
                component = "presence.typing",
                user_id = %self.user_id,
                is_typing = record.is_typing,
                error = %e,
                "typing presence write failed"
            );
        }
    }

    async fn elapse(&self, generation: u64) {
        let _lane = self.lane.lock().await;
        {
            let mut slot = self.slot();
            if slot.generation != generation {
                return;
            }
            slot.state = TypingState::Idle;
            slot.timer = None;
        }
        self.write(PresenceRecord::idle()).await;
    }
}

/// Typing debounce for one signed-in user. Dropping it cancels the timer.
pub struct TypingTracker {
    inner: Arc<TypingInner>,
}

impl TypingTracker {
    pub fn new(gateway: Arc<dyn Gateway>, user_id: impl Into<String>, idle_after: Duration) -> Self {
        Self {
            inner: Arc::new(TypingInner {
                gateway,
                user_id: user_id.into(),
                idle_after,
                slot: Mutex::new(TimerSlot {
                    state: TypingState::Idle,
                    generation: 0,
                    timer: None,
                }),
                lane: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn state(&self) -> TypingState {
        self.inner.slot().state
    }

    /// Restarts the quiet period from this instant, then writes `typing`.
    pub async fn keystroke(&self) {
        let deadline = Instant::now() + self.inner.idle_after;
        let generation = {
            let mut slot = self.inner.slot();
            slot.state = TypingState::Typing;
            slot.generation += 1;
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }

            let generation = slot.generation;
            let inner = Arc::clone(&self.inner);
            slot.timer = Some(tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                inner.elapse(generation).await;
            }));
            generation
        };

        let _lane = self.inner.lane.lock().await;
        // A newer keystroke already queued its own typing write.
        if self.inner.is_current(generation) {
            self.inner.write(PresenceRecord::typing()).await;
        }
    }

    /// Drop any pending idle write without touching the stored record.
    pub fn cancel(&self) {
        let mut slot = self.inner.slot();
        slot.generation += 1;
        slot.state = TypingState::Idle;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TypingTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Live presence of the selected peer.
pub struct PeerPresence {
    peer_id: String,
    record: watch::Receiver<Option<PresenceRecord>>,
    _subscription: Subscription,
}

impl PeerPresence {
    pub fn watch(gateway: &dyn Gateway, peer_id: &str) -> Self {
        let (tx, rx) = watch::channel(None);
        let scope = peer_id.to_string();
        let subscription = gateway.subscribe_document(
            collections::PRESENCE,
            peer_id,
            Box::new(move |doc| {
                let record = doc.and_then(|doc| match doc.decode::<PresenceRecord>() {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(
                            component = "presence.peer",
                            peer_id = %scope,
                            error = %e,
                            "ignoring malformed presence record"
                        );
                        None
                    }
                });
                tx.send_replace(record);
            }),
        );

        Self {
            peer_id: peer_id.to_string(),
            record: rx,
            _subscription: subscription,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn status(&self) -> PresenceStatus {
        PresenceStatus::from_record(self.record.borrow().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        CollectionCallback, DocumentCallback, MemoryGateway, Session, SessionCallback,
    };
    use async_trait::async_trait;
    use chat_proto::{Conversation, Document, Fields};
    use serde_json::Value;

    /// Delays every write and records when each one was issued.
    struct Laggy {
        backend: MemoryGateway,
        latency: Duration,
        started: Instant,
        issued: Mutex<Vec<(Duration, Value)>>,
    }

    impl Laggy {
        fn new(latency: Duration) -> Self {
            Self {
                backend: MemoryGateway::new(),
                latency,
                started: Instant::now(),
                issued: Mutex::new(Vec::new()),
            }
        }

        fn issued_typing_flags(&self) -> Vec<(u128, Value)> {
            self.issued
                .lock()
                .expect("issued log")
                .iter()
                .map(|(at, fields)| (at.as_millis(), fields["isTyping"].clone()))
                .collect()
        }
    }

    #[async_trait]
    impl Gateway for Laggy {
        async fn sign_up_email(&self, email: &str, password: &str) -> GatewayResult<Session> {
            self.backend.sign_up_email(email, password).await
        }

        async fn sign_in_email(&self, email: &str, password: &str) -> GatewayResult<Session> {
            self.backend.sign_in_email(email, password).await
        }

        async fn sign_in_federated(&self) -> GatewayResult<Session> {
            self.backend.sign_in_federated().await
        }

        async fn sign_out(&self) -> GatewayResult<()> {
            self.backend.sign_out().await
        }

        fn current_session(&self) -> Option<Session> {
            self.backend.current_session()
        }

        fn on_session_change(&self, callback: SessionCallback) -> Subscription {
            self.backend.on_session_change(callback)
        }

        async fn get_document(&self, collection: &str, id: &str) -> GatewayResult<Option<Document>> {
            self.backend.get_document(collection, id).await
        }

        async fn set_document(
            &self,
            collection: &str,
            id: &str,
            fields: Fields,
            merge: bool,
        ) -> GatewayResult<()> {
            self.issued
                .lock()
                .expect("issued log")
                .push((self.started.elapsed(), Value::Object(fields.clone())));
            tokio::time::sleep(self.latency).await;
            self.backend.set_document(collection, id, fields, merge).await
        }

        fn subscribe_collection(&self, collection: &str, callback: CollectionCallback) -> Subscription {
            self.backend.subscribe_collection(collection, callback)
        }

        fn subscribe_document(
            &self,
            collection: &str,
            id: &str,
            callback: DocumentCallback,
        ) -> Subscription {
            self.backend.subscribe_document(collection, id, callback)
        }

        async fn append_message(
            &self,
            conversation: &Conversation,
            sender_id: &str,
            text: &str,
        ) -> GatewayResult<()> {
            self.backend.append_message(conversation, sender_id, text).await
        }
    }

    const IDLE: Duration = Duration::from_millis(1500);

    fn presence_writes(gateway: &MemoryGateway, user_id: &str) -> Vec<PresenceRecord> {
        gateway
            .writes_to(collections::PRESENCE)
            .into_iter()
            .filter(|w| w.id == user_id)
            .inspect(|w| assert!(w.merge, "presence writes must merge"))
            .map(|w| serde_json::from_value(Value::Object(w.fields)).expect("presence fields"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_then_pause_writes_one_idle() {
        let gateway = MemoryGateway::new();
        let tracker = TypingTracker::new(Arc::new(gateway.clone()), "alice", IDLE);

        for _ in 0..3 {
            tracker.keystroke().await;
            assert_eq!(tracker.state(), TypingState::Typing);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        tokio::time::sleep(Duration::from_millis(1600)).await;

        assert_eq!(tracker.state(), TypingState::Idle);
        assert_eq!(
            presence_writes(&gateway, "alice"),
            vec![
                PresenceRecord::typing(),
                PresenceRecord::typing(),
                PresenceRecord::typing(),
                PresenceRecord::idle(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_typing_suppresses_idle_write() {
        let gateway = MemoryGateway::new();
        let tracker = TypingTracker::new(Arc::new(gateway.clone()), "alice", IDLE);

        for _ in 0..20 {
            tracker.keystroke().await;
            tokio::time::sleep(Duration::from_millis(1400)).await;
        }

        let writes = presence_writes(&gateway, "alice");
        assert_eq!(writes.len(), 20);
        assert!(writes.iter().all(|w| w.is_typing));
        assert_eq!(tracker.state(), TypingState::Typing);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_stop_the_timer() {
        let gateway = MemoryGateway::new();
        let tracker = TypingTracker::new(Arc::new(gateway.clone()), "alice", IDLE);
        tracker.keystroke().await;
        tracker.cancel();

        let other = TypingTracker::new(Arc::new(gateway.clone()), "bob", IDLE);
        other.keystroke().await;
        drop(other);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(presence_writes(&gateway, "alice"), vec![PresenceRecord::typing()]);
        assert_eq!(presence_writes(&gateway, "bob"), vec![PresenceRecord::typing()]);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_period_starts_at_the_keystroke() {
        let gateway = Arc::new(Laggy::new(Duration::from_millis(1000)));
        let tracker = TypingTracker::new(gateway.clone(), "alice", IDLE);

        tracker.keystroke().await;
        tokio::time::sleep(Duration::from_millis(2600)).await;

        assert_eq!(
            gateway.issued_typing_flags(),
            vec![(0, Value::Bool(true)), (1500, Value::Bool(false))]
        );
        assert_eq!(
            gateway.backend.document(collections::PRESENCE, "alice").map(Value::Object),
            Some(Value::Object(PresenceRecord::idle().to_fields()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_write_waits_for_a_slower_typing_write() {
        let gateway = Arc::new(Laggy::new(Duration::from_millis(2000)));
        let tracker = TypingTracker::new(gateway.clone(), "alice", IDLE);

        tracker.keystroke().await;
        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(
            gateway.issued_typing_flags(),
            vec![(0, Value::Bool(true)), (2000, Value::Bool(false))]
        );
        assert_eq!(tracker.state(), TypingState::Idle);
        assert_eq!(
            gateway.backend.document(collections::PRESENCE, "alice").map(Value::Object),
            Some(Value::Object(PresenceRecord::idle().to_fields()))
        );
    }

    #[tokio::test]
    async fn offline_write_is_best_effort() {
        let gateway = MemoryGateway::new();
        go_offline(&gateway, "alice").await;
        assert_eq!(presence_writes(&gateway, "alice"), vec![PresenceRecord::offline()]);

        gateway.set_offline(true);
        go_offline(&gateway, "alice").await;
        assert_eq!(presence_writes(&gateway, "alice").len(), 1);
    }

    #[tokio::test]
    async fn peer_presence_follows_the_record() {
        let gateway = MemoryGateway::new();
        let peer = PeerPresence::watch(&gateway, "bob");
        assert_eq!(peer.status(), PresenceStatus::Offline);

        write_presence(&gateway, "bob", PresenceRecord::typing())
            .await
            .expect("typing");
        assert_eq!(peer.status(), PresenceStatus::Typing);

        write_presence(&gateway, "bob", PresenceRecord::idle())
            .await
            .expect("idle");
        assert_eq!(peer.status(), PresenceStatus::Online);
        assert_eq!(peer.peer_id(), "bob");

        drop(peer);
        assert_eq!(gateway.listener_count(), 0);
    }
}
