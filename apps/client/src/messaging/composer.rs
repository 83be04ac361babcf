use std::sync::Arc;
use std::time::Duration;

use chat_proto::{Conversation, PresenceRecord};

use crate::error::AppError;
use crate::gateway::Gateway;
use crate::notify::Notifier;
use crate::presence::{write_presence, TypingState, TypingTracker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Guard failed; nothing was written.
    Skipped,
    Sent,
    Failed(AppError),
}

/// Message input box plus the local user's typing indicator.
pub struct Composer {
    gateway: Arc<dyn Gateway>,
    notifier: Notifier,
    typing_idle: Duration,
    text: String,
    typing: Option<TypingTracker>,
}

impl Composer {
    pub fn new(gateway: Arc<dyn Gateway>, notifier: Notifier, typing_idle: Duration) -> Self {
        Self {
            gateway,
            notifier,
            typing_idle,
            text: String::new(),
            typing: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn can_send(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn typing_state(&self) -> TypingState {
        self.typing
            .as_ref()
            .map(TypingTracker::state)
            .unwrap_or(TypingState::Idle)
    }

    pub async fn input(&mut self, value: impl Into<String>, user_id: Option<&str>) {
        self.text = value.into();
        let Some(user_id) = user_id else {
            return;
        };
        if self.typing.as_ref().map(TypingTracker::user_id) != Some(user_id) {
            // Replacing the tracker drops (and cancels) the previous user's timer.
            self.typing = Some(TypingTracker::new(
                Arc::clone(&self.gateway),
                user_id,
                self.typing_idle,
            ));
        }
        if let Some(tracker) = &self.typing {
            tracker.keystroke().await;
        }
    }

    pub fn cancel_typing(&mut self) {
        if let Some(tracker) = self.typing.take() {
            tracker.cancel();
        }
    }

    pub async fn send(
        &mut self,
        conversation: Option<&Conversation>,
        user_id: Option<&str>,
        peer_id: Option<&str>,
    ) -> SendOutcome {
        let (Some(conversation), Some(user_id), Some(peer_id)) = (conversation, user_id, peer_id)
        else {
            return SendOutcome::Skipped;
        };
        if !self.can_send() {
            return SendOutcome::Skipped;
        }

        if let Err(e) = self
            .gateway
            .append_message(conversation, user_id, &self.text)
            .await
        {
            tracing::warn!(
                component = "messaging.composer",
                conversation_id = %conversation.id(),
                error = %e,
                "send failed"
            );
            let error = AppError::from(e);
            self.notifier.error(error.message.clone());
            return SendOutcome::Failed(error);
        }

        self.text.clear();
        if let Err(e) = write_presence(self.gateway.as_ref(), peer_id, PresenceRecord::sent()).await
        {
            tracing::warn!(
                component = "messaging.composer",
                peer_id = %peer_id,
                error = %e,
                "presence update after send failed"
            );
        }
        SendOutcome::Sent
    }
}
