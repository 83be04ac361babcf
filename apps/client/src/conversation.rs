use chat_proto::Conversation;

/// None unless both participants are known.
pub fn select_conversation(user_id: Option<&str>, peer_id: Option<&str>) -> Option<Conversation> {
    match (user_id, peer_id) {
        (Some(me), Some(peer)) => Some(Conversation::between(me, peer)),
        _ => None,
    }
}

/// Remembers the last derived conversation so dependents know when to re-open.
#[derive(Debug, Default)]
pub struct ConversationSelector {
    current: Option<Conversation>,
}

impl ConversationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute; returns true when the conversation changed.
    pub fn update(&mut self, user_id: Option<&str>, peer_id: Option<&str>) -> bool {
        let next = select_conversation(user_id, peer_id);
        let changed = next.as_ref().map(|c| c.id()) != self.current.as_ref().map(|c| c.id());
        self.current = next;
        changed
    }

    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_participant_yields_none() {
        assert!(select_conversation(None, Some("b")).is_none());
        assert!(select_conversation(Some("a"), None).is_none());
        assert!(select_conversation(None, None).is_none());
        assert_eq!(
            select_conversation(Some("b"), Some("a")).map(|c| c.id().to_string()),
            Some("a-b".to_string())
        );
    }

    #[test]
    fn selector_reports_key_changes_only() {
        let mut selector = ConversationSelector::new();
        assert!(!selector.update(Some("me"), None));
        assert!(selector.current().is_none());

        assert!(selector.update(Some("me"), Some("bob")));
        assert!(!selector.update(Some("me"), Some("bob")));
        assert!(selector.update(Some("me"), Some("carol")));
        assert_eq!(selector.current().map(|c| c.id().as_str()), Some("carol-me"));

        assert!(selector.update(None, Some("carol")));
        assert!(selector.current().is_none());
    }
}
