//! The signed-in user's conversation list and the active-conversation pointer.

use std::sync::{Mutex, MutexGuard, PoisonError};

use metrics::counter;
use shared::models::{Conversation, ConversationKey, UserId};
use tracing::{debug, info, warn};

use crate::{error::Result, gateway::SharedGateway};

/// Renderable state of a [`ConversationListStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationListState {
    /// Conversations in server order.
    pub conversations: Vec<Conversation>,
    /// The conversation being viewed, re-attached after every refresh.
    pub active: Option<Conversation>,
    /// True only while a non-silent load is in flight.
    pub loading: bool,
    /// User-facing message of the last failed load.
    pub error: Option<String>,
}

/// What a successful [`ConversationListStore::load`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListLoad {
    /// Number of conversations now held.
    pub count: usize,
    /// Set when the active conversation vanished from the list and was cleared.
    pub closed: Option<ConversationKey>,
    /// The deep-link target, when it just appeared and should be selected.
    pub auto_select: Option<Conversation>,
}

#[derive(Debug, Default)]
struct ListInner {
    view: ConversationListState,
    deep_link: Option<ConversationKey>,
}

/// Owns the conversation list and which entry is active.
#[derive(Debug)]
pub struct ConversationListStore {
    gateway: SharedGateway,
    user: UserId,
    inner: Mutex<ListInner>,
}

impl ConversationListStore {
    /// Creates an empty store for `user`.
    #[must_use]
    pub fn new(gateway: SharedGateway, user: UserId) -> Self {
        Self {
            gateway,
            user,
            inner: Mutex::new(ListInner::default()),
        }
    }

    /// Sets a conversation to select automatically once it shows up in a load.
    ///
    /// The target is consumed the first time it is found, so it is selected
    /// at most once.
    #[must_use]
    pub fn with_deep_link(self, target: ConversationKey) -> Self {
        self.lock().deep_link = Some(target);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ListInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ConversationListState {
        self.lock().view.clone()
    }

    /// The conversation being viewed.
    #[must_use]
    pub fn active(&self) -> Option<Conversation> {
        self.lock().view.active.clone()
    }

    /// The listed conversation with identity `key`.
    #[must_use]
    pub fn find(&self, key: ConversationKey) -> Option<Conversation> {
        self.lock()
            .view
            .conversations
            .iter()
            .find(|conversation| conversation.key() == key)
            .cloned()
    }

    /// Whether a deep-link target is still waiting to be selected.
    #[must_use]
    pub fn pending_deep_link(&self) -> Option<ConversationKey> {
        self.lock().deep_link
    }

    /// Fetches the list and replaces it wholesale.
    ///
    /// A silent load leaves `loading` untouched. On failure the previous
    /// list and active conversation are kept and `error` is set.
    ///
    /// # Errors
    /// Returns the gateway failure.
    pub async fn load(&self, silent: bool) -> Result<ListLoad> {
        {
            let mut inner = self.lock();
            inner.view.error = None;
            if !silent {
                inner.view.loading = true;
            }
        }

        let result = self.gateway.fetch_conversations(self.user).await;

        let mut inner = self.lock();
        if !silent {
            inner.view.loading = false;
        }

        let conversations = match result {
            Ok(conversations) => conversations,
            Err(err) => {
                warn!(user_id = %self.user, error = %err, silent, "conversation list load failed");
                counter!("tradepost_poll_failures_total", "task" => "conversations").increment(1);
                inner.view.error = Some(format!("Failed to load conversations: {err}"));
                return Err(err.into());
            }
        };

        let ListInner { view, deep_link } = &mut *inner;
        view.conversations = conversations;

        let mut outcome = ListLoad {
            count: view.conversations.len(),
            ..ListLoad::default()
        };

        if let Some(previous) = view.active.take() {
            let key = previous.key();
            view.active = view
                .conversations
                .iter()
                .find(|conversation| conversation.key() == key)
                .cloned();
            if view.active.is_none() {
                info!(
                    counterpart_id = %key.counterpart_id,
                    subject_id = %key.subject_id,
                    "active conversation no longer listed"
                );
                outcome.closed = Some(key);
            }
        }

        if let Some(target) = *deep_link {
            let found = view
                .conversations
                .iter()
                .find(|conversation| conversation.key() == target);
            if let Some(found) = found {
                *deep_link = None;
                if view.active.as_ref().map(Conversation::key) != Some(target) {
                    outcome.auto_select = Some(found.clone());
                }
            }
        }

        debug!(user_id = %self.user, count = outcome.count, silent, "conversation list loaded");
        Ok(outcome)
    }

    /// Makes `conversation` active, returning the previously active one.
    ///
    /// The list's own instance is used when it holds the same conversation.
    pub fn select(&self, conversation: Conversation) -> Option<Conversation> {
        let mut inner = self.lock();
        let key = conversation.key();
        if inner.deep_link == Some(key) {
            inner.deep_link = None;
        }
        let selected = inner
            .view
            .conversations
            .iter()
            .find(|candidate| candidate.key() == key)
            .cloned()
            .unwrap_or(conversation);
        inner.view.active.replace(selected)
    }

    /// Clears the active pointer.
    pub fn clear_active(&self) -> Option<Conversation> {
        self.lock().view.active.take()
    }

    /// Clears unread state on the list entry (and the active copy) for `key`.
    ///
    /// Returns whether anything changed.
    pub fn clear_unread(&self, key: ConversationKey) -> bool {
        let mut inner = self.lock();
        let view = &mut inner.view;
        let mut changed = false;
        let entries = view.conversations.iter_mut().chain(view.active.iter_mut());
        for conversation in entries.filter(|conversation| conversation.key() == key) {
            if conversation.has_unread || conversation.unread_count > 0 {
                conversation.mark_read();
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::MessagingError,
        test_implementations::{ME, ScriptedGateway, conversation, key},
    };
    use std::sync::Arc;

    fn store(gateway: &Arc<ScriptedGateway>) -> ConversationListStore {
        ConversationListStore::new(Arc::clone(gateway) as SharedGateway, ME)
    }

    #[tokio::test]
    async fn active_survives_projection_changes() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_conversations(vec![conversation(2, 10, 0), conversation(3, 11, 0)]);
        let store = store(&gateway);
        store.load(false).await.unwrap();
        store.select(conversation(3, 11, 0));

        let mut updated = conversation(3, 11, 2);
        updated.last_message_preview = "still there?".into();
        updated.last_message_at = crate::test_implementations::at(2025, 3, 9, 8, 0);
        gateway.set_conversations(vec![updated.clone(), conversation(2, 10, 0)]);

        let outcome = store.load(true).await.unwrap();
        assert_eq!(outcome.closed, None);
        assert_eq!(store.active(), Some(updated));
    }

    #[tokio::test]
    async fn active_is_cleared_when_the_pair_disappears() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_conversations(vec![conversation(2, 10, 0)]);
        let store = store(&gateway);
        store.load(false).await.unwrap();
        store.select(conversation(2, 10, 0));

        gateway.set_conversations(vec![conversation(4, 12, 0)]);
        let outcome = store.load(true).await.unwrap();

        assert_eq!(outcome.closed, Some(key(2, 10)));
        assert_eq!(store.active(), None);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_state() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_conversations(vec![conversation(2, 10, 1), conversation(3, 11, 0)]);
        let store = store(&gateway);
        store.load(false).await.unwrap();
        store.select(conversation(2, 10, 1));
        let before = store.snapshot();

        gateway.fail_conversations(true);
        let result = store.load(false).await;

        assert!(matches!(result, Err(MessagingError::Gateway(_))));
        let after = store.snapshot();
        assert_eq!(after.conversations, before.conversations);
        assert_eq!(after.active, before.active);
        assert!(!after.loading);
        assert!(after.error.is_some());
    }

    #[tokio::test]
    async fn next_successful_load_clears_error() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.fail_conversations(true);
        let store = store(&gateway);
        let _ = store.load(true).await;
        assert!(store.snapshot().error.is_some());

        gateway.fail_conversations(false);
        store.load(true).await.unwrap();
        assert_eq!(store.snapshot().error, None);
    }

    #[tokio::test]
    async fn deep_link_fires_once_when_target_appears() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_conversations(vec![conversation(2, 10, 0)]);
        let store = store(&gateway).with_deep_link(key(5, 20));

        let first = store.load(false).await.unwrap();
        assert_eq!(first.auto_select, None);
        assert_eq!(store.pending_deep_link(), Some(key(5, 20)));

        gateway.set_conversations(vec![conversation(5, 20, 1), conversation(2, 10, 0)]);
        let second = store.load(true).await.unwrap();
        assert_eq!(second.auto_select.map(|c| c.key()), Some(key(5, 20)));
        assert_eq!(store.pending_deep_link(), None);

        let third = store.load(true).await.unwrap();
        assert_eq!(third.auto_select, None);
    }

    #[tokio::test]
    async fn clear_unread_updates_list_and_active() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_conversations(vec![conversation(2, 10, 3)]);
        let store = store(&gateway);
        store.load(false).await.unwrap();
        store.select(conversation(2, 10, 3));

        assert!(store.clear_unread(key(2, 10)));
        let state = store.snapshot();
        assert!(!state.conversations[0].has_unread);
        assert_eq!(state.conversations[0].unread_count, 0);
        assert_eq!(state.active.map(|c| c.unread_count), Some(0));
        assert!(!store.clear_unread(key(2, 10)));
    }
}
