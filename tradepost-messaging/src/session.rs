//! The messaging view-model.
//!
//! A [`MessagingSession`] ties the list store, the thread store, the two
//! polling timers and the composer draft together for one signed-in user.
//! Timer tasks hold only a weak reference, so dropping the last session
//! handle stops them.

use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use shared::{
    config::PollingConfig,
    models::{Conversation, ConversationKey, Message, UserId},
};
use tracing::{debug, info, warn};

use crate::{
    conversations::{ConversationListStore, ListLoad},
    deep_link::DeepLink,
    error::{MessagingError, Result},
    gateway::SharedGateway,
    scheduler::PollingScheduler,
    thread::{ActiveThreadStore, ThreadLoad},
    unread::UnreadBroadcast,
};

/// Construction options for a [`MessagingSession`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Cadences of the list and thread polls.
    pub polling: PollingConfig,
    /// Conversation to open as soon as it appears in the list.
    pub deep_link: Option<ConversationKey>,
}

/// Everything a renderer needs, copied out in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagingSnapshot {
    /// Conversations in server order.
    pub conversations: Vec<Conversation>,
    /// The conversation being viewed.
    pub active: Option<Conversation>,
    /// Messages of the active conversation.
    pub messages: Vec<Message>,
    /// A non-silent list load is in flight.
    pub conversations_loading: bool,
    /// Message of the last failed list load.
    pub conversations_error: Option<String>,
    /// A non-silent thread load is in flight.
    pub messages_loading: bool,
    /// Message of the last failed thread load.
    pub messages_error: Option<String>,
    /// A send is in flight.
    pub sending: bool,
    /// Message of the last failed send.
    pub send_error: Option<String>,
    /// Composer text.
    pub draft: String,
    /// Last published unread badge value.
    pub unread_count: u64,
    /// Route of the active conversation, e.g. `/messages/7/42`.
    pub route: Option<String>,
}

#[derive(Debug)]
struct SessionInner {
    user: UserId,
    conversations: ConversationListStore,
    thread: ActiveThreadStore,
    unread: Arc<UnreadBroadcast>,
    scheduler: Mutex<PollingScheduler>,
    draft: Mutex<String>,
}

impl SessionInner {
    fn scheduler(&self) -> MutexGuard<'_, PollingScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn draft(&self) -> MutexGuard<'_, String> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.scheduler().shutdown();
    }
}

/// View-model over one user's conversations and active thread.
#[derive(Debug, Clone)]
pub struct MessagingSession {
    inner: Arc<SessionInner>,
}

impl MessagingSession {
    /// Creates an idle session; nothing is fetched until [`start`](Self::start).
    #[must_use]
    pub fn new(
        user: UserId,
        gateway: SharedGateway,
        unread: Arc<UnreadBroadcast>,
        options: SessionOptions,
    ) -> Self {
        let mut conversations = ConversationListStore::new(Arc::clone(&gateway), user);
        if let Some(target) = options.deep_link {
            conversations = conversations.with_deep_link(target);
        }
        let thread = ActiveThreadStore::new(gateway, user, Arc::clone(&unread));

        Self {
            inner: Arc::new(SessionInner {
                user,
                conversations,
                thread,
                unread,
                scheduler: Mutex::new(PollingScheduler::new(&options.polling)),
                draft: Mutex::new(String::new()),
            }),
        }
    }

    fn from_weak(weak: &Weak<SessionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> UserId {
        self.inner.user
    }

    /// The shared unread badge channel.
    #[must_use]
    pub fn unread(&self) -> &Arc<UnreadBroadcast> {
        &self.inner.unread
    }

    /// Loads the list and starts the slow list poll.
    ///
    /// The poll is started even when the first load fails, so the view
    /// recovers on its own. Starting again after [`teardown`](Self::teardown)
    /// re-arms the timers.
    ///
    /// # Errors
    /// Returns the failure of the initial load.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub async fn start(&self) -> Result<ListLoad> {
        info!(user_id = %self.inner.user, "messaging session started");
        self.inner.scheduler().resume();
        let result = self.load_conversations(false).await;
        self.start_list_poll();
        result
    }

    fn start_list_poll(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler().start_list(move || {
            let weak = weak.clone();
            async move {
                let Some(session) = Self::from_weak(&weak) else {
                    return ControlFlow::Break(());
                };
                if let Err(err) = session.load_conversations(true).await {
                    warn!(error = %err, "background conversation poll failed");
                }
                ControlFlow::Continue(())
            }
        });
    }

    fn restart_thread_poll(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler().restart_thread(move || {
            let weak = weak.clone();
            async move {
                let Some(session) = Self::from_weak(&weak) else {
                    return ControlFlow::Break(());
                };
                if let Err(err) = session.load_thread(true).await {
                    warn!(error = %err, "background thread poll failed");
                }
                ControlFlow::Continue(())
            }
        });
    }

    /// Loads the conversation list, then applies what the load changed:
    /// a vanished active conversation closes the thread, and a deep-link
    /// target that just appeared gets selected unless the session has been
    /// torn down meanwhile.
    ///
    /// # Errors
    /// Returns the list load failure.
    pub async fn load_conversations(&self, silent: bool) -> Result<ListLoad> {
        let outcome = self.inner.conversations.load(silent).await?;

        if outcome.closed.is_some() {
            self.inner.scheduler().stop_thread();
            self.inner.thread.set_target(None);
        }

        if let Some(target) = outcome.auto_select.clone() {
            if self.inner.scheduler().is_shut_down() {
                debug!(
                    counterpart_id = %target.counterpart_id,
                    subject_id = %target.subject_id,
                    "session torn down, deep link not opened"
                );
                return Ok(outcome);
            }
            info!(
                counterpart_id = %target.counterpart_id,
                subject_id = %target.subject_id,
                "opening deep-linked conversation"
            );
            if let Err(err) = self.select_conversation(target).await {
                warn!(error = %err, "deep-linked conversation failed to load");
            }
        }

        Ok(outcome)
    }

    /// Reloads the list and, when a conversation is active, its thread.
    ///
    /// # Errors
    /// Returns the first failure; the other load still runs.
    pub async fn refresh(&self) -> Result<()> {
        let list = self.load_conversations(false).await;
        let thread = self.load_thread(false).await;
        list?;
        thread?;
        Ok(())
    }

    /// Makes `conversation` active, loads its thread and restarts the fast
    /// poll for it.
    ///
    /// # Errors
    /// Returns the thread load failure; the conversation stays selected.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub async fn select_conversation(&self, conversation: Conversation) -> Result<ThreadLoad> {
        let key = conversation.key();
        self.inner.conversations.select(conversation);
        if !self.inner.thread.set_target(Some(key)) {
            self.inner.thread.invalidate();
        }
        info!(
            counterpart_id = %key.counterpart_id,
            subject_id = %key.subject_id,
            route = %DeepLink::from(key),
            "conversation selected"
        );

        self.restart_thread_poll();
        self.load_thread(false).await
    }

    /// Selects the listed conversation with identity `key`.
    ///
    /// # Errors
    /// [`MessagingError::UnknownConversation`] if the list does not hold it.
    pub async fn select_by_key(&self, key: ConversationKey) -> Result<ThreadLoad> {
        let conversation =
            self.inner
                .conversations
                .find(key)
                .ok_or(MessagingError::UnknownConversation {
                    counterpart_id: key.counterpart_id,
                    subject_id: key.subject_id,
                })?;
        self.select_conversation(conversation).await
    }

    /// Loads the active thread and clears the list entry's unread state once
    /// the response is applied.
    ///
    /// # Errors
    /// Returns the thread load failure.
    pub async fn load_thread(&self, silent: bool) -> Result<ThreadLoad> {
        let outcome = self.inner.thread.load(silent).await?;
        if let ThreadLoad::Applied { conversation, .. } = outcome {
            self.inner.conversations.clear_unread(conversation);
        }
        Ok(outcome)
    }

    /// Replaces the composer text.
    pub fn set_draft(&self, text: impl Into<String>) {
        *self.inner.draft() = text.into();
    }

    /// Current composer text.
    #[must_use]
    pub fn draft(&self) -> String {
        self.inner.draft().clone()
    }

    /// Whether the composer may send: a conversation is active, the draft
    /// has text and no send is in flight.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.inner.thread.target().is_some()
            && !self.inner.draft().trim().is_empty()
            && !self.inner.thread.is_sending()
    }

    /// Sends the draft. It is cleared on success unless it was edited while
    /// the request was in flight; on failure it is kept for a retry.
    ///
    /// # Errors
    /// See [`send_content`](Self::send_content).
    pub async fn send_message(&self) -> Result<Message> {
        let draft = self.draft();
        let message = self.send_content(&draft).await?;
        let mut current = self.inner.draft();
        if *current == draft {
            current.clear();
        }
        Ok(message)
    }

    /// Sends `content` to the active conversation and clears that
    /// conversation's unread state in the list.
    ///
    /// # Errors
    /// * [`MessagingError::Validation`] for blank content.
    /// * [`MessagingError::NoActiveConversation`] when nothing is selected.
    /// * [`MessagingError::SendInProgress`] while another send is in flight.
    /// * [`MessagingError::SendFailed`] when the backend rejected it.
    pub async fn send_content(&self, content: &str) -> Result<Message> {
        let target = self.inner.thread.target();
        let message = self.inner.thread.send(content).await?;
        if let Some(target) = target {
            self.inner.conversations.clear_unread(target);
        }
        Ok(message)
    }

    /// Copies out the state of both stores, the draft and the badge.
    #[must_use]
    pub fn snapshot(&self) -> MessagingSnapshot {
        let list = self.inner.conversations.snapshot();
        let thread = self.inner.thread.snapshot();
        MessagingSnapshot {
            route: list.active.as_ref().map(|active| DeepLink::path(active.key())),
            conversations: list.conversations,
            active: list.active,
            messages: thread.messages,
            conversations_loading: list.loading,
            conversations_error: list.error,
            messages_loading: thread.loading,
            messages_error: thread.error,
            sending: thread.sending,
            send_error: thread.send_error,
            draft: self.draft(),
            unread_count: self.inner.unread.current(),
        }
    }

    /// Whether the list poll is running.
    #[must_use]
    pub fn list_poll_running(&self) -> bool {
        self.inner.scheduler().list_running()
    }

    /// Whether the thread poll is running.
    #[must_use]
    pub fn thread_poll_running(&self) -> bool {
        self.inner.scheduler().thread_running()
    }

    /// Stops both timers. Requests already in flight finish, and their
    /// results are discarded if they no longer apply.
    pub fn teardown(&self) {
        info!(user_id = %self.inner.user, "messaging session torn down");
        self.inner.scheduler().shutdown();
    }
}
