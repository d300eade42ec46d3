//! Messages of the active conversation.
//!
//! The store is bound to one conversation at a time. Each request remembers
//! the conversation and selection generation it was issued for, and its
//! response is dropped if either has changed by the time it arrives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::counter;
use shared::models::{ConversationKey, Message, SendMessageRequest, UserId};
use tracing::{debug, info, warn};

use crate::{
    error::{MessagingError, Result},
    gateway::SharedGateway,
    unread::UnreadBroadcast,
};

/// Renderable state of an [`ActiveThreadStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadState {
    /// Conversation the messages belong to.
    pub target: Option<ConversationKey>,
    /// Messages in server order.
    pub messages: Vec<Message>,
    /// True only while a non-silent load is in flight.
    pub loading: bool,
    /// User-facing message of the last failed load.
    pub error: Option<String>,
    /// True while a send is in flight.
    pub sending: bool,
    /// User-facing message of the last failed send.
    pub send_error: Option<String>,
}

/// Result of a thread load that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadLoad {
    /// The response replaced the messages of `conversation`.
    Applied {
        /// Conversation the messages were loaded for.
        conversation: ConversationKey,
        /// Number of messages now held.
        messages: usize,
    },
    /// The active conversation changed while the request was in flight.
    Stale,
    /// No conversation is active.
    Idle,
}

#[derive(Debug, Default)]
struct ThreadInner {
    view: ThreadState,
    /// Bumped on every target switch.
    generation: u64,
    /// Bumped on every switch and on [`ActiveThreadStore::invalidate`].
    reloads: u64,
}

impl ThreadInner {
    fn is_current(&self, target: ConversationKey, generation: u64) -> bool {
        self.generation == generation && self.view.target == Some(target)
    }

    fn is_current_load(&self, target: ConversationKey, generation: u64, reloads: u64) -> bool {
        self.reloads == reloads && self.is_current(target, generation)
    }
}

/// Owns the message sequence of whichever conversation is active.
#[derive(Debug)]
pub struct ActiveThreadStore {
    gateway: SharedGateway,
    user: UserId,
    unread: Arc<UnreadBroadcast>,
    inner: Mutex<ThreadInner>,
}

impl ActiveThreadStore {
    /// Creates a store with no active conversation.
    #[must_use]
    pub fn new(gateway: SharedGateway, user: UserId, unread: Arc<UnreadBroadcast>) -> Self {
        Self {
            gateway,
            user,
            unread,
            inner: Mutex::new(ThreadInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThreadInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ThreadState {
        self.lock().view.clone()
    }

    /// The conversation the store is bound to.
    #[must_use]
    pub fn target(&self) -> Option<ConversationKey> {
        self.lock().view.target
    }

    /// Whether a send is in flight.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.lock().view.sending
    }

    /// Binds the store to `target`.
    ///
    /// Switching to a different conversation empties the message list and
    /// invalidates every request still in flight. Returns whether the target
    /// changed.
    pub fn set_target(&self, target: Option<ConversationKey>) -> bool {
        let mut inner = self.lock();
        if inner.view.target == target {
            return false;
        }
        inner.generation += 1;
        inner.reloads += 1;
        inner.view.target = target;
        inner.view.messages.clear();
        inner.view.loading = false;
        inner.view.error = None;
        inner.view.send_error = None;
        true
    }

    /// Makes every thread load still in flight stale without changing the
    /// target or its messages. Sends in flight are unaffected.
    pub fn invalidate(&self) {
        self.lock().reloads += 1;
    }

    /// Fetches the active thread and replaces the messages wholesale.
    ///
    /// After an applied load the unread badge is re-queried, since viewing a
    /// thread changes read state on the backend.
    ///
    /// # Errors
    /// Returns the gateway failure when the response is still current; the
    /// previous messages are kept and `error` is set.
    pub async fn load(&self, silent: bool) -> Result<ThreadLoad> {
        let (target, generation, reloads) = {
            let mut inner = self.lock();
            let Some(target) = inner.view.target else {
                return Ok(ThreadLoad::Idle);
            };
            inner.view.error = None;
            if !silent {
                inner.view.loading = true;
            }
            (target, inner.generation, inner.reloads)
        };

        let result = self.gateway.fetch_thread(self.user, target).await;

        let count = {
            let mut inner = self.lock();
            if !inner.is_current_load(target, generation, reloads) {
                counter!("tradepost_stale_responses_total").increment(1);
                debug!(
                    counterpart_id = %target.counterpart_id,
                    subject_id = %target.subject_id,
                    "discarding thread response for an inactive conversation"
                );
                return Ok(ThreadLoad::Stale);
            }
            if !silent {
                inner.view.loading = false;
            }
            match result {
                Ok(messages) => {
                    let count = messages.len();
                    inner.view.messages = messages;
                    count
                }
                Err(err) => {
                    warn!(
                        counterpart_id = %target.counterpart_id,
                        subject_id = %target.subject_id,
                        error = %err,
                        silent,
                        "thread load failed"
                    );
                    counter!("tradepost_poll_failures_total", "task" => "thread").increment(1);
                    inner.view.error = Some(format!("Failed to load messages: {err}"));
                    return Err(err.into());
                }
            }
        };

        debug!(
            counterpart_id = %target.counterpart_id,
            subject_id = %target.subject_id,
            count,
            "thread loaded"
        );
        // A failed refresh has already published zero.
        let _ = self.unread.refresh(self.user).await;

        Ok(ThreadLoad::Applied {
            conversation: target,
            messages: count,
        })
    }

    /// Sends `content` to the active conversation.
    ///
    /// The confirmed message is appended only after the backend accepted it,
    /// and only if the same conversation is still active.
    ///
    /// # Errors
    /// * [`MessagingError::Validation`] for blank content, without any request.
    /// * [`MessagingError::NoActiveConversation`] when nothing is selected.
    /// * [`MessagingError::SendInProgress`] while another send is in flight.
    /// * [`MessagingError::SendFailed`] when the backend rejected the message.
    pub async fn send(&self, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::Validation("message content must not be empty"));
        }

        let (target, generation) = {
            let mut inner = self.lock();
            let target = inner.view.target.ok_or(MessagingError::NoActiveConversation)?;
            if inner.view.sending {
                return Err(MessagingError::SendInProgress);
            }
            inner.view.sending = true;
            inner.view.send_error = None;
            (target, inner.generation)
        };

        let request = SendMessageRequest {
            counterpart_id: target.counterpart_id,
            subject_id: target.subject_id,
            content: content.to_string(),
        };
        let result = self.gateway.send_message(self.user, &request).await;

        let message = {
            let mut inner = self.lock();
            inner.view.sending = false;
            match result {
                Ok(message) => {
                    if inner.is_current(target, generation) {
                        inner.view.messages.push(message.clone());
                    } else {
                        counter!("tradepost_stale_responses_total").increment(1);
                        debug!(message_id = %message.id, "sent message belongs to an inactive conversation");
                    }
                    message
                }
                Err(err) => {
                    warn!(
                        counterpart_id = %target.counterpart_id,
                        subject_id = %target.subject_id,
                        error = %err,
                        "send failed"
                    );
                    if inner.is_current(target, generation) {
                        inner.view.send_error = Some(format!("Failed to send message: {err}"));
                    }
                    return Err(MessagingError::SendFailed(err));
                }
            }
        };

        counter!("tradepost_messages_sent_total").increment(1);
        info!(
            message_id = %message.id,
            counterpart_id = %target.counterpart_id,
            subject_id = %target.subject_id,
            "message sent"
        );
        let _ = self.unread.refresh(self.user).await;
        Ok(message)
    }
}
