//! Process-wide unread count shared by every badge surface.
//!
//! The channel is created once per application session and injected wherever
//! it is needed. Every publish is a full snapshot from the backend, so
//! concurrent refreshes are resolved by last-write-wins.

use std::{
    collections::BTreeMap,
    fmt,
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use metrics::counter;
use shared::models::UserId;
use tracing::{debug, warn};

use crate::{
    error::{MessagingError, Result},
    gateway::SharedGateway,
    scheduler::PollTask,
};

type Listener = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct ChannelState {
    current: u64,
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Single-value publish/subscribe cell holding the last known unread count.
pub struct UnreadBroadcast {
    gateway: SharedGateway,
    state: Mutex<ChannelState>,
}

impl fmt::Debug for UnreadBroadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("UnreadBroadcast")
            .field("current", &state.current)
            .field("listeners", &state.listeners.len())
            .finish_non_exhaustive()
    }
}

impl UnreadBroadcast {
    /// Creates the channel with a count of zero.
    #[must_use]
    pub fn new(gateway: SharedGateway) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            state: Mutex::new(ChannelState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last published value.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.lock().current
    }

    /// Overwrites the cell and notifies every subscriber synchronously.
    pub fn publish(&self, count: u64) {
        let listeners: Vec<Listener> = {
            let mut state = self.lock();
            state.current = count;
            state.listeners.values().cloned().collect()
        };
        debug!(count, subscribers = listeners.len(), "unread count published");
        for listener in listeners {
            listener(count);
        }
    }

    /// Registers `listener`, invoking it at once with the current value.
    ///
    /// The listener stays registered until the returned handle is dropped or
    /// [`UnreadSubscription::unsubscribe`] is called.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> UnreadSubscription
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let (id, current) = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(id, Arc::clone(&listener));
            (id, state.current)
        };
        listener(current);
        UnreadSubscription {
            id,
            channel: Arc::downgrade(self),
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn remove(&self, id: u64) {
        self.lock().listeners.remove(&id);
    }

    /// Fetches the authoritative count and publishes it.
    ///
    /// Negative backend values are published as zero.
    ///
    /// # Errors
    /// Returns [`MessagingError::UnreadFetchFailed`] when the fetch fails;
    /// zero has been published in that case.
    pub async fn refresh(&self, user: UserId) -> Result<u64> {
        match self.gateway.fetch_unread_count(user).await {
            Ok(count) => {
                let count = u64::try_from(count).unwrap_or(0);
                self.publish(count);
                Ok(count)
            }
            Err(err) => {
                warn!(user_id = %user, error = %err, "unread count fetch failed, publishing zero");
                counter!("tradepost_poll_failures_total", "task" => "unread").increment(1);
                self.publish(0);
                Err(MessagingError::UnreadFetchFailed(err))
            }
        }
    }

    /// Starts an independent badge refresh every `period`.
    ///
    /// The task ends on its own once the channel is dropped.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    #[must_use = "dropping the task stops the badge poll"]
    pub fn poll(self: &Arc<Self>, user: UserId, period: Duration) -> PollTask {
        let mut task = PollTask::new("unread", period);
        let weak = Arc::downgrade(self);
        task.start(move || {
            let weak = weak.clone();
            async move {
                let Some(channel) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                // Failures have already published zero.
                let _ = channel.refresh(user).await;
                ControlFlow::Continue(())
            }
        });
        task
    }
}

/// Handle keeping one listener registered on an [`UnreadBroadcast`].
#[derive(Debug)]
pub struct UnreadSubscription {
    id: u64,
    channel: Weak<UnreadBroadcast>,
}

impl UnreadSubscription {
    /// Removes the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for UnreadSubscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.remove(self.id);
        }
    }
}
