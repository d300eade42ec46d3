//! Cancellable repeating tasks driving the background polls.

use std::{future::Future, ops::ControlFlow, time::Duration};

use metrics::counter;
use shared::config::PollingConfig;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A named repeating task with explicit `start`/`stop`.
///
/// The first tick fires one full period after `start`. A tick that is still
/// running when the task is stopped is dropped at its next suspension point.
#[derive(Debug)]
pub struct PollTask {
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    /// Creates an idle task.
    #[must_use]
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Name used in logs and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Time between ticks.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Starts ticking, stopping any previous run first.
    ///
    /// `tick` returning [`ControlFlow::Break`] ends the task.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn start<F, Fut>(&mut self, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        self.stop();

        let token = CancellationToken::new();
        self.token = token.clone();
        let name = self.name;
        let period = self.period;
        let first_tick = Instant::now() + period;
        debug!(task = name, period_ms = period.as_millis(), "poll task started");

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                trace!(task = name, "poll tick");
                counter!("tradepost_poll_total", "task" => name).increment(1);

                let flow = tokio::select! {
                    () = token.cancelled() => break,
                    flow = tick() => flow,
                };
                if flow.is_break() {
                    break;
                }
            }

            debug!(task = name, "poll task finished");
        }));
    }

    /// Stops the task. Idempotent.
    pub fn stop(&mut self) {
        self.token.cancel();
        self.handle = None;
    }

    /// Whether the task is started and has not finished.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The two timers of a messaging view: a slow list poll for the view's
/// lifetime and a fast thread poll while a conversation is active.
///
/// [`shutdown`](Self::shutdown) latches: later starts are ignored until
/// [`resume`](Self::resume), so work that finishes after a teardown cannot
/// bring a timer back.
#[derive(Debug)]
pub struct PollingScheduler {
    list: PollTask,
    thread: PollTask,
    shut_down: bool,
}

impl PollingScheduler {
    /// Creates both timers, idle, with the configured cadences.
    #[must_use]
    pub fn new(polling: &PollingConfig) -> Self {
        Self {
            list: PollTask::new("conversations", polling.conversations_interval()),
            thread: PollTask::new("thread", polling.thread_interval()),
            shut_down: false,
        }
    }

    /// Starts the list poll. Returns `false` after a shutdown.
    pub fn start_list<F, Fut>(&mut self, tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.shut_down {
            return false;
        }
        self.list.start(tick);
        true
    }

    /// Cancels the current thread poll and starts a new one, so at most one
    /// thread poll runs at a time. Returns `false` after a shutdown.
    pub fn restart_thread<F, Fut>(&mut self, tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.shut_down {
            debug!("thread poll not restarted after shutdown");
            return false;
        }
        self.thread.start(tick);
        true
    }

    /// Stops the thread poll only.
    pub fn stop_thread(&mut self) {
        self.thread.stop();
    }

    /// Stops both timers and refuses new starts until [`resume`](Self::resume).
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.thread.stop();
        self.list.stop();
    }

    /// Allows timers to start again after a shutdown.
    pub fn resume(&mut self) {
        self.shut_down = false;
    }

    /// Whether [`shutdown`](Self::shutdown) was called since the last resume.
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Whether the list poll is running.
    #[must_use]
    pub fn list_running(&self) -> bool {
        self.list.is_running()
    }

    /// Whether the thread poll is running.
    #[must_use]
    pub fn thread_running(&self) -> bool {
        self.thread.is_running()
    }
}
