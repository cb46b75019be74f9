//! Time-ordered notification queue with auto-dismissal.
//!
//! The queue shows notifications one at a time. Only the head has a running
//! countdown. Any change to the pending list (enqueue or expiry) cancels the
//! running timer and arms a fresh one for the head's full timeout, counted
//! from that change. Enqueuing behind a head that is mid-countdown therefore
//! restarts the head's countdown.
//!
//! The timer is modelled as an explicit state machine:
//!
//! ```text
//!            enqueue / subscribe-first (pending non-empty)
//!   Idle ─────────────────────────────────────────────► Waiting(head, deadline)
//!    ▲                                                      │  │
//!    │ timer-fire (pending now empty) / unsubscribe-last     │  │ enqueue / timer-fire
//!    └──────────────────────────────────────────────────────┘  └──► Waiting(new head, new deadline)
//! ```
//!
//! A timer only exists while at least one observer is subscribed.

use aimtrack_core::config::NotificationConfig;
use aimtrack_core::notification::{Notification, NotificationKind};
use aimtrack_core::{AimError, Observer, Publisher, Result, Subscription};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Read-only view of the expiry timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerStatus {
    Idle,
    Waiting { head_id: String, deadline: Instant },
}

enum TimerState {
    Idle,
    Waiting {
        head_id: String,
        deadline: Instant,
        generation: u64,
        task: JoinHandle<()>,
    },
}

struct QueueState {
    pending: VecDeque<Notification>,
    timer: TimerState,
    /// Bumped on every arm so a timer that lost a race with a cancel is ignored.
    generation: u64,
}

impl QueueState {
    fn snapshot(&self) -> Vec<Notification> {
        self.pending.iter().cloned().collect()
    }

    fn cancel_timer(&mut self) {
        if let TimerState::Waiting { head_id, task, .. } =
            std::mem::replace(&mut self.timer, TimerState::Idle)
        {
            task.abort();
            tracing::debug!(head_id = %head_id, "[NotificationQueue] timer cancelled");
        }
    }
}

impl Drop for QueueState {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

struct Shared {
    state: Mutex<QueueState>,
    publisher: Publisher<Vec<Notification>>,
    runtime: Handle,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels the running timer and, if anyone is watching and something is
    /// pending, arms a new one for the head's full timeout starting now.
    fn rearm(self: &Arc<Self>, state: &mut QueueState) {
        state.cancel_timer();

        if self.publisher.subscriber_count() == 0 {
            return;
        }
        let (head_id, timeout_ms) = match state.pending.front() {
            Some(head) => (head.id.clone(), head.timeout_ms),
            None => return,
        };

        state.generation += 1;
        let generation = state.generation;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(shared) = weak.upgrade() {
                shared.expire(generation);
            }
        });

        tracing::debug!(
            head_id = %head_id,
            timeout_ms,
            "[NotificationQueue] timer armed"
        );
        state.timer = TimerState::Waiting {
            head_id,
            deadline,
            generation,
            task,
        };
    }

    fn expire(self: &Arc<Self>, generation: u64) {
        {
            let mut state = self.lock_state();
            match &state.timer {
                TimerState::Waiting {
                    generation: current,
                    ..
                } if *current == generation => {}
                _ => return,
            }
            // This task is the running timer; let its handle go without aborting it.
            state.timer = TimerState::Idle;

            if let Some(expired) = state.pending.pop_front() {
                tracing::debug!(
                    id = %expired.id,
                    remaining = state.pending.len(),
                    "[NotificationQueue] notification expired"
                );
            }
            self.rearm(&mut state);
            self.publisher.push(state.snapshot());
        }
        self.publisher.flush();
    }

    fn on_unsubscribe(&self) {
        // Checked under the state lock so a concurrent subscribe cannot slip in
        // between the count and the cancel.
        let mut state = self.lock_state();
        if self.publisher.subscriber_count() > 0 {
            return;
        }
        tracing::debug!(
            pending = state.pending.len(),
            "[NotificationQueue] last observer left"
        );
        state.cancel_timer();
    }
}

/// FIFO queue of user-facing notifications.
///
/// Cloning yields another handle to the same queue. The timer task is aborted
/// when the last handle is dropped.
#[derive(Clone)]
pub struct NotificationQueue {
    shared: Arc<Shared>,
    config: NotificationConfig,
}

impl NotificationQueue {
    /// Creates a queue whose timers run on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(config: NotificationConfig) -> Self {
        Self::with_runtime(config, Handle::current())
    }

    /// Creates a queue whose timers run on `runtime`.
    pub fn with_runtime(config: NotificationConfig, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    timer: TimerState::Idle,
                    generation: 0,
                }),
                publisher: Publisher::new(),
                runtime,
            }),
            config,
        }
    }

    /// Appends a notification to the tail of the queue.
    ///
    /// # Returns
    ///
    /// The generated notification id.
    ///
    /// # Errors
    ///
    /// Returns `AimError::InvalidTimeout` when `timeout_ms` is zero.
    pub fn enqueue(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        timeout_ms: u64,
    ) -> Result<String> {
        if timeout_ms == 0 {
            return Err(AimError::InvalidTimeout { timeout_ms });
        }

        let notification = Notification::new(message, kind, timeout_ms);
        let id = notification.id.clone();

        {
            let mut state = self.shared.lock_state();
            state.pending.push_back(notification);
            tracing::debug!(
                id = %id,
                kind = %kind,
                pending = state.pending.len(),
                "[NotificationQueue] enqueued"
            );
            self.shared.rearm(&mut state);
            self.shared.publisher.push(state.snapshot());
        }
        self.shared.publisher.flush();

        Ok(id)
    }

    /// Enqueues with the configured default timeout.
    pub fn enqueue_with_default_timeout(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Result<String> {
        self.enqueue(message, kind, self.config.default_timeout_ms)
    }

    pub fn default(&self, message: impl Into<String>, timeout_ms: u64) -> Result<String> {
        self.enqueue(message, NotificationKind::Default, timeout_ms)
    }

    pub fn danger(&self, message: impl Into<String>, timeout_ms: u64) -> Result<String> {
        self.enqueue(message, NotificationKind::Danger, timeout_ms)
    }

    pub fn warning(&self, message: impl Into<String>, timeout_ms: u64) -> Result<String> {
        self.enqueue(message, NotificationKind::Warning, timeout_ms)
    }

    pub fn info(&self, message: impl Into<String>, timeout_ms: u64) -> Result<String> {
        self.enqueue(message, NotificationKind::Info, timeout_ms)
    }

    pub fn success(&self, message: impl Into<String>, timeout_ms: u64) -> Result<String> {
        self.enqueue(message, NotificationKind::Success, timeout_ms)
    }

    /// Registers an observer of the pending list.
    ///
    /// The observer immediately receives the current snapshot, then a new
    /// snapshot on every enqueue and expiry. The first observer arms the
    /// timer for the current head; when the last one leaves the timer is
    /// cancelled and pending notifications stay where they are.
    pub fn subscribe(
        &self,
        observer: impl Observer<Vec<Notification>> + 'static,
    ) -> Subscription {
        let observer: Arc<dyn Observer<Vec<Notification>>> = Arc::new(observer);

        let subscription = {
            let mut state = self.shared.lock_state();
            let subscription = self
                .shared
                .publisher
                .subscribe_with(observer, state.snapshot());
            if matches!(state.timer, TimerState::Idle) {
                self.shared.rearm(&mut state);
            }
            subscription
        };
        self.shared.publisher.flush();

        let weak = Arc::downgrade(&self.shared);
        subscription.then(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_unsubscribe();
            }
        })
    }

    /// Current pending notifications, head first.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.shared.lock_state().snapshot()
    }

    pub fn len(&self) -> usize {
        self.shared.lock_state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn timer_status(&self) -> TimerStatus {
        match &self.shared.lock_state().timer {
            TimerState::Idle => TimerStatus::Idle,
            TimerState::Waiting {
                head_id, deadline, ..
            } => TimerStatus::Waiting {
                head_id: head_id.clone(),
                deadline: *deadline,
            },
        }
    }
}
