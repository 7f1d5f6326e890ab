//! Per-task reminder loops
//!
//! A reminder is a repeating background task bound to one (chat, task) pair.
//! Every interval it re-reads the session: if the task is gone or done, the
//! loop stops on its own; otherwise it asks the coach for a nudge and sends
//! it with the task controls.
//!
//! The session record owns the [`ReminderHandle`]. Cancelling is idempotent
//! and aborts the background task, so once `cancel` returns no new firing
//! begins. A firing that is already generating text re-checks the task under
//! the session lock before sending, which closes the race with a concurrent
//! completion.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coach::{CoachRole, CoachText};
use crate::domain::{ChatId, TaskId};
use crate::messenger::{Controls, Messenger, escape_html};
use crate::state::SessionStore;

const LIVE: u8 = 0;
const CANCELLED: u8 = 1;
const TERMINATED: u8 = 2;

/// Snapshot of reminder activity since the scheduler was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderStats {
    pub armed: u64,
    pub cancelled: u64,
    pub terminated: u64,
    pub nudges_sent: u64,
    pub nudge_failures: u64,
}

impl ReminderStats {
    /// Reminders armed and not yet stopped
    pub fn outstanding(&self) -> u64 {
        self.armed.saturating_sub(self.cancelled + self.terminated)
    }
}

#[derive(Debug, Default)]
struct Counters {
    armed: AtomicU64,
    cancelled: AtomicU64,
    terminated: AtomicU64,
    nudges_sent: AtomicU64,
    nudge_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ReminderStats {
        ReminderStats {
            armed: self.armed.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            terminated: self.terminated.load(Ordering::SeqCst),
            nudges_sent: self.nudges_sent.load(Ordering::SeqCst),
            nudge_failures: self.nudge_failures.load(Ordering::SeqCst),
        }
    }
}

/// Revocable handle to one reminder loop
///
/// Dropping the handle cancels the loop.
pub struct ReminderHandle {
    chat_id: ChatId,
    task_id: TaskId,
    state: Arc<AtomicU8>,
    counters: Arc<Counters>,
    join: JoinHandle<()>,
}

impl ReminderHandle {
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// True until the loop is cancelled or stops on its own
    pub fn is_live(&self) -> bool {
        self.state.load(Ordering::SeqCst) == LIVE
    }

    /// Stop future firings. Returns true only for the call that actually stopped it.
    pub fn cancel(&self) -> bool {
        if self
            .state
            .compare_exchange(LIVE, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(chat_id = %self.chat_id, task_id = %self.task_id, "ReminderHandle::cancel: already stopped");
            return false;
        }
        self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        self.join.abort();
        debug!(chat_id = %self.chat_id, task_id = %self.task_id, "ReminderHandle::cancel: cancelled");
        true
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for ReminderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::SeqCst) {
            LIVE => "live",
            CANCELLED => "cancelled",
            _ => "terminated",
        };
        f.debug_struct("ReminderHandle")
            .field("chat_id", &self.chat_id)
            .field("task_id", &self.task_id)
            .field("state", &state)
            .finish()
    }
}

/// What a single firing did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FireOutcome {
    /// Nudge delivered
    Sent,
    /// Generation or delivery failed; try again next interval
    Failed,
    /// Task (or session) gone or done; the loop should stop
    Stale,
    /// Handle was cancelled while the firing was in flight
    Cancelled,
}

/// Spawns reminder loops that share collaborators and counters
#[derive(Clone)]
pub struct ReminderScheduler {
    interval: Duration,
    store: Arc<dyn SessionStore>,
    coach: Arc<dyn CoachText>,
    messenger: Arc<dyn Messenger>,
    counters: Arc<Counters>,
}

impl ReminderScheduler {
    pub fn new(
        interval: Duration,
        store: Arc<dyn SessionStore>,
        coach: Arc<dyn CoachText>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        debug!(interval_secs = interval.as_secs(), "ReminderScheduler::new: called");
        Self {
            interval,
            store,
            coach,
            messenger,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> ReminderStats {
        self.counters.snapshot()
    }

    /// Start a reminder loop for `task_id`
    ///
    /// The caller must install the returned handle on the session (which
    /// cancels any previous one) while holding the session lock.
    pub fn arm(&self, chat_id: ChatId, task_id: TaskId) -> ReminderHandle {
        debug!(%chat_id, %task_id, "ReminderScheduler::arm: called");
        self.counters.armed.fetch_add(1, Ordering::SeqCst);

        let state = Arc::new(AtomicU8::new(LIVE));
        let scheduler = self.clone();
        let loop_state = state.clone();
        let loop_task = task_id.clone();
        let join = tokio::spawn(async move {
            scheduler.run(chat_id, loop_task, loop_state).await;
        });

        ReminderHandle {
            chat_id,
            task_id,
            state,
            counters: self.counters.clone(),
            join,
        }
    }

    async fn run(self, chat_id: ChatId, task_id: TaskId, state: Arc<AtomicU8>) {
        debug!(%chat_id, %task_id, "ReminderScheduler::run: started");
        loop {
            tokio::time::sleep(self.interval).await;
            if state.load(Ordering::SeqCst) != LIVE {
                return;
            }

            match self.fire(chat_id, &task_id, &state).await {
                FireOutcome::Sent | FireOutcome::Failed => continue,
                FireOutcome::Cancelled => return,
                FireOutcome::Stale => {
                    if state
                        .compare_exchange(LIVE, TERMINATED, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        self.counters.terminated.fetch_add(1, Ordering::SeqCst);
                        info!(%chat_id, %task_id, "Reminder stopped: task closed or replaced");
                    }
                    return;
                }
            }
        }
    }

    /// One firing: re-check, generate, re-check under the lock, send
    pub(crate) async fn fire(&self, chat_id: ChatId, task_id: &TaskId, state: &AtomicU8) -> FireOutcome {
        debug!(%chat_id, %task_id, "ReminderScheduler::fire: called");
        let Some(session_ref) = self.store.get(chat_id).await else {
            return FireOutcome::Stale;
        };

        let subject = {
            let session = session_ref.lock().await;
            if state.load(Ordering::SeqCst) != LIVE {
                return FireOutcome::Cancelled;
            }
            match session.task(task_id) {
                Some(task) if !task.is_done() => task.text().to_string(),
                _ => return FireOutcome::Stale,
            }
        };

        let text = match self.coach.generate(CoachRole::Remind, &subject).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%chat_id, %task_id, error = %e, "Reminder nudge generation failed; will retry next interval");
                self.counters.nudge_failures.fetch_add(1, Ordering::SeqCst);
                return FireOutcome::Failed;
            }
        };

        // Held until the send completes so a completion cannot slip in between
        let session = session_ref.lock().await;
        if state.load(Ordering::SeqCst) != LIVE {
            debug!(%chat_id, %task_id, "ReminderScheduler::fire: cancelled during generation");
            return FireOutcome::Cancelled;
        }
        if !session.task(task_id).is_some_and(|t| !t.is_done()) {
            debug!(%chat_id, %task_id, "ReminderScheduler::fire: task closed during generation");
            return FireOutcome::Stale;
        }

        let controls = Controls::for_task(task_id);
        match self
            .messenger
            .send_message(chat_id, &escape_html(&text), Some(&controls))
            .await
        {
            Ok(()) => {
                self.counters.nudges_sent.fetch_add(1, Ordering::SeqCst);
                FireOutcome::Sent
            }
            Err(e) => {
                warn!(%chat_id, %task_id, error = %e, "Reminder nudge delivery failed; will retry next interval");
                self.counters.nudge_failures.fetch_add(1, Ordering::SeqCst);
                FireOutcome::Failed
            }
        }
    }
}
