//! Session controller: the per-chat state machine
//!
//! Turns inbound updates into session mutations, reminder arming and
//! outbound messages. Every handler takes the session lock for the whole
//! event, so events for one chat are applied one at a time in arrival order.
//! Delivery and generation failures are logged here and never propagate to
//! the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coach::{CoachRole, CoachText, generate_or_fallback};
use crate::domain::{
    CallbackAction, ChatId, DoneOutcome, Inbound, Session, TaskId, build_queue, classify, parse_callback,
};
use crate::messenger::{CallbackQuery, Controls, Messenger, Update, escape_html};
use crate::reminder::ReminderScheduler;
use crate::state::SessionStore;

pub const GREETING: &str =
    "👋 Welcome! I'll ping you each morning to plan your day. You can also send your goals right now, one per line.";

pub const MORNING_PROMPT: &str = "🌞 Good morning!\n\
    • Send me <b>ONE top goal</b>.\n\
    • <b>THREE medium goals</b> (optional).\n\
    • Any extra tasks.\n\
    Put each on its own line.";

pub const HINT: &str = "I didn't catch that. Wait for the morning prompt or press buttons 😉";
pub const ALL_DONE: &str = "🥳 Day's list complete! Great work.";
pub const MARKED_DONE: &str = "🎉 Task marked done!";
pub const ALREADY_DONE: &str = "👍 That task is already done.";
pub const NO_SUCH_TASK: &str = "🤷 I can't find that task. It may be from an older list.";
pub const NO_OPEN_TASKS: &str = "I don't see any open tasks 🧐";
pub const NOTHING_TO_SCHEDULE: &str = "📭 Nothing to schedule. Send each goal on its own line.";

/// What handling an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Greeting sent
    Greeted,
    /// New queue installed; `focused` is the task now being nudged
    Scheduled { tasks: usize, focused: Option<TaskId> },
    /// Goal submission had no usable lines; existing queue untouched
    NothingToSchedule,
    /// The active task closed; `next` is the newly focused task, None when the list is complete
    Completed { next: Option<TaskId> },
    /// A non-active task closed; focus and reminder unchanged
    CompletedOutOfOrder,
    /// The task was already done
    AlreadyDone,
    /// Stuck help sent for the task
    Helped(TaskId),
    /// Referenced task does not exist in this chat
    NoSuchTask,
    /// Keyword used with nothing open
    NoOpenTasks,
    /// Fallback hint sent
    Hinted,
    /// Nothing actionable in the update
    Ignored,
}

/// Orchestrates sessions, reminders, the coach and the messenger
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    coach: Arc<dyn CoachText>,
    messenger: Arc<dyn Messenger>,
    reminders: ReminderScheduler,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        coach: Arc<dyn CoachText>,
        messenger: Arc<dyn Messenger>,
        interval: Duration,
    ) -> Self {
        debug!(interval_secs = interval.as_secs(), "SessionController::new: called");
        let reminders = ReminderScheduler::new(interval, store.clone(), coach.clone(), messenger.clone());
        Self {
            store,
            coach,
            messenger,
            reminders,
        }
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Dispatch one transport update
    pub async fn handle_update(&self, update: Update) -> Outcome {
        debug!(update_id = update.update_id, "handle_update: called");
        if let Some(query) = update.callback_query {
            return self.handle_callback(&query).await;
        }
        match update.message {
            Some(message) => match message.text {
                Some(text) => self.handle_text(message.chat.id, &text).await,
                None => {
                    debug!(chat_id = %message.chat.id, "handle_update: message without text");
                    Outcome::Ignored
                }
            },
            None => {
                debug!("handle_update: nothing to handle");
                Outcome::Ignored
            }
        }
    }

    /// Handle an inline button press
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Outcome {
        debug!(callback_id = %query.id, data = ?query.data, "handle_callback: called");
        if let Err(e) = self.messenger.answer_callback(&query.id).await {
            warn!(callback_id = %query.id, error = %e, "Failed to acknowledge button press");
        }

        let Some(chat_id) = query.chat_id() else {
            warn!(callback_id = %query.id, "Button press without a chat");
            return Outcome::Ignored;
        };
        let Some(callback) = query.data.as_deref().and_then(parse_callback) else {
            warn!(%chat_id, data = ?query.data, "Ignoring malformed button payload");
            return Outcome::Ignored;
        };

        match callback.action {
            CallbackAction::Done => self.complete(chat_id, Some(callback.task_id)).await,
            CallbackAction::Stuck => self.stuck(chat_id, Some(callback.task_id)).await,
        }
    }

    /// Handle a chat message
    pub async fn handle_text(&self, chat_id: ChatId, text: &str) -> Outcome {
        debug!(%chat_id, text_len = text.len(), "handle_text: called");
        match classify(text) {
            Inbound::Start => self.greet(chat_id).await,
            Inbound::Goals(raw) => self.submit_goals(chat_id, &raw).await,
            Inbound::Done => self.complete(chat_id, None).await,
            Inbound::Stuck => self.stuck(chat_id, None).await,
            Inbound::Unrecognized => {
                self.store.get_or_create(chat_id).await;
                self.say(chat_id, HINT, None).await;
                Outcome::Hinted
            }
        }
    }

    async fn greet(&self, chat_id: ChatId) -> Outcome {
        debug!(%chat_id, "greet: called");
        self.store.get_or_create(chat_id).await;
        self.say(chat_id, GREETING, None).await;
        Outcome::Greeted
    }

    /// Replace the chat's queue with a new goal list and focus its first task
    pub async fn submit_goals(&self, chat_id: ChatId, raw: &str) -> Outcome {
        debug!(%chat_id, raw_len = raw.len(), "submit_goals: called");
        let tasks = build_queue(raw);
        let Some(top) = tasks.first().map(|t| t.text().to_string()) else {
            self.say(chat_id, NOTHING_TO_SCHEDULE, None).await;
            return Outcome::NothingToSchedule;
        };
        let count = tasks.len();

        let session_ref = self.store.get_or_create(chat_id).await;
        let mut session = session_ref.lock().await;
        session.replace_queue(tasks);
        info!(%chat_id, tasks = count, "Goal list scheduled");

        let ack = generate_or_fallback(self.coach.as_ref(), CoachRole::Ack, &top).await;
        self.say(chat_id, &escape_html(&ack), None).await;

        let focused = self.focus(&mut session).await;
        Outcome::Scheduled { tasks: count, focused }
    }

    /// Close a task; `None` means the current active task
    pub async fn complete(&self, chat_id: ChatId, task_id: Option<TaskId>) -> Outcome {
        debug!(%chat_id, task_id = ?task_id, "complete: called");
        let session_ref = self.store.get_or_create(chat_id).await;
        let mut session = session_ref.lock().await;

        let task_id = match task_id {
            Some(id) => id,
            None => match session.active() {
                Some(task) => task.id().clone(),
                None => {
                    self.say(chat_id, NO_OPEN_TASKS, None).await;
                    return Outcome::NoOpenTasks;
                }
            },
        };

        match session.mark_done(&task_id) {
            DoneOutcome::Unknown => {
                self.say(chat_id, NO_SUCH_TASK, None).await;
                Outcome::NoSuchTask
            }
            DoneOutcome::AlreadyDone => {
                self.say(chat_id, ALREADY_DONE, None).await;
                Outcome::AlreadyDone
            }
            DoneOutcome::Completed { was_active: false } => {
                info!(%chat_id, %task_id, "Task done out of order");
                self.say(chat_id, MARKED_DONE, None).await;
                Outcome::CompletedOutOfOrder
            }
            DoneOutcome::Completed { was_active: true } => {
                info!(%chat_id, %task_id, "Active task done");
                session.cancel_reminder();
                self.say(chat_id, MARKED_DONE, None).await;
                let next = self.focus(&mut session).await;
                Outcome::Completed { next }
            }
        }
    }

    /// Send stuck help for a task; `None` means the current active task
    ///
    /// The reminder keeps its schedule.
    pub async fn stuck(&self, chat_id: ChatId, task_id: Option<TaskId>) -> Outcome {
        debug!(%chat_id, task_id = ?task_id, "stuck: called");
        let session_ref = self.store.get_or_create(chat_id).await;
        let session = session_ref.lock().await;

        let task = match &task_id {
            Some(id) => match session.task(id) {
                Some(task) => task,
                None => {
                    self.say(chat_id, NO_SUCH_TASK, None).await;
                    return Outcome::NoSuchTask;
                }
            },
            None => match session.active() {
                Some(task) => task,
                None => {
                    self.say(chat_id, NO_OPEN_TASKS, None).await;
                    return Outcome::NoOpenTasks;
                }
            },
        };
        if task.is_done() {
            self.say(chat_id, ALREADY_DONE, None).await;
            return Outcome::AlreadyDone;
        }

        let id = task.id().clone();
        let subject = task.text().to_string();
        let tip = generate_or_fallback(self.coach.as_ref(), CoachRole::Stuck, &subject).await;
        self.say(chat_id, &escape_html(&tip), Some(&Controls::for_task(&id))).await;
        Outcome::Helped(id)
    }

    /// Send the morning prompt to every known chat. Returns how many were delivered.
    pub async fn morning_tick(&self) -> usize {
        let chat_ids = self.store.chat_ids().await;
        info!(sessions = chat_ids.len(), "Sending morning prompt");

        let mut delivered = 0;
        for chat_id in chat_ids {
            if self.say(chat_id, MORNING_PROMPT, None).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Advance to the next open task: coach it, attach controls, arm its reminder
    ///
    /// Must be called with the session lock held. With nothing left open the
    /// reminder is cleared and the list is celebrated.
    async fn focus(&self, session: &mut Session) -> Option<TaskId> {
        let chat_id = session.chat_id();
        debug!(%chat_id, "focus: called");

        let Some((id, subject)) = session.next_active().map(|t| (t.id().clone(), t.text().to_string())) else {
            session.cancel_reminder();
            info!(%chat_id, "All tasks done");
            self.say(chat_id, ALL_DONE, None).await;
            return None;
        };

        let text = generate_or_fallback(self.coach.as_ref(), CoachRole::Coach, &subject).await;
        self.say(chat_id, &escape_html(&text), Some(&Controls::for_task(&id))).await;
        session.set_reminder(self.reminders.arm(chat_id, id.clone()));
        Some(id)
    }

    /// Deliver a message; failures are logged and reported as false
    async fn say(&self, chat_id: ChatId, text: &str, controls: Option<&Controls>) -> bool {
        match self.messenger.send_message(chat_id, text, controls).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%chat_id, error = %e, "Message delivery failed");
                false
            }
        }
    }
}
