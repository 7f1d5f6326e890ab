//! Per-chat session record: task queue, progress pointer and reminder handle

use tracing::debug;

use super::task::{Task, TaskId};
use crate::reminder::ReminderHandle;

/// Chat identity as delivered by the transport
pub type ChatId = i64;

/// Where a session is in its daily cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing submitted yet
    NoQueue,
    /// At least one open task
    Active,
    /// Every task in the queue is done
    AllDone,
}

/// Result of marking a task done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoneOutcome {
    /// No task with that id in this session
    Unknown,
    /// The task was already done; nothing changed
    AlreadyDone,
    /// The task flipped to done. `was_active` is true when it was the current task.
    Completed { was_active: bool },
}

/// State owned by one chat identity
///
/// The queue is ordered by priority (top, then mid, then extra). `pointer`
/// marks the first not-yet-done task as of the last advance and never moves
/// backwards while the queue lives.
#[derive(Debug)]
pub struct Session {
    chat_id: ChatId,
    tasks: Vec<Task>,
    pointer: usize,
    reminder: Option<ReminderHandle>,
}

impl Session {
    pub fn new(chat_id: ChatId) -> Self {
        debug!(%chat_id, "Session::new: called");
        Self {
            chat_id,
            tasks: Vec::new(),
            pointer: 0,
            reminder: None,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn phase(&self) -> Phase {
        if self.tasks.is_empty() {
            Phase::NoQueue
        } else if self.active().is_some() {
            Phase::Active
        } else {
            Phase::AllDone
        }
    }

    /// Replace the whole queue, cancelling any outstanding reminder first
    pub fn replace_queue(&mut self, tasks: Vec<Task>) {
        debug!(chat_id = %self.chat_id, old = self.tasks.len(), new = tasks.len(), "Session::replace_queue: called");
        self.cancel_reminder();
        self.tasks = tasks;
        self.pointer = 0;
    }

    /// Advance the pointer past done tasks and return the active task, if any
    ///
    /// Scanning starts at the stored pointer, so indices already skipped are
    /// never revisited.
    pub fn next_active(&mut self) -> Option<&Task> {
        debug!(chat_id = %self.chat_id, pointer = self.pointer, "Session::next_active: called");
        while self.pointer < self.tasks.len() && self.tasks[self.pointer].is_done() {
            self.pointer += 1;
        }
        debug!(chat_id = %self.chat_id, pointer = self.pointer, "Session::next_active: advanced");
        self.tasks.get(self.pointer)
    }

    /// Peek at the active task without moving the pointer
    pub fn active(&self) -> Option<&Task> {
        self.tasks.iter().skip(self.pointer).find(|t| !t.is_done())
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    /// Mark a specific task done
    ///
    /// Does not touch the pointer or the reminder; the controller decides what
    /// to do based on the returned outcome.
    pub fn mark_done(&mut self, id: &TaskId) -> DoneOutcome {
        debug!(chat_id = %self.chat_id, %id, "Session::mark_done: called");
        let was_active = self.active().is_some_and(|t| t.id() == id);
        match self.tasks.iter_mut().find(|t| t.id() == id) {
            None => {
                debug!(%id, "Session::mark_done: unknown task");
                DoneOutcome::Unknown
            }
            Some(task) => {
                if task.mark_done() {
                    DoneOutcome::Completed { was_active }
                } else {
                    debug!(%id, "Session::mark_done: already done");
                    DoneOutcome::AlreadyDone
                }
            }
        }
    }

    /// Install a new reminder, cancelling the previous one first
    pub fn set_reminder(&mut self, handle: ReminderHandle) {
        debug!(chat_id = %self.chat_id, task_id = %handle.task_id(), "Session::set_reminder: called");
        self.cancel_reminder();
        self.reminder = Some(handle);
    }

    /// Cancel and drop the current reminder. Returns true if one was live.
    pub fn cancel_reminder(&mut self) -> bool {
        match self.reminder.take() {
            Some(handle) => {
                let was_live = handle.cancel();
                debug!(chat_id = %self.chat_id, task_id = %handle.task_id(), was_live, "Session::cancel_reminder: cancelled");
                was_live
            }
            None => false,
        }
    }

    pub fn reminder(&self) -> Option<&ReminderHandle> {
        self.reminder.as_ref()
    }

    /// True when a reminder is installed and has not stopped yet
    pub fn has_live_reminder(&self) -> bool {
        self.reminder.as_ref().is_some_and(|r| r.is_live())
    }
}
