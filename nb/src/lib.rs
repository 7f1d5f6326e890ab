//! nudgebot - task accountability chat bot
//!
//! A user sends a daily goal list; the bot queues it by priority, focuses one
//! task at a time, nudges on a fixed interval until the task is marked done,
//! and writes its coaching lines with a language model.

pub mod cli;
pub mod coach;
pub mod config;
pub mod controller;
pub mod domain;
pub mod llm;
pub mod messenger;
pub mod morning;
pub mod reminder;
pub mod server;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod webhook;

pub use coach::{CoachRole, CoachText, LlmCoach};
pub use config::Config;
pub use controller::{Outcome, SessionController};
pub use domain::{ChatId, Phase, Session, Task, TaskId, Tier};
pub use messenger::{Controls, Messenger, MessengerError, TelegramMessenger};
pub use reminder::{ReminderHandle, ReminderScheduler, ReminderStats};
pub use state::{MemorySessionStore, SessionRef, SessionStore};
