//! Domain types for nudgebot
//!
//! Task, Session and the pure pieces of the daily cycle: queue building,
//! pointer advancing and input classification.

mod input;
mod queue;
mod session;
mod task;

pub use input::{Callback, CallbackAction, Inbound, callback_data, classify, parse_callback};
pub use queue::{MID_TIER_SIZE, build_queue};
pub use session::{ChatId, DoneOutcome, Phase, Session};
pub use task::{Task, TaskId, Tier};
