//! Queue builder: turns a raw goal dump into an ordered, tiered task list

use tracing::debug;

use super::task::{Task, Tier};

/// How many lines after the top goal are treated as mid-tier
pub const MID_TIER_SIZE: usize = 3;

/// Build an ordered task queue from multi-line text
///
/// Lines are trimmed and blank lines dropped. The first remaining line becomes
/// the top task, the next `MID_TIER_SIZE` become mid tasks and the rest are
/// extras. Submission order is preserved, so the queue is already sorted by tier.
pub fn build_queue(raw: &str) -> Vec<Task> {
    debug!(raw_len = raw.len(), "build_queue: called");
    let tasks: Vec<Task> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(idx, line)| Task::new(line, tier_for_position(idx)))
        .collect();
    debug!(task_count = tasks.len(), "build_queue: built");
    tasks
}

fn tier_for_position(idx: usize) -> Tier {
    match idx {
        0 => Tier::Top,
        i if i <= MID_TIER_SIZE => Tier::Mid,
        _ => Tier::Extra,
    }
}
