//! Inbound text classification and callback payload parsing
//!
//! Kept separate from the controller so the heuristics can change on their own.

use tracing::debug;

use super::task::TaskId;

/// What a piece of inbound chat text means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `/start` (optionally addressed, e.g. `/start@my_bot`)
    Start,
    /// A multi-line goal list
    Goals(String),
    /// Plain-text completion of the current task
    Done,
    /// Plain-text request for help with the current task
    Stuck,
    /// Anything else
    Unrecognized,
}

/// Keywords that close the current task when typed instead of pressed
const DONE_WORDS: &[&str] = &["done", "✅ done", "finished"];

/// Keywords that ask for help with the current task
const STUCK_WORDS: &[&str] = &["stuck", "🆘 stuck"];

/// Classify a chat message
///
/// Any text containing a line break is a goal submission; single-line text
/// is matched against commands and keywords.
pub fn classify(text: &str) -> Inbound {
    let trimmed = text.trim();
    debug!(text_len = trimmed.len(), "classify: called");

    let command = trimmed.split('@').next().unwrap_or_default().to_lowercase();
    if command == "/start" {
        return Inbound::Start;
    }

    if trimmed.contains('\n') {
        return Inbound::Goals(trimmed.to_string());
    }

    let lowered = trimmed.to_lowercase();
    if DONE_WORDS.contains(&lowered.as_str()) {
        Inbound::Done
    } else if STUCK_WORDS.contains(&lowered.as_str()) {
        Inbound::Stuck
    } else {
        Inbound::Unrecognized
    }
}

/// Action carried by an inline button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Done,
    Stuck,
}

impl CallbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Stuck => "stuck",
        }
    }
}

impl std::str::FromStr for CallbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(Self::Done),
            "stuck" => Ok(Self::Stuck),
            _ => Err(format!("Unknown callback action: {}", s)),
        }
    }
}

/// Decoded `action:taskId` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub action: CallbackAction,
    pub task_id: TaskId,
}

/// Encode a button payload
pub fn callback_data(action: CallbackAction, task_id: &TaskId) -> String {
    format!("{}:{}", action.as_str(), task_id)
}

/// Decode a button payload; returns None for anything malformed
pub fn parse_callback(data: &str) -> Option<Callback> {
    debug!(%data, "parse_callback: called");
    let (action, id) = data.split_once(':')?;
    let action = action.parse::<CallbackAction>().ok()?;
    if id.is_empty() {
        return None;
    }
    Some(Callback {
        action,
        task_id: TaskId::from_string(id),
    })
}
