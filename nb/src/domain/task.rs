//! Task entity and priority tiers

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Priority tier, assigned solely by a task's position in the submitted list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// The single most important goal of the day (first line)
    Top,
    /// Up to three follow-up goals
    Mid,
    /// Everything else
    Extra,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Mid => write!(f, "mid"),
            Self::Extra => write!(f, "extra"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "mid" => Ok(Self::Mid),
            "extra" => Ok(Self::Extra),
            _ => Err(format!("Unknown tier: {}", s)),
        }
    }
}

/// Opaque task identifier, also used as the correlation id in button payloads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh, globally unique id (UUID v7)
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Wrap an id received from the outside (e.g. a callback payload)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One goal from the user's daily list
///
/// Identity, text and tier never change after creation. The done flag only
/// ever moves from false to true.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    id: TaskId,
    text: String,
    tier: Tier,
    done: bool,
}

impl Task {
    /// Create a new open task with a generated id
    pub fn new(text: impl Into<String>, tier: Tier) -> Self {
        let text = text.into();
        debug!(%tier, text_len = text.len(), "Task::new: called");
        debug_assert!(!text.trim().is_empty(), "task text must not be empty");
        Self {
            id: TaskId::generate(),
            text,
            tier,
            done: false,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Mark the task done. Returns true only if this call flipped the flag.
    pub fn mark_done(&mut self) -> bool {
        debug!(id = %self.id, was_done = self.done, "Task::mark_done: called");
        let flipped = !self.done;
        self.done = true;
        flipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Top < Tier::Mid);
        assert!(Tier::Mid < Tier::Extra);
    }

    #[test]
    fn test_tier_display_and_parse() {
        assert_eq!(Tier::Mid.to_string(), "mid");
        assert_eq!("EXTRA".parse::<Tier>().unwrap(), Tier::Extra);
        assert!("urgent".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_serde() {
        let json = serde_json::to_string(&Tier::Top).unwrap();
        assert_eq!(json, "\"top\"");
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::new("Write report", Tier::Top);
        let b = Task::new("Write report", Tier::Top);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_mark_done_is_monotonic() {
        let mut task = Task::new("Call Bob", Tier::Mid);
        assert!(!task.is_done());

        assert!(task.mark_done());
        assert!(task.is_done());

        // Second call does not flip anything
        assert!(!task.mark_done());
        assert!(task.is_done());
    }
}
