//! Coaching text generation
//!
//! Every user-facing line about a task is written by the model through
//! [`CoachText`]. Calls share one admission gate so only a bounded number of
//! generation requests are in flight across the whole process.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message};

/// Persona shared by every generation request
pub const SYSTEM_PROMPT: &str = "You are \"NudgeBot\", an upbeat ADHD productivity coach.
Rules:
- Replies <= 40 words, first-person, friendly tone.
- Suggest 1 concrete action when the user is stuck.
- Celebrate completion with an emoji.";

/// Token ceiling for one coaching reply
pub const MAX_COACH_TOKENS: u32 = 60;

/// What the generated text is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoachRole {
    /// Acknowledge a freshly submitted goal list
    Ack,
    /// Periodic nudge while a task stays open
    Remind,
    /// Help with a task the user is stuck on
    Stuck,
    /// Kick off focus on the next task
    Coach,
}

impl CoachRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoachRole::Ack => "ack",
            CoachRole::Remind => "remind",
            CoachRole::Stuck => "stuck",
            CoachRole::Coach => "coach",
        }
    }

    /// The user turn sent to the model
    pub fn prompt(&self, subject: &str) -> String {
        match self {
            CoachRole::Ack => format!("I've planned my goals for today. My top goal: {}", subject),
            CoachRole::Remind => format!("I haven't finished: {}", subject),
            CoachRole::Stuck => format!("I'm stuck on: {}", subject),
            CoachRole::Coach => format!("Start focusing on: {}", subject),
        }
    }

    /// Static text used when generation fails
    pub fn fallback(&self, subject: &str) -> String {
        match self {
            CoachRole::Ack => "📝 Got it, your list is set! Let's start with the top goal.".to_string(),
            CoachRole::Remind => format!("⏰ Still on it? Keep going with: {}", subject),
            CoachRole::Stuck => format!("🧩 Try the smallest next step on \"{}\" for just five minutes.", subject),
            CoachRole::Coach => format!("🎯 Next up: {}. You've got this!", subject),
        }
    }
}

impl fmt::Display for CoachRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of coaching text
#[async_trait]
pub trait CoachText: Send + Sync {
    /// Generate short coaching text for `subject` in the given role
    async fn generate(&self, role: CoachRole, subject: &str) -> Result<String, LlmError>;
}

/// Generate text, falling back to the role's static template on failure
pub async fn generate_or_fallback(coach: &dyn CoachText, role: CoachRole, subject: &str) -> String {
    match coach.generate(role, subject).await {
        Ok(text) => text,
        Err(e) => {
            warn!(%role, error = %e, "generate_or_fallback: generation failed, using template");
            role.fallback(subject)
        }
    }
}

/// Coaching text from an LLM, behind a counting admission gate
pub struct LlmCoach {
    client: Arc<dyn LlmClient>,
    gate: Arc<Semaphore>,
    max_tokens: u32,
}

impl LlmCoach {
    pub fn new(client: Arc<dyn LlmClient>, max_in_flight: usize) -> Self {
        debug!(%max_in_flight, "LlmCoach::new: called");
        Self {
            client,
            gate: Arc::new(Semaphore::new(max_in_flight.max(1))),
            max_tokens: MAX_COACH_TOKENS,
        }
    }

    /// Free generation slots right now
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }
}

#[async_trait]
impl CoachText for LlmCoach {
    async fn generate(&self, role: CoachRole, subject: &str) -> Result<String, LlmError> {
        debug!(%role, subject_len = subject.len(), "LlmCoach::generate: called");

        // Semaphore is never closed while the coach lives
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| LlmError::InvalidResponse("admission gate closed".to_string()))?;

        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: vec![Message::user(role.prompt(subject))],
            max_tokens: self.max_tokens,
        };
        let response = self.client.complete(request).await?;
        debug!(%role, output_tokens = response.usage.output_tokens, "LlmCoach::generate: completed");

        response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}
