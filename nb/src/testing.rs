//! Test infrastructure: ScriptedCoach, RecordingMessenger and TestHarness.
//!
//! Provides a fully wired controller with in-memory state and fake
//! collaborators, for tests that exercise the real event handling and
//! reminder loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use crate::coach::{CoachRole, CoachText};
use crate::controller::SessionController;
use crate::domain::ChatId;
use crate::llm::LlmError;
use crate::messenger::{Controls, Messenger, MessengerError};
use crate::state::{MemorySessionStore, SessionStore};

/// Poll step used by the wait helpers; with paused time this also lets the clock advance
const POLL_STEP: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// ScriptedCoach
// ---------------------------------------------------------------------------

/// Coach that answers `"[role] subject"`, optionally failing or blocking
pub struct ScriptedCoach {
    calls: Mutex<Vec<(CoachRole, String)>>,
    failing: AtomicBool,
    gate: Option<Semaphore>,
}

impl ScriptedCoach {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Every generation fails
    pub fn failing() -> Self {
        let coach = Self::new();
        coach.set_failing(true);
        coach
    }

    /// Every generation blocks until `release` is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// The text a successful generation returns
    pub fn reply(role: CoachRole, subject: &str) -> String {
        format!("[{}] {}", role, subject)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Let `n` blocked generations finish
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub async fn calls(&self) -> Vec<(CoachRole, String)> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_for(&self, role: CoachRole) -> usize {
        self.calls.lock().await.iter().filter(|(r, _)| *r == role).count()
    }

    /// Wait until at least `n` generations have started
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls.lock().await.len() < n {
            tokio::time::sleep(POLL_STEP).await;
        }
    }
}

impl Default for ScriptedCoach {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoachText for ScriptedCoach {
    async fn generate(&self, role: CoachRole, subject: &str) -> Result<String, LlmError> {
        self.calls.lock().await.push((role, subject.to_string()));

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| LlmError::InvalidResponse("gate closed".to_string()))?
                .forget();
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::ApiError {
                status: 503,
                message: "scripted failure".to_string(),
            });
        }
        Ok(Self::reply(role, subject))
    }
}

// ---------------------------------------------------------------------------
// RecordingMessenger
// ---------------------------------------------------------------------------

/// A message delivered through `RecordingMessenger`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub controls: Option<Controls>,
}

/// Messenger that records deliveries instead of sending them
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    answered: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            answered: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Every send fails (and is not recorded)
    pub fn failing() -> Self {
        let messenger = Self::new();
        messenger.set_failing(true);
        messenger
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn texts_for(&self, chat_id: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub async fn last(&self) -> Option<SentMessage> {
        self.sent.lock().await.last().cloned()
    }

    pub async fn answered(&self) -> Vec<String> {
        self.answered.lock().await.clone()
    }

    /// Send attempts, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    /// Wait until at least `n` messages have been delivered
    pub async fn wait_for_sent(&self, n: usize) {
        while self.sent.lock().await.len() < n {
            tokio::time::sleep(POLL_STEP).await;
        }
    }
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat_id: ChatId, text: &str, controls: Option<&Controls>) -> Result<(), MessengerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MessengerError::Rejected {
                method: "sendMessage".to_string(),
                description: "scripted failure".to_string(),
            });
        }
        self.sent.lock().await.push(SentMessage {
            chat_id,
            text: text.to_string(),
            controls: controls.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), MessengerError> {
        self.answered.lock().await.push(callback_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TestHarness
// ---------------------------------------------------------------------------

/// A controller wired to in-memory state and fake collaborators
pub struct TestHarness {
    pub controller: Arc<SessionController>,
    pub store: Arc<MemorySessionStore>,
    pub coach: Arc<ScriptedCoach>,
    pub messenger: Arc<RecordingMessenger>,
}

impl TestHarness {
    /// Harness with a well-behaved coach
    pub fn new(interval: Duration) -> Self {
        Self::with_coach(interval, ScriptedCoach::new())
    }

    pub fn with_coach(interval: Duration, coach: ScriptedCoach) -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let coach = Arc::new(coach);
        let messenger = Arc::new(RecordingMessenger::new());
        let controller = Arc::new(SessionController::new(
            store.clone() as Arc<dyn SessionStore>,
            coach.clone() as Arc<dyn CoachText>,
            messenger.clone() as Arc<dyn Messenger>,
            interval,
        ));
        Self {
            controller,
            store,
            coach,
            messenger,
        }
    }
}
