//! Chat transport: outbound delivery and the inbound update envelope

use async_trait::async_trait;

mod error;
mod telegram;
mod update;

pub use error::MessengerError;
pub use telegram::TelegramMessenger;
pub use update::{CallbackQuery, Chat, Message, Update, User};

use crate::domain::{CallbackAction, ChatId, TaskId, callback_data};

/// Label on the completion button
pub const DONE_LABEL: &str = "✅ Done";

/// Label on the help button
pub const STUCK_LABEL: &str = "🆘 Stuck";

/// The Done / Stuck button pair attached to task messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    task_id: TaskId,
}

impl Controls {
    pub fn for_task(task_id: &TaskId) -> Self {
        Self {
            task_id: task_id.clone(),
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Button labels with their callback payloads, in display order
    pub fn buttons(&self) -> [(&'static str, String); 2] {
        [
            (DONE_LABEL, callback_data(CallbackAction::Done, &self.task_id)),
            (STUCK_LABEL, callback_data(CallbackAction::Stuck, &self.task_id)),
        ]
    }
}

/// Outbound side of the chat transport
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send HTML-formatted text, optionally with task controls
    async fn send_message(&self, chat_id: ChatId, text: &str, controls: Option<&Controls>) -> Result<(), MessengerError>;

    /// Acknowledge a button press so the client stops showing a spinner
    async fn answer_callback(&self, callback_id: &str) -> Result<(), MessengerError>;
}

/// Escape text for HTML parse mode
///
/// Task text and generated text both come from outside and must not be
/// interpreted as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_buttons() {
        let id = TaskId::from_string("abc-123");
        let controls = Controls::for_task(&id);
        let [done, stuck] = controls.buttons();

        assert_eq!(done, ("✅ Done", "done:abc-123".to_string()));
        assert_eq!(stuck, ("🆘 Stuck", "stuck:abc-123".to_string()));
        assert_eq!(controls.task_id(), &id);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Fix <div> & ship"), "Fix &lt;div&gt; &amp; ship");
        assert_eq!(escape_html("plain"), "plain");
    }
}
