//! Telegram Update envelope (the subset the bot reads)

use serde::Deserialize;

use crate::domain::ChatId;

/// Inbound webhook payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// A chat message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: i64,
}

/// An inline button press
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl CallbackQuery {
    /// Chat to act on: the presser's private chat, else the chat the button lives in
    pub fn chat_id(&self) -> Option<ChatId> {
        self.from
            .as_ref()
            .map(|u| u.id)
            .or_else(|| self.message.as_ref().map(|m| m.chat.id))
    }
}
