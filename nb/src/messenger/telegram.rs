//! Telegram Bot API messenger
//!
//! Talks to `{api_root}/bot{token}/{method}` directly with reqwest. The API root
//! is configurable so a self-hosted Bot API server can be used.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{Controls, Messenger, MessengerError};
use crate::config::{BOT_TOKEN_ENV, TelegramConfig};
use crate::domain::ChatId;

/// Telegram Bot API client
pub struct TelegramMessenger {
    api_root: String,
    token: String,
    http: Client,
}

impl TelegramMessenger {
    /// Create a messenger from configuration
    pub fn from_config(config: &TelegramConfig) -> Result<Self, MessengerError> {
        debug!(api_root = %config.api_root, "TelegramMessenger::from_config: called");
        let token = config
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MessengerError::MissingToken(BOT_TOKEN_ENV.to_string()))?;
        Self::new(&config.api_root, token, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(api_root: &str, token: String, timeout: Duration) -> Result<Self, MessengerError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_root: api_root.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_root, self.token, method)
    }

    /// Build the sendMessage body
    fn send_message_body(chat_id: ChatId, text: &str, controls: Option<&Controls>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(controls) = controls {
            body["reply_markup"] = inline_keyboard(controls);
        }
        body
    }

    /// POST a Bot API method and check the `ok` envelope
    async fn call(&self, method: &str, body: &serde_json::Value) -> Result<(), MessengerError> {
        debug!(%method, "TelegramMessenger::call: called");
        let response = self.http.post(self.method_url(method)).json(body).send().await?;
        let status = response.status();

        let parsed = match response.json::<ApiResponse>().await {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(MessengerError::Http {
                    method: method.to_string(),
                    status: status.as_u16(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !parsed.ok {
            return Err(MessengerError::Rejected {
                method: method.to_string(),
                description: parsed
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(&self, chat_id: ChatId, text: &str, controls: Option<&Controls>) -> Result<(), MessengerError> {
        debug!(%chat_id, text_len = text.len(), with_controls = controls.is_some(), "send_message: called");
        let body = Self::send_message_body(chat_id, text, controls);
        self.call("sendMessage", &body).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), MessengerError> {
        debug!(%callback_id, "answer_callback: called");
        let body = serde_json::json!({ "callback_query_id": callback_id });
        self.call("answerCallbackQuery", &body).await
    }
}

/// One row holding the Done and Stuck buttons
fn inline_keyboard(controls: &Controls) -> serde_json::Value {
    let row: Vec<serde_json::Value> = controls
        .buttons()
        .into_iter()
        .map(|(text, data)| {
            serde_json::json!({
                "text": text,
                "callback_data": data,
            })
        })
        .collect();
    serde_json::json!({ "inline_keyboard": [row] })
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn spawn_bot_api(reply: (StatusCode, serde_json::Value)) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        let app = Router::new().route(
            "/{bot}/{method}",
            post(move |Path((_bot, method)): Path<(String, String)>, axum::Json(body): axum::Json<serde_json::Value>| {
                let sink = sink.clone();
                let reply = reply.clone();
                async move {
                    sink.lock().unwrap().push((method, body));
                    (reply.0, axum::Json(reply.1))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    fn messenger(root: &str) -> TelegramMessenger {
        TelegramMessenger::new(root, "123:abc".to_string(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_send_message_body_with_controls() {
        let controls = Controls::for_task(&TaskId::from_string("t1"));
        let body = TelegramMessenger::send_message_body(42, "Go!", Some(&controls));

        assert_eq!(body["chat_id"], 42);
        assert_eq!(body["text"], "Go!");
        assert_eq!(body["parse_mode"], "HTML");
        let row = &body["reply_markup"]["inline_keyboard"][0];
        assert_eq!(row[0]["text"], "✅ Done");
        assert_eq!(row[0]["callback_data"], "done:t1");
        assert_eq!(row[1]["text"], "🆘 Stuck");
        assert_eq!(row[1]["callback_data"], "stuck:t1");
    }

    #[test]
    fn test_send_message_body_without_controls() {
        let body = TelegramMessenger::send_message_body(42, "Hi", None);
        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn test_method_url_trims_root() {
        let messenger = messenger("http://localhost:8081/");
        assert_eq!(messenger.method_url("sendMessage"), "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = TelegramConfig::default();
        let err = TelegramMessenger::from_config(&config).err().unwrap();
        assert!(matches!(err, MessengerError::MissingToken(_)));
    }

    #[tokio::test]
    async fn test_send_message_posts_to_bot_api() {
        let (root, captured) = spawn_bot_api((StatusCode::OK, serde_json::json!({"ok": true, "result": {}}))).await;
        let messenger = messenger(&root);

        messenger.send_message(7, "hello", None).await.unwrap();
        messenger.answer_callback("cb-9").await.unwrap();

        let calls = captured.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(calls[0].1["chat_id"], 7);
        assert_eq!(calls[1].0, "answerCallbackQuery");
        assert_eq!(calls[1].1["callback_query_id"], "cb-9");
    }

    #[tokio::test]
    async fn test_network_error_hides_token() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let messenger = TelegramMessenger::new(
            &format!("http://{}", addr),
            "999:SECRET-TOKEN".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = messenger.send_message(7, "hello", None).await.unwrap_err();

        assert!(matches!(err, MessengerError::Network(_)));
        assert!(!err.to_string().contains("SECRET-TOKEN"), "{err}");
        assert!(!format!("{err:?}").contains("SECRET-TOKEN"), "{err:?}");
    }

    #[tokio::test]
    async fn test_rejected_response_is_an_error() {
        let (root, _) = spawn_bot_api((
            StatusCode::BAD_REQUEST,
            serde_json::json!({"ok": false, "description": "Bad Request: chat not found"}),
        ))
        .await;

        let err = messenger(&root).send_message(7, "hello", None).await.unwrap_err();
        match err {
            MessengerError::Rejected { method, description } => {
                assert_eq!(method, "sendMessage");
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
