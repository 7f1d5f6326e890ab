//! HTTP ingestion: the Telegram webhook and a health check
//!
//! The webhook always answers `{"ok": true}`. Malformed bodies and handling
//! failures are logged, never surfaced to the transport, so it does not
//! redeliver.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, warn};

use crate::controller::SessionController;
use crate::messenger::Update;

/// Path the transport posts updates to
pub const WEBHOOK_PATH: &str = "/telegram/webhook";

#[derive(Clone)]
struct WebhookState {
    controller: Arc<SessionController>,
}

/// Build the HTTP router
pub fn router(controller: Arc<SessionController>) -> Router {
    debug!("router: called");
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(telegram_webhook))
        .with_state(WebhookState { controller })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn telegram_webhook(State(state): State<WebhookState>, body: Bytes) -> impl IntoResponse {
    debug!(body_len = body.len(), "telegram_webhook: called");
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            let update_id = update.update_id;
            let outcome = state.controller.handle_update(update).await;
            debug!(update_id, ?outcome, "telegram_webhook: handled");
        }
        Err(e) => {
            warn!(error = %e, "Ignoring malformed update");
        }
    }
    Json(serde_json::json!({ "ok": true }))
}
