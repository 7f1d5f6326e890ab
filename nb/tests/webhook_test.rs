//! End-to-end tests: HTTP webhook -> controller -> fake messenger

use std::time::Duration;

use nudgebot::coach::CoachRole;
use nudgebot::controller::{GREETING, MARKED_DONE};
use nudgebot::messenger::Controls;
use nudgebot::testing::{ScriptedCoach, TestHarness};
use nudgebot::{SessionStore, TaskId, server, webhook};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const INTERVAL: Duration = Duration::from_secs(25 * 60);

async fn spawn_webhook(h: &TestHarness) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = webhook::router(h.controller.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post_update(base: &str, body: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}{}", base, webhook::WEBHOOK_PATH))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

fn message(chat_id: i64, text: &str) -> String {
    json!({
        "update_id": 1,
        "message": {"message_id": 1, "chat": {"id": chat_id}, "text": text}
    })
    .to_string()
}

fn button(chat_id: i64, data: &str) -> String {
    json!({
        "update_id": 2,
        "callback_query": {"id": "cb-7", "from": {"id": chat_id}, "data": data}
    })
    .to_string()
}

async fn task_ids(h: &TestHarness, chat_id: i64) -> Vec<TaskId> {
    let session_ref = h.store.get(chat_id).await.unwrap();
    let session = session_ref.lock().await;
    session.tasks().iter().map(|t| t.id().clone()).collect()
}

#[tokio::test]
async fn test_health() {
    let h = TestHarness::new(INTERVAL);
    let base = spawn_webhook(&h).await;

    let body: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_malformed_bodies_are_acknowledged() {
    let h = TestHarness::new(INTERVAL);
    let base = spawn_webhook(&h).await;

    for body in ["not json", "{}", r#"{"message": {"chat": "oops"}}"#, r#"{"edited_message": {}}"#] {
        let (status, reply) = post_update(&base, body).await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(reply, json!({"ok": true}), "{body}");
    }
    assert!(h.messenger.sent().await.is_empty());
}

#[tokio::test]
async fn test_start_command() {
    let h = TestHarness::new(INTERVAL);
    let base = spawn_webhook(&h).await;

    let (status, reply) = post_update(&base, &message(11, "/start")).await;
    assert_eq!(status, 200);
    assert_eq!(reply, json!({"ok": true}));
    assert_eq!(h.messenger.texts_for(11).await, vec![GREETING.to_string()]);
}

#[tokio::test]
async fn test_goal_list_then_done_button() {
    let h = TestHarness::new(INTERVAL);
    let base = spawn_webhook(&h).await;

    post_update(&base, &message(11, "Write report\nCall Bob\nEmail team")).await;
    let ids = task_ids(&h, 11).await;
    assert_eq!(ids.len(), 3);
    h.messenger.clear().await;

    let (status, reply) = post_update(&base, &button(11, &format!("done:{}", ids[0]))).await;
    assert_eq!(status, 200);
    assert_eq!(reply, json!({"ok": true}));

    let sent = h.messenger.sent().await;
    assert_eq!(sent[0].text, MARKED_DONE);
    assert_eq!(sent[1].text, ScriptedCoach::reply(CoachRole::Coach, "Call Bob"));
    assert_eq!(sent[1].controls, Some(Controls::for_task(&ids[1])));
    assert_eq!(h.messenger.answered().await, vec!["cb-7".to_string()]);

    let stats = h.controller.reminders().stats();
    assert_eq!(stats.armed, 2);
    assert_eq!(stats.outstanding(), 1);
}

#[tokio::test]
async fn test_delivery_failures_still_acknowledge() {
    let h = TestHarness::new(INTERVAL);
    h.messenger.set_failing(true);
    let base = spawn_webhook(&h).await;

    let (status, reply) = post_update(&base, &message(11, "a\nb")).await;
    assert_eq!(status, 200);
    assert_eq!(reply, json!({"ok": true}));
    assert!(h.messenger.attempts() >= 2);
}

#[tokio::test]
async fn test_server_run_stops_on_shutdown() {
    let h = TestHarness::new(INTERVAL);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(server::run(listener, h.controller.clone(), 14, async move {
        let _ = stop_rx.await;
    }));

    let status = reqwest::get(format!("http://{}/health", addr)).await.unwrap().status();
    assert!(status.is_success());

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
    assert!(result.is_ok());
}
