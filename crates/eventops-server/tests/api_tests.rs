//! Integration tests for the API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic, routing, and the
//! session gate without needing a live network connection. State is
//! backed by the in-memory store and a manual clock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use eventops_core::clock::{Clock, ManualClock};
use eventops_core::config::{AuthConfig, EventOpsConfig};
use eventops_db::Backends;
use eventops_server::router::build_router;
use eventops_server::state::AppState;
use eventops_types::SessionRole;
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN: &str = "admin-token";
const STAFF: &str = "staff-token";
const START_MS: i64 = 1_700_000_000_000;

struct Harness {
    router: Router,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let mut tokens = BTreeMap::new();
    tokens.insert(ADMIN.to_owned(), SessionRole::Admin);
    tokens.insert(STAFF.to_owned(), SessionRole::Staff);
    let config = EventOpsConfig {
        auth: AuthConfig { tokens },
        ..EventOpsConfig::default()
    };

    let clock = Arc::new(ManualClock::at_millis(START_MS));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let state = AppState::with_clock(Backends::memory(), &config, dyn_clock);
    Harness {
        router: build_router(Arc::new(state)),
        clock,
    }
}

impl Harness {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.call(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn control(&self, body: &Value) -> (StatusCode, Value) {
        self.send("POST", "/timer/control", Some(ADMIN), body).await
    }

    async fn create_timer(&self, duration_ms: i64) -> String {
        let (status, json) = self
            .control(&json!({ "action": "create", "settings": { "durationMs": duration_ms } }))
            .await;
        assert_eq!(status, StatusCode::OK);
        json["timer"]["id"].as_str().unwrap().to_owned()
    }
}

// =========================================================================
// Time and health
// =========================================================================

#[tokio::test]
async fn test_time_reports_server_clock() {
    let h = harness();
    let (status, json) = h.get("/time").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["now"], START_MS);
    assert_eq!(json["timezone"], "UTC");
}

#[tokio::test]
async fn test_health_ok() {
    let h = harness();
    let (status, json) = h.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// =========================================================================
// Timers
// =========================================================================

#[tokio::test]
async fn test_no_current_timer_is_null() {
    let h = harness();
    let (status, json) = h.get("/timer").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["timer"].is_null());
    assert_eq!(json["serverTime"], START_MS);
}

#[tokio::test]
async fn test_timer_lifecycle_over_http() {
    let h = harness();
    let id = h.create_timer(60_000).await;

    let (status, json) = h.control(&json!({ "action": "start", "timerId": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["timer"]["state"], "running");
    assert_eq!(json["timer"]["isCurrent"], true);

    h.clock.advance_ms(10_000);
    let (_, json) = h.get("/timer?action=current").await;
    assert_eq!(json["timer"]["id"], id.as_str());
    assert_eq!(json["timer"]["reading"]["remainingMs"], 50_000);

    let (_, json) = h.control(&json!({ "action": "pause", "timerId": id })).await;
    assert_eq!(json["timer"]["state"], "paused");
    h.clock.advance_ms(30_000);
    let (_, json) = h.get("/timer").await;
    assert_eq!(json["timer"]["reading"]["remainingMs"], 50_000);

    let (_, json) = h.control(&json!({ "action": "start", "timerId": id })).await;
    assert_eq!(json["timer"]["state"], "running");
    h.clock.advance_ms(5_000);
    let (_, json) = h.get("/timer").await;
    assert_eq!(json["timer"]["reading"]["remainingMs"], 45_000);

    let (_, json) = h.control(&json!({ "action": "reset", "timerId": id })).await;
    assert_eq!(json["timer"]["state"], "idle");
    assert_eq!(json["timer"]["reading"]["remainingMs"], 60_000);
}

#[tokio::test]
async fn test_list_all_timers() {
    let h = harness();
    h.create_timer(1_000).await;
    h.create_timer(2_000).await;

    let (status, json) = h.get("/timer?action=all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["timers"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_select_moves_current_pointer() {
    let h = harness();
    let a = h.create_timer(1_000).await;
    let b = h.create_timer(2_000).await;

    h.control(&json!({ "action": "select", "timerId": a })).await;
    h.control(&json!({ "action": "select", "timerId": b })).await;

    let (_, json) = h.get("/timer?action=all").await;
    let current: Vec<&Value> = json["timers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| t["isCurrent"] == true)
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["id"], b.as_str());
}

#[tokio::test]
async fn test_delete_current_timer_leaves_no_current() {
    let h = harness();
    let id = h.create_timer(60_000).await;
    h.control(&json!({ "action": "start", "timerId": id })).await;

    let (status, json) = h.control(&json!({ "action": "delete", "timerId": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, json) = h.get("/timer").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["timer"].is_null());
}

#[tokio::test]
async fn test_save_updates_settings() {
    let h = harness();
    let id = h.create_timer(60_000).await;

    let (status, json) = h
        .control(&json!({
            "action": "save",
            "timerId": id,
            "settings": { "title": "Keynote", "durationMs": 90_000 }
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["timer"]["title"], "Keynote");
    assert_eq!(json["timer"]["durationMs"], 90_000);
    assert_eq!(json["timer"]["isCurrent"], true);
}

#[tokio::test]
async fn test_control_missing_fields_is_invalid_input() {
    let h = harness();

    let (status, json) = h.control(&json!({ "action": "start" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "InvalidInput");

    let (status, _) = h.control(&json!({ "action": "create" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.control(&json!({ "action": "message" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_control_unknown_action_is_400() {
    let h = harness();
    let (status, json) = h.control(&json!({ "action": "explode" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_control_unknown_timer_is_404() {
    let h = harness();
    let (status, json) = h
        .control(&json!({ "action": "start", "timerId": "0190b6d2-2f4e-7a3c-8000-000000000000" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "NotFound");
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test]
async fn test_control_requires_session() {
    let h = harness();
    let body = json!({ "action": "create", "settings": {} });

    let (status, json) = h.send("POST", "/timer/control", None, &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["kind"], "Unauthorized");

    let (status, _) = h
        .send("POST", "/timer/control", Some("bogus"), &body)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = h.send("POST", "/timer/control", Some(STAFF), &body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["kind"], "Forbidden");
}

#[tokio::test]
async fn test_staff_may_only_increment_visitors() {
    let h = harness();

    let (status, json) = h
        .send("POST", "/status", Some(STAFF), &json!({ "action": "increment_visitors" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["visitors"], 1);

    let (status, _) = h
        .send("POST", "/status", Some(STAFF), &json!({ "action": "set_visitors", "count": 9 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =========================================================================
// Messages
// =========================================================================

#[tokio::test]
async fn test_message_crud() {
    let h = harness();

    let (status, json) = h
        .send(
            "POST",
            "/timer/message",
            Some(ADMIN),
            &json!({ "message": { "text": "Doors open", "flash": true } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"]["color"], "#ffffff");
    let id = json["message"]["id"].as_str().unwrap().to_owned();

    let (_, json) = h.get(&format!("/timer/message?messageId={id}")).await;
    assert_eq!(json["message"]["text"], "Doors open");

    let (_, json) = h.get("/timer?action=messages").await;
    assert_eq!(json["messages"].as_array().map(Vec::len), Some(1));

    let uri = format!("/timer/message?messageId={id}");
    let (_, json) = h.send("DELETE", &uri, Some(ADMIN), &Value::Null).await;
    assert_eq!(json["success"], true);
    let (_, json) = h.send("DELETE", &uri, Some(ADMIN), &Value::Null).await;
    assert_eq!(json["success"], false);

    let (status, _) = h.get(&format!("/timer/message?messageId={id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_message_rejected() {
    let h = harness();
    let (status, json) = h
        .send("POST", "/timer/message", Some(ADMIN), &json!({ "message": { "text": "  " } }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "InvalidInput");
}

// =========================================================================
// Actions
// =========================================================================

#[tokio::test]
async fn test_action_create_execute_and_reset() {
    let h = harness();
    let timer_id = h.create_timer(60_000).await;

    let (status, json) = h
        .send(
            "POST",
            "/timer/actions",
            Some(ADMIN),
            &json!({ "timerId": timer_id, "triggerMs": 30_000, "kind": "message", "message": "Half way" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let action_id = json["action"]["id"].as_str().unwrap().to_owned();

    let (_, json) = h.get(&format!("/timer/actions?timerId={timer_id}")).await;
    assert_eq!(json["actions"].as_array().map(Vec::len), Some(1));

    let (_, json) = h
        .send("POST", "/timer/actions/execute", Some(ADMIN), &json!({ "id": action_id }))
        .await;
    assert_eq!(json["success"], true);

    let (_, json) = h.get("/timer/message").await;
    assert_eq!(json["messages"][0]["text"], "Half way");

    let (_, json) = h
        .send("POST", "/timer/actions/reset", Some(ADMIN), &json!({ "timerId": timer_id }))
        .await;
    assert_eq!(json["success"], true);

    let (_, json) = h
        .send(
            "PUT",
            "/timer/actions",
            Some(ADMIN),
            &json!({ "id": action_id, "enabled": false }),
        )
        .await;
    assert_eq!(json["action"]["enabled"], false);

    let uri = format!("/timer/actions?id={action_id}");
    let (_, json) = h.send("DELETE", &uri, Some(ADMIN), &Value::Null).await;
    assert_eq!(json["success"], true);
}

// =========================================================================
// Status and visitors
// =========================================================================

#[tokio::test]
async fn test_status_defaults() {
    let h = harness();
    let (status, json) = h.get("/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "preparing");
    assert_eq!(json["visitors"], 0);
    assert_eq!(json["serverTime"], START_MS);
}

#[tokio::test]
async fn test_update_status_without_status_is_invalid_input() {
    let h = harness();
    let (status, json) = h
        .send("POST", "/status", Some(ADMIN), &json!({ "action": "update_status" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "InvalidInput");
}

#[tokio::test]
async fn test_update_status_and_visitors() {
    let h = harness();

    let (_, json) = h
        .send("POST", "/status", Some(ADMIN), &json!({ "action": "update_status", "status": "open" }))
        .await;
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "open");

    let (_, json) = h
        .send("POST", "/status", Some(ADMIN), &json!({ "action": "set_visitors", "count": 40 }))
        .await;
    assert_eq!(json["visitors"], 40);

    let (_, json) = h
        .send(
            "POST",
            "/status",
            Some(ADMIN),
            &json!({ "action": "increment_visitors", "increment": 2 }),
        )
        .await;
    assert_eq!(json["visitors"], 42);

    let (_, json) = h.get("/status?action=visitors").await;
    assert_eq!(json["visitors"], 42);
    assert!(json.get("status").is_none());

    let (_, json) = h
        .send("POST", "/status", Some(ADMIN), &json!({ "action": "reset_visitors" }))
        .await;
    assert_eq!(json["visitors"], 0);

    let (status, _) = h
        .send("POST", "/status", Some(ADMIN), &json!({ "action": "set_visitors", "count": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let h = Arc::new(harness());
    let mut tasks = Vec::new();
    for _ in 0..25 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            h.send("POST", "/status", Some(STAFF), &json!({ "action": "increment_visitors" }))
                .await
        }));
    }
    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let (_, json) = h.get("/status?action=visitors").await;
    assert_eq!(json["visitors"], 25);
}

#[tokio::test]
async fn test_visitor_history_by_day() {
    let h = harness();
    // START_MS falls on 2023-11-14 UTC.
    h.send("POST", "/status", Some(ADMIN), &json!({ "action": "set_visitors", "count": 40 }))
        .await;
    h.clock.advance_ms(86_400_000);
    let (_, json) = h
        .send("POST", "/status", Some(STAFF), &json!({ "action": "increment_visitors", "increment": 3 }))
        .await;
    assert_eq!(json["visitors"], 3);

    let (status, json) = h
        .get("/status?action=history&from=2023-11-13&to=2023-11-15")
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["eventDate"], "2023-11-15");
    assert_eq!(history[0]["count"], 3);
    assert_eq!(history[1]["eventDate"], "2023-11-14");
    assert_eq!(history[1]["count"], 40);

    let (_, json) = h.get("/status?action=history").await;
    assert_eq!(json["history"].as_array().unwrap().len(), 2);

    let (_, json) = h.get("/status").await;
    assert_eq!(json["eventDate"], "2023-11-15");

    let (status, _) = h
        .get("/status?action=history&from=2023-11-15&to=2023-11-13")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.get("/status?action=history&from=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
