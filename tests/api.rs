//! End-to-end tests of the admin API over HTTP, backed by in-memory stores.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{FixedOffset, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use post_scheduler::api;
use post_scheduler::app_state::AppState;
use post_scheduler::channel::LogChannelSender;
use post_scheduler::domain::EventBus;
use post_scheduler::persistence::{MemoryAdminLog, MemoryPostRepository};
use post_scheduler::service::{Dispatcher, DispatcherConfig, PostService};
use post_scheduler::settings::{MemorySettings, Settings};

/// Serves the full router on an ephemeral port and returns its base URL.
async fn spawn_app() -> String {
    let Some(utc_offset) = FixedOffset::east_opt(3 * 3600) else {
        panic!("valid offset");
    };
    let settings = Settings::new(Arc::new(MemorySettings::new()));
    let service = PostService::new(
        Arc::new(MemoryPostRepository::new()),
        Arc::new(MemoryAdminLog::new()),
        settings,
        EventBus::new(64),
        utc_offset,
    );
    let dispatcher = Dispatcher::new(
        service.clone(),
        Arc::new(LogChannelSender::new(Some("ads".to_string()))),
        DispatcherConfig {
            send_timeout: Duration::from_secs(5),
            slot_catch_up_minutes: 0,
            utc_offset,
        },
    );
    let app = Router::new().merge(api::build_router()).with_state(AppState {
        post_service: Arc::new(service),
        dispatcher: Arc::new(dispatcher),
    });

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn send_json(req: reqwest::RequestBuilder) -> (StatusCode, Value) {
    let Ok(resp) = req.send().await else {
        panic!("request failed");
    };
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

async fn create_queued(client: &Client, base: &str, owner_id: i64, name: &str) -> Value {
    let (status, body) = send_json(client.post(format!("{base}/api/v1/posts")).json(&json!({
        "owner_id": owner_id,
        "content": { "product_name": name, "marketplace": "ozon" },
        "target": "queue",
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn health_reports_queue_and_channel() {
    let base = spawn_app().await;
    let (status, body) = send_json(Client::new().get(format!("{base}/health"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue_len"], 0);
    assert_eq!(body["channel_configured"], false);
}

#[tokio::test]
async fn queue_stays_dense_after_admin_delete() {
    let base = spawn_app().await;
    let client = Client::new();

    for (owner, name) in [(1, "Lamp"), (2, "Chair"), (3, "Table")] {
        create_queued(&client, &base, owner, name).await;
    }

    let (_, queue) = send_json(client.get(format!("{base}/api/v1/queue"))).await;
    assert_eq!(queue["total"], 3);
    let Some(second) = queue["data"][1]["id"].as_i64() else {
        panic!("missing id: {queue}");
    };
    assert_eq!(queue["data"][1]["queue_position"], 2);
    assert!(queue["data"][0]["estimate"].is_object());

    let resp = client
        .delete(format!("{base}/api/v1/posts/{second}?admin_id=900"))
        .send()
        .await;
    assert!(resp.is_ok_and(|r| r.status() == StatusCode::NO_CONTENT));

    let (_, queue) = send_json(client.get(format!("{base}/api/v1/queue"))).await;
    let positions: Vec<_> = queue["data"]
        .as_array()
        .map(|a| a.iter().map(|p| p["queue_position"].clone()).collect())
        .unwrap_or_default();
    assert_eq!(positions, vec![json!(1), json!(2)]);
    assert_eq!(queue["data"][1]["content"]["product_name"], "Table");

    let (_, logs) = send_json(client.get(format!("{base}/api/v1/admin/logs"))).await;
    assert_eq!(logs["data"][0]["action"], "delete_post");
    assert_eq!(logs["data"][0]["admin_id"], 900);

    let (status, body) =
        send_json(client.get(format!("{base}/api/v1/posts/{second}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn unpaid_priority_post_is_refused() {
    let base = spawn_app().await;
    let (status, body) = send_json(Client::new().post(format!("{base}/api/v1/posts")).json(
        &json!({
            "owner_id": 5,
            "content": { "product_name": "Watch" },
            "target": "scheduled",
            "scheduled_at": Utc::now().to_rfc3339(),
        }),
    ))
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], 2003);
}

#[tokio::test]
async fn invalid_schedule_times_are_rejected_and_valid_ones_audited() {
    let base = spawn_app().await;
    let client = Client::new();
    let url = format!("{base}/api/v1/settings/schedule");

    let (status, _) = send_json(client.put(&url).json(&json!({
        "admin_id": 1,
        "schedule_times": "10:00, 25:00",
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(client.put(&url).json(&json!({
        "admin_id": 1,
        "posts_per_day": 3,
        "schedule_times": "18:00,09:30",
    })))
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, settings) = send_json(client.get(format!("{base}/api/v1/settings"))).await;
    assert_eq!(settings["effective"]["posts_per_day"], 3);
    assert_eq!(settings["effective"]["schedule_times"], json!(["09:30", "18:00"]));

    let (_, logs) = send_json(client.get(format!("{base}/api/v1/admin/logs?limit=5"))).await;
    assert!(
        logs["data"]
            .as_array()
            .is_some_and(|a| a.iter().all(|e| e["action"] == "update_setting"))
    );
}

#[tokio::test]
async fn manual_tick_publishes_due_priority_post() {
    let base = spawn_app().await;
    let client = Client::new();

    let (status, _) = send_json(client.post(format!("{base}/api/v1/dispatch/tick"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(client.put(format!("{base}/api/v1/settings/channel")).json(
        &json!({ "admin_id": 1, "channel_id": "-100123", "username": "@ads" }),
    ))
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, post) = send_json(client.post(format!("{base}/api/v1/posts")).json(&json!({
        "owner_id": 8,
        "content": { "product_name": "Kettle" },
        "payment": { "payment_type": "priority", "status": "paid", "amount": "500" },
        "target": "scheduled",
        "scheduled_at": (Utc::now() - chrono::Duration::minutes(1)).to_rfc3339(),
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED, "{post}");

    let (status, report) = send_json(client.post(format!("{base}/api/v1/dispatch/tick"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(report["skipped"].is_null());
    assert_eq!(report["published"][0]["post_id"], post["id"]);
    assert_eq!(report["published"][0]["lane"], "priority");

    let (_, stats) = send_json(client.get(format!("{base}/api/v1/stats"))).await;
    assert_eq!(stats["counts"]["published"], 1);
    assert_eq!(stats["published_last_24h"], 1);
}

#[tokio::test]
async fn duplicate_check_flags_resubmission() {
    let base = spawn_app().await;
    let client = Client::new();
    create_queued(&client, &base, 1, "Desk Lamp").await;

    let (status, body) = send_json(client.post(format!("{base}/api/v1/posts/duplicates")).json(
        &json!({ "content": { "product_name": "desk lamp", "marketplace": "ozon" } }),
    ))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_duplicate"], true);
}

#[tokio::test]
async fn listing_filters_by_owner_and_paginates() {
    let base = spawn_app().await;
    let client = Client::new();
    for i in 0..3 {
        create_queued(&client, &base, 42, &format!("Item {i}")).await;
    }
    create_queued(&client, &base, 7, "Other").await;

    let (_, page) = send_json(
        client.get(format!("{base}/api/v1/posts?owner_id=42&per_page=2&page=2")),
    )
    .await;
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["total_pages"], 2);
    assert_eq!(page["data"].as_array().map(Vec::len), Some(1));
}
