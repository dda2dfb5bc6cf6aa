//! HTTP surface, driven in-process through the router.

mod common;

use axum::Router;
use axum::body::Body;
use barbot_server::api::build_router;
use common::TestBarbot;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create(app: &Router, cocktail_id: i64) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/api/orders",
        Some(json!({ "event_id": 1, "cocktail_id": cocktail_id })),
    )
    .await
}

#[tokio::test]
async fn test_health_endpoints() {
    let barbot = TestBarbot::start().await;
    let app = build_router(barbot.state.clone());

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // device not connected: orders still work, so only degraded
    let (status, body) = call(&app, Method::GET, "/health/detailed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"]["status"], "ok");
    assert_eq!(body["checks"]["device"]["status"], "error");

    barbot.shutdown().await;
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let barbot = TestBarbot::start().await;
    let app = build_router(barbot.state.clone());

    let (status, body) = create(&app, 1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["commands"], "P1,60,P7,30");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = call(&app, Method::POST, &format!("/api/orders/{id}/process"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], "preparing");
    assert_eq!(body["data"]["disposition"]["type"], "queued");
    assert_eq!(body["data"]["disposition"]["position"], 1);

    let (status, body) = call(&app, Method::GET, &format!("/api/orders/{id}/consumption"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = call(&app, Method::GET, "/api/device/queue", None).await;
    assert_eq!(body["data"]["queue"], json!([id]));

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/orders/{id}/cancel"),
        Some(json!({ "reason": "changed mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["cancel_reason"], "changed mind");

    let (_, body) = call(&app, Method::GET, "/api/device/queue", None).await;
    assert_eq!(body["data"]["queue_length"], 0);

    let (status, body) = call(&app, Method::POST, &format!("/api/orders/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4004);

    barbot.shutdown().await;
}

#[tokio::test]
async fn test_event_queue_lists_open_orders() {
    let barbot = TestBarbot::start().await;
    let app = build_router(barbot.state.clone());

    let (_, first) = create(&app, 1).await;
    let (_, second) = create(&app, 2).await;
    let first_id = first["data"]["id"].as_i64().unwrap();
    call(&app, Method::POST, &format!("/api/orders/{first_id}/cancel"), None).await;

    let (status, body) = call(&app, Method::GET, "/api/events/1/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    let queue = body["data"].as_array().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["id"], second["data"]["id"]);

    barbot.shutdown().await;
}

#[tokio::test]
async fn test_not_found_errors() {
    let barbot = TestBarbot::start().await;
    let app = build_router(barbot.state.clone());

    let (status, body) = call(&app, Method::GET, "/api/orders/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);

    let (status, body) = create(&app, 42).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 6101);

    barbot.shutdown().await;
}

#[tokio::test]
async fn test_raw_command_validation_and_offline_send() {
    let barbot = TestBarbot::start().await;
    let app = build_router(barbot.state.clone());

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/device/command",
        Some(json!({ "commands": "P1,60" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/device/command",
        Some(json!({ "commands": ["P1", 60] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sent"], false);
    assert_eq!(body["data"]["commands"], "P1,60");

    barbot.shutdown().await;
}

#[tokio::test]
async fn test_raw_command_reaches_device() {
    let barbot = TestBarbot::start().await;
    let app = build_router(barbot.state.clone());

    let (status, body) = call(&app, Method::POST, "/api/device/connect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connected"], true);
    let mut device = barbot.device.accept().await;

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/device/command",
        Some(json!({ "commands": ["P3", 15] })),
    )
    .await;
    assert_eq!(body["data"]["sent"], true);
    assert_eq!(device.expect_line().await, "P3,15");

    let (_, body) = call(&app, Method::POST, "/api/device/emergency-stop", None).await;
    assert_eq!(body["data"]["stop_sent"], true);
    assert_eq!(device.expect_line().await, "STOP");

    barbot.shutdown().await;
}

#[tokio::test]
async fn test_event_views_next_orders_and_stock() {
    let barbot = TestBarbot::start().await;
    let app = build_router(barbot.state.clone());

    let (status, body) = call(&app, Method::GET, "/api/events/1/next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);

    let (_, first) = create(&app, 1).await;
    let (_, second) = create(&app, 2).await;
    let first_id = first["data"]["id"].as_i64().unwrap();
    call(&app, Method::POST, &format!("/api/orders/{first_id}/process"), None).await;

    let (_, body) = call(&app, Method::GET, "/api/events/1/next", None).await;
    assert_eq!(body["data"]["id"], second["data"]["id"]);

    let (status, body) = call(&app, Method::GET, "/api/events/1/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], second["data"]["id"]);
    assert_eq!(orders[1]["status"], "preparing");

    let (status, body) = call(&app, Method::GET, "/api/events/1/inventory", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    let gin = records.iter().find(|r| r["ingredient_id"] == 1).unwrap();
    let current: Decimal = serde_json::from_value(gin["current_quantity"].clone()).unwrap();
    assert_eq!(current, Decimal::from(940));

    let (_, body) = call(&app, Method::GET, "/api/events/2/inventory", None).await;
    assert_eq!(body["data"], json!([]));

    barbot.shutdown().await;
}
