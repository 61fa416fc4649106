mod helpers;

use cleanreport_core::ForwardMode;
use cleanreport_worker::ForwardStatus;
use helpers::fixtures::{normal_report, single_image_report};
use std::time::Duration;
use helpers::setup_test_app;
use uuid::Uuid;

#[tokio::test]
async fn test_status_moves_from_queued_to_delivered() {
    let app = setup_test_app(ForwardMode::PerImage).await;

    let response = app.client().post("/upload").json(&normal_report(2)).await;
    assert_eq!(response.status_code(), 202);
    let body: serde_json::Value = response.json();
    let submission_id = body["submissionId"].as_str().unwrap().to_string();

    let status = app
        .client()
        .get(&format!("/upload/{}/status", submission_id))
        .await;
    assert_eq!(status.status_code(), 200);
    let data: serde_json::Value = status.json();
    assert_eq!(data["submissionId"], submission_id);
    assert!(data["state"] == "queued" || data["state"] == "forwarding");

    app.sink.open();
    app.wait_for_terminal(submission_id.parse().unwrap()).await;

    let status = app
        .client()
        .get(&format!("/api/v0/upload/{}/status", submission_id))
        .await;
    let data: serde_json::Value = status.json();
    assert_eq!(data["state"], "delivered");
}

#[tokio::test]
async fn test_per_image_submission_waits_for_every_image() {
    let app = setup_test_app(ForwardMode::PerImage).await;
    app.sink.open();
    let submission_id = Uuid::new_v4();

    let response = app
        .client()
        .post("/upload")
        .json(&single_image_report(submission_id, 1, 3))
        .await;
    assert_eq!(response.status_code(), 202);

    for _ in 0..200 {
        if app.sink.delivered().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = app
        .client()
        .get(&format!("/upload/{}/status", submission_id))
        .await;
    let data: serde_json::Value = status.json();
    assert_eq!(data["state"], "forwarding");
    assert_eq!(data["done"], 1);
    assert_eq!(data["total"], 3);

    for sequence in 2..=3 {
        let response = app
            .client()
            .post("/upload")
            .json(&single_image_report(submission_id, sequence, 3))
            .await;
        assert_eq!(response.status_code(), 202);
    }

    assert_eq!(app.wait_for_terminal(submission_id).await, ForwardStatus::Delivered);
    assert_eq!(app.sink.delivered().len(), 3);
}

#[tokio::test]
async fn test_unknown_submission_is_404() {
    let app = setup_test_app(ForwardMode::PerImage).await;

    let response = app
        .client()
        .get(&format!("/upload/{}/status", Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), 404);
    let data: serde_json::Value = response.json();
    assert_eq!(data["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_health_routes() {
    let app = setup_test_app(ForwardMode::PerImage).await;

    let live = app.client().get("/health/live").await;
    assert_eq!(live.status_code(), 200);
    let data: serde_json::Value = live.json();
    assert_eq!(data["status"], "alive");

    let health = app.client().get("/health").await;
    assert_eq!(health.status_code(), 200);
    let data: serde_json::Value = health.json();
    assert_eq!(data["status"], "healthy");
    assert_eq!(data["forward_mode"], "per_image");
}
