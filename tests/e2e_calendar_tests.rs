//! End-to-end tests for the calendar aggregation endpoints
//!
//! Covers GET /v1/calendar/remaining and GET /v1/calendar/{year}/{month}.

mod common;

use common::{TestClient, TestServer};
use chrono::Weekday;
use dispatch_server::reschedule::{NewRescheduleRule, RuleOffset, RuleStore};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn remaining_counts_only_open_jobs_in_the_window() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    client
        .create_job_id(server.operator_id, server.customer_id, "2025-06-02")
        .await;
    client
        .create_job_id(server.operator_id, server.customer_id, "2025-06-05")
        .await;
    // Outside the window
    client
        .create_job_id(server.operator_id, server.customer_id, "2025-07-01")
        .await;
    // Completed, does not count
    let done = client
        .create_job_id(server.operator_id, server.customer_id, "2025-06-10")
        .await;
    client.update_status(done, "START", None).await;
    client.update_status(done, "PHOTO", Some("img://x")).await;

    let response = client.remaining("2025-06-01", "2025-06-30").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn remaining_agrees_with_an_end_of_day_run() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    server
        .store
        .insert_rule(NewRescheduleRule {
            operator_id: None,
            name: "push 1, skip Sun".to_string(),
            offset: RuleOffset::PushDays(1),
            skip_weekdays: vec![Weekday::Sun],
            season: None,
        })
        .unwrap();

    for _ in 0..3 {
        client
            .create_job_id(server.operator_id, server.customer_id, "2025-06-07")
            .await;
    }

    let report: Value = client
        .end_of_day(server.operator_id, "2025-06-07")
        .await
        .json()
        .await
        .unwrap();

    // Each closed job was superseded, so the window count equals the number
    // of successors the run created.
    let body: Value = client
        .remaining("2025-06-01", "2025-06-30")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], report["successors_created"]);
}

#[tokio::test]
async fn inverted_window_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.remaining("2025-06-30", "2025-06-01").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn month_view_groups_open_jobs_by_day() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    client
        .create_job_id(server.operator_id, server.customer_id, "2025-06-02")
        .await;
    client
        .create_job_id(server.operator_id, server.customer_id, "2025-06-02")
        .await;
    client
        .create_job_id(server.operator_id, server.customer_id, "2025-06-05")
        .await;
    client
        .create_job_id(server.operator_id, server.customer_id, "2025-07-01")
        .await;

    let response = client.calendar_month(2025, 6).await;
    assert_eq!(response.status(), StatusCode::OK);
    let days: Vec<Value> = response.json().await.unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["date"], "2025-06-02");
    assert_eq!(days[0]["count"], 2);
    assert_eq!(days[1]["date"], "2025-06-05");
    assert_eq!(days[1]["count"], 1);
}

#[tokio::test]
async fn month_view_rejects_invalid_months() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.calendar_month(2025, 13).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
