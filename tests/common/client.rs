//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per dispatch-server endpoint. When API
//! routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("home request failed")
    }

    /// POST /v1/job
    pub async fn create_job(
        &self,
        operator_id: i64,
        customer_id: i64,
        scheduled_date: &str,
    ) -> Response {
        self.create_job_raw(json!({
            "operator_id": operator_id,
            "customer_id": customer_id,
            "address": TEST_ADDRESS,
            "scheduled_date": scheduled_date,
        }))
        .await
    }

    /// POST /v1/job with an arbitrary body
    pub async fn create_job_raw(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/v1/job", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("create_job request failed")
    }

    /// GET /v1/job/{id}
    pub async fn get_job(&self, id: i64) -> Response {
        self.client
            .get(format!("{}/v1/job/{}", self.base_url, id))
            .send()
            .await
            .expect("get_job request failed")
    }

    /// PATCH /v1/job/{id}/status
    pub async fn update_status(&self, id: i64, action: &str, photo_url: Option<&str>) -> Response {
        let mut body = json!({ "action": action });
        if let Some(url) = photo_url {
            body["photo_url"] = json!(url);
        }
        self.client
            .patch(format!("{}/v1/job/{}/status", self.base_url, id))
            .json(&body)
            .send()
            .await
            .expect("update_status request failed")
    }

    /// POST /v1/operator/{id}/end-of-day?date=
    pub async fn end_of_day(&self, operator_id: i64, date: &str) -> Response {
        self.client
            .post(format!(
                "{}/v1/operator/{}/end-of-day?date={}",
                self.base_url, operator_id, date
            ))
            .send()
            .await
            .expect("end_of_day request failed")
    }

    /// GET /v1/operator/{id}/jobs?from&to
    pub async fn operator_jobs(&self, operator_id: i64, from: &str, to: &str) -> Response {
        self.client
            .get(format!(
                "{}/v1/operator/{}/jobs?from={}&to={}",
                self.base_url, operator_id, from, to
            ))
            .send()
            .await
            .expect("operator_jobs request failed")
    }

    /// GET /v1/calendar/remaining?from&to
    pub async fn remaining(&self, from: &str, to: &str) -> Response {
        self.client
            .get(format!(
                "{}/v1/calendar/remaining?from={}&to={}",
                self.base_url, from, to
            ))
            .send()
            .await
            .expect("remaining request failed")
    }

    /// GET /v1/calendar/{year}/{month}
    pub async fn calendar_month(&self, year: i32, month: u32) -> Response {
        self.client
            .get(format!(
                "{}/v1/calendar/{}/{}",
                self.base_url, year, month
            ))
            .send()
            .await
            .expect("calendar_month request failed")
    }

    /// GET /v1/customer/{id}/photos
    pub async fn customer_photos(&self, customer_id: i64) -> Response {
        self.client
            .get(format!(
                "{}/v1/customer/{}/photos",
                self.base_url, customer_id
            ))
            .send()
            .await
            .expect("customer_photos request failed")
    }

    /// Convenience: create a job and return its id, asserting 201.
    pub async fn create_job_id(
        &self,
        operator_id: i64,
        customer_id: i64,
        scheduled_date: &str,
    ) -> i64 {
        let response = self.create_job(operator_id, customer_id, scheduled_date).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Job creation failed: {:?}",
            response.text().await
        );
        let body: Value = response.json().await.expect("invalid JSON body");
        body["id"].as_i64().expect("created job has no id")
    }
}
