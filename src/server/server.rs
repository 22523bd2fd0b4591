use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::error;

use crate::calendar::PeriodAggregator;
use crate::job_store::OpsStore;
use crate::lifecycle::{CreateJob, JobAction, JobLifecycle, LifecycleError};
use crate::reschedule::{CloseDayError, EndOfDayRescheduler};
use chrono::{Local, NaiveDate};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{log_requests, state::*, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct CreateJobBody {
    pub operator_id: i64,
    pub customer_id: i64,
    pub address: String,
    pub scheduled_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StatusUpdateBody {
    pub action: JobAction,
    pub photo_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Deserialize, Debug)]
struct EndOfDayQuery {
    /// The day being closed. Defaults to the server's current date.
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct RemainingCount {
    pub count: usize,
}

#[derive(Serialize)]
struct DayCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ErrorBody { error: message }),
    )
        .into_response()
}

fn lifecycle_error_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::InvalidTransition { .. } => StatusCode::CONFLICT,
        LifecycleError::Conflict(_) => StatusCode::CONFLICT,
        LifecycleError::MissingArtifact => StatusCode::BAD_REQUEST,
        LifecycleError::InvalidAssignment(_) => StatusCode::BAD_REQUEST,
        LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn lifecycle_error_response(err: LifecycleError) -> Response {
    let status = lifecycle_error_status(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Lifecycle store failure: {:#}", err);
        return error_response(status, "internal error".to_string());
    }
    error_response(status, err.to_string())
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(stats)
}

async fn create_job(
    State(lifecycle): State<GuardedLifecycle>,
    Json(body): Json<CreateJobBody>,
) -> Response {
    match lifecycle.create(CreateJob {
        operator_id: body.operator_id,
        customer_id: body.customer_id,
        address: body.address,
        scheduled_date: body.scheduled_date,
        notes: body.notes,
    }) {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

async fn get_job(State(store): State<GuardedOpsStore>, Path(id): Path<i64>) -> Response {
    match store.get_job(id) {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Job {} not found", id)),
        Err(err) => {
            error!("Failed to load job {}: {:#}", id, err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

async fn update_job_status(
    State(lifecycle): State<GuardedLifecycle>,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdateBody>,
) -> Response {
    match lifecycle.transition(id, body.action, body.photo_url.as_deref()) {
        Ok(job) => Json(job).into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

async fn end_of_day(
    State(rescheduler): State<GuardedRescheduler>,
    Path(operator_id): Path<i64>,
    Query(query): Query<EndOfDayQuery>,
) -> Response {
    let close_date = query.date.unwrap_or_else(|| Local::now().date_naive());
    match rescheduler.close_day(operator_id, close_date) {
        Ok(report) => Json(report).into_response(),
        Err(err @ CloseDayError::AlreadyRunning(_)) => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        Err(CloseDayError::Store(err)) => {
            error!("End-of-day failed for operator {}: {:#}", operator_id, err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

async fn get_operator_jobs(
    State(store): State<GuardedOpsStore>,
    Path(operator_id): Path<i64>,
    Query(range): Query<DateRangeQuery>,
) -> Response {
    match store.get_jobs_in_range(operator_id, range.from, range.to) {
        Ok(jobs) => Json(jobs).into_response(),
        Err(err) => {
            error!("Failed to list jobs for operator {}: {:#}", operator_id, err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

async fn remaining_in_window(
    State(aggregator): State<GuardedAggregator>,
    Query(range): Query<DateRangeQuery>,
) -> Response {
    match aggregator.jobs_remaining(range.from, range.to) {
        Ok(count) => Json(RemainingCount { count }).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
    }
}

async fn remaining_for_month(
    State(aggregator): State<GuardedAggregator>,
    Path((year, month)): Path<(i32, u32)>,
) -> Response {
    match aggregator.remaining_by_day(year, month) {
        Ok(counts) => {
            let days: Vec<DayCount> = counts
                .into_iter()
                .map(|(date, count)| DayCount { date, count })
                .collect();
            Json(days).into_response()
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
    }
}

async fn get_customer_photos(
    State(store): State<GuardedOpsStore>,
    Path(customer_id): Path<i64>,
) -> Response {
    match store.get_customer_photos(customer_id) {
        Ok(photos) => Json(photos).into_response(),
        Err(err) => {
            error!(
                "Failed to load photos for customer {}: {:#}",
                customer_id, err
            );
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

pub fn make_app(config: ServerConfig, store: Arc<dyn OpsStore>) -> Router {
    let state = ServerState {
        config,
        start_time: Instant::now(),
        lifecycle: Arc::new(JobLifecycle::new(store.clone())),
        rescheduler: Arc::new(EndOfDayRescheduler::new(store.clone())),
        aggregator: Arc::new(PeriodAggregator::new(store.clone())),
        store,
    };

    let job_routes: Router = Router::new()
        .route("/job", post(create_job))
        .route("/job/{id}", get(get_job))
        .route("/job/{id}/status", patch(update_job_status))
        .route("/operator/{id}/end-of-day", post(end_of_day))
        .route("/operator/{id}/jobs", get(get_operator_jobs))
        .route("/calendar/remaining", get(remaining_in_window))
        .route("/calendar/{year}/{month}", get(remaining_for_month))
        .route("/customer/{id}/photos", get(get_customer_photos))
        .with_state(state.clone());

    Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/v1", job_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    store: Arc<dyn OpsStore>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
    };
    let app = make_app(config, store);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
