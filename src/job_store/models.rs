use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a field job.
///
/// `Completed` and `Incomplete` are terminal: once reached, a job is never
/// mutated again. Rescheduling produces a new job row instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Dispatched,
    EnRoute,
    InProgress,
    Completed,  // terminal
    Incomplete, // terminal
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Dispatched => "DISPATCHED",
            JobState::EnRoute => "EN_ROUTE",
            JobState::InProgress => "IN_PROGRESS",
            JobState::Completed => "COMPLETED",
            JobState::Incomplete => "INCOMPLETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DISPATCHED" => Some(JobState::Dispatched),
            "EN_ROUTE" => Some(JobState::EnRoute),
            "IN_PROGRESS" => Some(JobState::InProgress),
            "COMPLETED" => Some(JobState::Completed),
            "INCOMPLETE" => Some(JobState::Incomplete),
            _ => None,
        }
    }

    /// Returns true if no further action may mutate a job in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Incomplete)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled field visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub operator_id: i64,
    pub customer_id: i64,
    pub address: String,
    pub state: JobState,
    pub scheduled_date: NaiveDate,
    /// Unix seconds, stamped when work starts. Never un-set.
    pub start_time: Option<i64>,
    /// Unix seconds, stamped on completion or incompletion. Never un-set.
    pub stop_time: Option<i64>,
    /// Opaque reference supplied by the upload service; set only on COMPLETED.
    pub photo_url: Option<String>,
    pub notes: Option<String>,
    /// Audit link back to the job this one was rescheduled from.
    pub predecessor_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields needed to insert a job. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub operator_id: i64,
    pub customer_id: i64,
    pub address: String,
    pub state: JobState,
    pub scheduled_date: NaiveDate,
    pub notes: Option<String>,
    pub predecessor_id: Option<i64>,
}

/// An atomic state change for one job, guarded by an optimistic check on the
/// state the caller read. Time stamps are set only where `Some`.
#[derive(Debug, Clone)]
pub struct JobStateUpdate {
    pub job_id: i64,
    pub expected_state: JobState,
    pub new_state: JobState,
    pub set_start_time: Option<i64>,
    pub set_stop_time: Option<i64>,
    pub set_photo_url: Option<String>,
}

/// A completion photo attached to a customer's job history.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerPhoto {
    pub job_id: i64,
    pub photo_url: String,
    pub taken_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub address: String,
}
