use super::transition::{plan_transition, JobAction, TransitionError};
use crate::job_store::{Job, JobState, JobStateUpdate, NewJob, OpsStore};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Job {0} not found")]
    NotFound(i64),
    #[error("Action {action} is not valid in state {state}")]
    InvalidTransition { state: JobState, action: JobAction },
    #[error("A photo reference is required to complete a job")]
    MissingArtifact,
    #[error("Invalid assignment: {0}")]
    InvalidAssignment(String),
    #[error("Job {0} was modified concurrently, retry")]
    Conflict(i64),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<TransitionError> for LifecycleError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { state, action } => {
                LifecycleError::InvalidTransition { state, action }
            }
            TransitionError::MissingArtifact => LifecycleError::MissingArtifact,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateJob {
    pub operator_id: i64,
    pub customer_id: i64,
    pub address: String,
    pub scheduled_date: NaiveDate,
    pub notes: Option<String>,
}

/// Applies lifecycle actions to jobs. Every write goes through the
/// transition planner and a single optimistic UPDATE.
pub struct JobLifecycle {
    store: Arc<dyn OpsStore>,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn OpsStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, request: CreateJob) -> Result<Job, LifecycleError> {
        if !self.store.operator_exists(request.operator_id)? {
            return Err(LifecycleError::InvalidAssignment(format!(
                "operator {} does not exist",
                request.operator_id
            )));
        }
        if !self.store.customer_exists(request.customer_id)? {
            return Err(LifecycleError::InvalidAssignment(format!(
                "customer {} does not exist",
                request.customer_id
            )));
        }

        let job = self.store.insert_job(NewJob {
            operator_id: request.operator_id,
            customer_id: request.customer_id,
            address: request.address,
            state: JobState::Dispatched,
            scheduled_date: request.scheduled_date,
            notes: request.notes,
            predecessor_id: None,
        })?;
        info!(
            "Created job {} for operator {} on {}",
            job.id, job.operator_id, job.scheduled_date
        );
        Ok(job)
    }

    pub fn transition(
        &self,
        job_id: i64,
        action: JobAction,
        photo_url: Option<&str>,
    ) -> Result<Job, LifecycleError> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or(LifecycleError::NotFound(job_id))?;

        let plan = plan_transition(job.state, action, photo_url)?;
        if plan.no_op {
            return Ok(job);
        }

        let now = now();
        let updated = self
            .store
            .update_job_state(JobStateUpdate {
                job_id,
                expected_state: job.state,
                new_state: plan.next_state,
                set_start_time: plan.stamp_start.then_some(now),
                set_stop_time: plan.stamp_stop.then_some(now),
                set_photo_url: plan.photo_url,
            })?
            .ok_or(LifecycleError::Conflict(job_id))?;

        info!(
            "Job {}: {} -> {} via {}",
            job_id, job.state, updated.state, action
        );
        Ok(updated)
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
