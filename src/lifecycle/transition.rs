//! The state transition table, as a pure function.
//!
//! Persistence never decides what a transition means; handlers and the
//! rescheduler both go through [`plan_transition`] so the table lives in
//! exactly one place.

use crate::job_store::JobState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobAction {
    Dispatch,
    Start,
    Stop,
    Photo,
    MarkIncomplete,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::Dispatch => "DISPATCH",
            JobAction::Start => "START",
            JobAction::Stop => "STOP",
            JobAction::Photo => "PHOTO",
            JobAction::MarkIncomplete => "MARK_INCOMPLETE",
        }
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Action {action} is not valid in state {state}")]
    InvalidTransition { state: JobState, action: JobAction },
    #[error("A photo reference is required to complete a job")]
    MissingArtifact,
}

/// What applying an action to a job should do. The store executes the plan
/// in a single guarded UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next_state: JobState,
    pub stamp_start: bool,
    pub stamp_stop: bool,
    pub photo_url: Option<String>,
    /// The action changes nothing (e.g. MARK_INCOMPLETE on an already
    /// incomplete job). Callers skip the write entirely.
    pub no_op: bool,
}

impl TransitionPlan {
    fn to(next_state: JobState) -> Self {
        Self {
            next_state,
            stamp_start: false,
            stamp_stop: false,
            photo_url: None,
            no_op: false,
        }
    }

    fn starting(next_state: JobState) -> Self {
        Self {
            stamp_start: true,
            ..Self::to(next_state)
        }
    }

    fn stopping(next_state: JobState) -> Self {
        Self {
            stamp_stop: true,
            ..Self::to(next_state)
        }
    }

    fn no_op(state: JobState) -> Self {
        Self {
            no_op: true,
            ..Self::to(state)
        }
    }
}

/// Plans the effect of `action` on a job currently in `state`.
///
/// The table is total: every (state, action) pair not listed below is an
/// `InvalidTransition`. A non-empty `photo_url` turns STOP into a completion;
/// PHOTO without one is rejected before the state is even considered.
pub fn plan_transition(
    state: JobState,
    action: JobAction,
    photo_url: Option<&str>,
) -> Result<TransitionPlan, TransitionError> {
    let photo = photo_url.map(str::trim).filter(|p| !p.is_empty());

    if action == JobAction::Photo && photo.is_none() {
        return Err(TransitionError::MissingArtifact);
    }

    let plan = match (state, action) {
        (JobState::Dispatched, JobAction::Dispatch) => TransitionPlan::to(JobState::EnRoute),
        (JobState::Dispatched | JobState::EnRoute, JobAction::Start) => {
            TransitionPlan::starting(JobState::InProgress)
        }
        (JobState::InProgress, JobAction::Stop) => match photo {
            Some(url) => TransitionPlan {
                photo_url: Some(url.to_string()),
                ..TransitionPlan::stopping(JobState::Completed)
            },
            None => TransitionPlan::stopping(JobState::Incomplete),
        },
        (JobState::InProgress, JobAction::Photo) => TransitionPlan {
            photo_url: photo.map(str::to_string),
            ..TransitionPlan::stopping(JobState::Completed)
        },
        (
            JobState::Dispatched | JobState::EnRoute | JobState::InProgress,
            JobAction::MarkIncomplete,
        ) => TransitionPlan::stopping(JobState::Incomplete),
        (JobState::Incomplete, JobAction::MarkIncomplete) => {
            TransitionPlan::no_op(JobState::Incomplete)
        }
        _ => return Err(TransitionError::InvalidTransition { state, action }),
    };
    Ok(plan)
}
