mod service;
mod transition;

pub use service::{CreateJob, JobLifecycle, LifecycleError};
pub use transition::{plan_transition, JobAction, TransitionError, TransitionPlan};
