mod models;
mod schema;
mod sqlite_ops_store;

pub use models::*;
pub use schema::OPS_VERSIONED_SCHEMAS;
pub use sqlite_ops_store::SqliteOpsStore;

use crate::reschedule::RuleStore;
use anyhow::Result;
use chrono::NaiveDate;

/// SQL predicate selecting jobs that are still "open": not completed and not
/// superseded by a rescheduling successor. The End-of-Day batch and the
/// period aggregator must agree on this, so both queries embed this constant.
pub const QUALIFYING_JOB_PREDICATE: &str = "job.state != 'COMPLETED' \
     AND NOT EXISTS (SELECT 1 FROM job successor WHERE successor.predecessor_id = job.id)";

pub trait JobStore: Send + Sync {
    /// Inserts a new job and returns it with its assigned id.
    fn insert_job(&self, new_job: NewJob) -> Result<Job>;

    /// Returns Ok(None) if the job does not exist.
    fn get_job(&self, id: i64) -> Result<Option<Job>>;

    /// Atomically applies a state update, guarded by an optimistic check on
    /// the state the caller read. Returns Ok(None) if the check failed (the
    /// job was modified since the read, or does not exist).
    /// Existing time stamps are never overwritten.
    fn update_job_state(&self, update: JobStateUpdate) -> Result<Option<Job>>;

    /// Qualifying jobs for one operator scheduled on or before `through`,
    /// ascending by id. Jobs dated after `through` belong to a future day
    /// and are not picked up.
    fn get_open_jobs(&self, operator_id: i64, through: NaiveDate) -> Result<Vec<Job>>;

    /// All of an operator's jobs scheduled in the inclusive date range.
    fn get_jobs_in_range(&self, operator_id: i64, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Job>>;

    /// Count of qualifying jobs scheduled in the inclusive date range.
    fn count_jobs_remaining(&self, from: NaiveDate, to: NaiveDate) -> Result<usize>;

    /// Per-day qualifying counts in the inclusive date range. Days with no
    /// open jobs are omitted.
    fn count_jobs_remaining_by_day(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, usize)>>;

    /// Completion photos for a customer, newest first.
    fn get_customer_photos(&self, customer_id: i64) -> Result<Vec<CustomerPhoto>>;
}

/// Existence checks against the operator/customer registries. The registries
/// themselves are plain CRUD owned elsewhere; the lifecycle only validates
/// references against them.
pub trait DirectoryStore: Send + Sync {
    fn insert_operator(&self, name: &str) -> Result<i64>;
    fn insert_customer(&self, name: &str, address: &str) -> Result<i64>;
    fn operator_exists(&self, id: i64) -> Result<bool>;
    fn customer_exists(&self, id: i64) -> Result<bool>;
}

/// Combined trait for everything the services need from the database.
pub trait OpsStore: JobStore + DirectoryStore + RuleStore {}

impl<T: JobStore + DirectoryStore + RuleStore> OpsStore for T {}
