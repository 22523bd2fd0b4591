//! End-of-Day batch: close what's still open, create successors.

use super::policy::next_occurrence;
use crate::job_store::{JobState, NewJob, OpsStore};
use crate::lifecycle::{JobAction, JobLifecycle};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CloseDayError {
    #[error("An end-of-day run for operator {0} is already in progress")]
    AlreadyRunning(i64),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleFailure {
    pub job_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleReport {
    pub operator_id: i64,
    pub close_date: NaiveDate,
    /// False when the operator has no active rules. A not-configured run
    /// mutates nothing.
    pub rules_configured: bool,
    pub jobs_closed: usize,
    pub successors_created: usize,
    pub failures: Vec<RescheduleFailure>,
}

impl RescheduleReport {
    fn not_configured(operator_id: i64, close_date: NaiveDate) -> Self {
        Self {
            operator_id,
            close_date,
            rules_configured: false,
            jobs_closed: 0,
            successors_created: 0,
            failures: vec![],
        }
    }
}

/// In-process registry of operators with a batch in flight. The guard frees
/// the slot on every exit path.
#[derive(Default)]
struct OperatorLocks {
    running: Mutex<HashSet<i64>>,
}

impl OperatorLocks {
    fn acquire(self: &Arc<Self>, operator_id: i64) -> Option<OperatorLockGuard> {
        let mut running = self.running.lock().unwrap();
        if !running.insert(operator_id) {
            return None;
        }
        Some(OperatorLockGuard {
            locks: Arc::clone(self),
            operator_id,
        })
    }
}

struct OperatorLockGuard {
    locks: Arc<OperatorLocks>,
    operator_id: i64,
}

impl Drop for OperatorLockGuard {
    fn drop(&mut self) {
        self.locks.running.lock().unwrap().remove(&self.operator_id);
    }
}

pub struct EndOfDayRescheduler {
    store: Arc<dyn OpsStore>,
    lifecycle: JobLifecycle,
    locks: Arc<OperatorLocks>,
}

impl EndOfDayRescheduler {
    pub fn new(store: Arc<dyn OpsStore>) -> Self {
        Self {
            lifecycle: JobLifecycle::new(Arc::clone(&store)),
            store,
            locks: Arc::new(OperatorLocks::default()),
        }
    }

    /// Closes the operator's day: every qualifying job scheduled on or
    /// before `close_date` is marked INCOMPLETE and a DISPATCHED successor
    /// is created for it on the rule-derived date.
    ///
    /// Successors always land after `close_date`, so a repeated close for
    /// the same date finds nothing left to do. Per-job failures are recorded
    /// and processing continues; a job closed without a successor stays
    /// qualifying, so the next run retries it.
    pub fn close_day(
        &self,
        operator_id: i64,
        close_date: NaiveDate,
    ) -> Result<RescheduleReport, CloseDayError> {
        let _guard = self
            .locks
            .acquire(operator_id)
            .ok_or(CloseDayError::AlreadyRunning(operator_id))?;

        let rules = self.store.active_rules(operator_id)?;
        if rules.is_empty() {
            warn!(
                "End-of-day for operator {} skipped: no rescheduling rules configured",
                operator_id
            );
            return Ok(RescheduleReport::not_configured(operator_id, close_date));
        }

        let open_jobs = self.store.get_open_jobs(operator_id, close_date)?;
        info!(
            "End-of-day for operator {} on {}: {} open jobs",
            operator_id,
            close_date,
            open_jobs.len()
        );

        let mut report = RescheduleReport {
            operator_id,
            close_date,
            rules_configured: true,
            jobs_closed: 0,
            successors_created: 0,
            failures: vec![],
        };

        for job in open_jobs {
            let was_open = job.state != JobState::Incomplete;
            match self
                .lifecycle
                .transition(job.id, JobAction::MarkIncomplete, None)
            {
                Ok(_) => {
                    if was_open {
                        report.jobs_closed += 1;
                    }
                }
                Err(err) => {
                    warn!("End-of-day could not close job {}: {}", job.id, err);
                    report.failures.push(RescheduleFailure {
                        job_id: job.id,
                        reason: err.to_string(),
                    });
                    continue;
                }
            }

            let Some(successor_date) = next_occurrence(job.scheduled_date, &rules) else {
                warn!(
                    "End-of-day found no successor date for job {} ({})",
                    job.id, job.scheduled_date
                );
                report.failures.push(RescheduleFailure {
                    job_id: job.id,
                    reason: format!("no rule yields a successor date for {}", job.scheduled_date),
                });
                continue;
            };

            let annotation = format!("Rescheduled from job {}", job.id);
            let notes = match &job.notes {
                Some(existing) => format!("{existing}\n{annotation}"),
                None => annotation,
            };
            match self.store.insert_job(NewJob {
                operator_id: job.operator_id,
                customer_id: job.customer_id,
                address: job.address.clone(),
                state: JobState::Dispatched,
                scheduled_date: successor_date,
                notes: Some(notes),
                predecessor_id: Some(job.id),
            }) {
                Ok(successor) => {
                    info!(
                        "Job {} rescheduled to {} as job {}",
                        job.id, successor_date, successor.id
                    );
                    report.successors_created += 1;
                }
                Err(err) => {
                    warn!("End-of-day could not reschedule job {}: {}", job.id, err);
                    report.failures.push(RescheduleFailure {
                        job_id: job.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            "End-of-day for operator {} done: {} closed, {} rescheduled, {} failures",
            operator_id,
            report.jobs_closed,
            report.successors_created,
            report.failures.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_store::{DirectoryStore, JobStore, SqliteOpsStore};
    use crate::lifecycle::CreateJob;
    use crate::reschedule::{NewRescheduleRule, RuleOffset, RuleStore, SeasonWindow};
    use chrono::{NaiveDate, Weekday};

    struct Fixture {
        store: Arc<SqliteOpsStore>,
        rescheduler: EndOfDayRescheduler,
        lifecycle: JobLifecycle,
        operator_id: i64,
        customer_id: i64,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteOpsStore::in_memory().unwrap());
        let operator_id = store.insert_operator("Sam").unwrap();
        let customer_id = store.insert_customer("Acme", "1 Main St").unwrap();
        let ops: Arc<dyn OpsStore> = store.clone();
        Fixture {
            rescheduler: EndOfDayRescheduler::new(ops.clone()),
            lifecycle: JobLifecycle::new(ops),
            store,
            operator_id,
            customer_id,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    impl Fixture {
        fn job_on(&self, day: NaiveDate) -> i64 {
            self.lifecycle
                .create(CreateJob {
                    operator_id: self.operator_id,
                    customer_id: self.customer_id,
                    address: "1 Main St".to_string(),
                    scheduled_date: day,
                    notes: None,
                })
                .unwrap()
                .id
        }

        fn push_one_day_skip_sundays(&self) {
            self.store
                .insert_rule(NewRescheduleRule {
                    operator_id: None,
                    name: "push 1, skip Sun".to_string(),
                    offset: RuleOffset::PushDays(1),
                    skip_weekdays: vec![Weekday::Sun],
                    season: None,
                })
                .unwrap();
        }
    }

    #[test]
    fn no_rules_means_zero_mutations() {
        let fx = fixture();
        let saturday = date(2025, 6, 7);
        let job_id = fx.job_on(saturday);

        let report = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert!(!report.rules_configured);
        assert_eq!(report.jobs_closed, 0);
        assert_eq!(report.successors_created, 0);

        let job = fx.store.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.state, JobState::Dispatched);
        assert_eq!(
            fx.store.get_open_jobs(fx.operator_id, saturday).unwrap().len(),
            1
        );
    }

    #[test]
    fn saturday_close_moves_three_jobs_to_monday() {
        let fx = fixture();
        fx.push_one_day_skip_sundays();
        let saturday = date(2025, 6, 7);
        let monday = date(2025, 6, 9);
        let ids: Vec<i64> = (0..3).map(|_| fx.job_on(saturday)).collect();

        let report = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert!(report.rules_configured);
        assert_eq!(report.jobs_closed, 3);
        assert_eq!(report.successors_created, 3);
        assert!(report.failures.is_empty());

        for id in &ids {
            let closed = fx.store.get_job(*id).unwrap().unwrap();
            assert_eq!(closed.state, JobState::Incomplete);
            assert!(closed.stop_time.is_some());
        }
        let open = fx.store.get_open_jobs(fx.operator_id, monday).unwrap();
        assert_eq!(open.len(), 3);
        for successor in &open {
            assert_eq!(successor.scheduled_date, monday);
            assert_eq!(successor.state, JobState::Dispatched);
            assert!(ids.contains(&successor.predecessor_id.unwrap()));
            assert!(successor
                .notes
                .as_deref()
                .unwrap()
                .starts_with("Rescheduled from job "));
        }
    }

    #[test]
    fn second_close_of_the_same_day_creates_nothing() {
        let fx = fixture();
        fx.push_one_day_skip_sundays();
        let saturday = date(2025, 6, 7);
        let job_id = fx.job_on(saturday);

        let first = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert_eq!(first.jobs_closed, 1);
        assert_eq!(first.successors_created, 1);

        // The successor is dated Monday, past the close date: a repeated
        // close finds nothing and must not push it further out.
        let second = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert_eq!(second.jobs_closed, 0);
        assert_eq!(second.successors_created, 0);
        assert!(second.failures.is_empty());

        // 1 original + exactly 1 successor, still scheduled on Monday
        let all = fx
            .store
            .get_jobs_in_range(fx.operator_id, date(2025, 6, 1), date(2025, 6, 30))
            .unwrap();
        assert_eq!(all.len(), 2);
        let successor = all.iter().find(|j| j.id != job_id).unwrap();
        assert_eq!(successor.scheduled_date, date(2025, 6, 9));
        assert_eq!(successor.state, JobState::Dispatched);
    }

    #[test]
    fn jobs_scheduled_after_the_close_date_are_untouched() {
        let fx = fixture();
        fx.push_one_day_skip_sundays();
        let saturday = date(2025, 6, 7);
        let today_job = fx.job_on(saturday);
        let next_week_job = fx.job_on(date(2025, 6, 14));

        let report = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert_eq!(report.jobs_closed, 1);
        assert_eq!(report.successors_created, 1);

        assert_eq!(
            fx.store.get_job(today_job).unwrap().unwrap().state,
            JobState::Incomplete
        );
        let untouched = fx.store.get_job(next_week_job).unwrap().unwrap();
        assert_eq!(untouched.state, JobState::Dispatched);
        assert!(untouched.stop_time.is_none());
    }

    #[test]
    fn completed_jobs_are_left_alone() {
        let fx = fixture();
        fx.push_one_day_skip_sundays();
        let saturday = date(2025, 6, 7);
        let done = fx.job_on(saturday);
        fx.lifecycle.transition(done, JobAction::Start, None).unwrap();
        fx.lifecycle
            .transition(done, JobAction::Photo, Some("img://done"))
            .unwrap();
        let open = fx.job_on(saturday);

        let report = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert_eq!(report.jobs_closed, 1);
        assert_eq!(report.successors_created, 1);

        assert_eq!(
            fx.store.get_job(done).unwrap().unwrap().state,
            JobState::Completed
        );
        assert_eq!(
            fx.store.get_job(open).unwrap().unwrap().state,
            JobState::Incomplete
        );
    }

    #[test]
    fn out_of_season_jobs_fail_and_are_retried_next_run() {
        let fx = fixture();
        // Only a winter rule: the June job closes but gets no successor
        fx.store
            .insert_rule(NewRescheduleRule {
                operator_id: None,
                name: "winter".to_string(),
                offset: RuleOffset::PushDays(1),
                skip_weekdays: vec![],
                season: Some(SeasonWindow {
                    start: (11, 1),
                    end: (3, 31),
                }),
            })
            .unwrap();
        let saturday = date(2025, 6, 7);
        let job_id = fx.job_on(saturday);

        let report = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert_eq!(report.jobs_closed, 1);
        assert_eq!(report.successors_created, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].job_id, job_id);

        // Closed without a successor: still qualifying
        assert_eq!(
            fx.store.get_open_jobs(fx.operator_id, saturday).unwrap().len(),
            1
        );

        // Once a season-less rule exists the retry succeeds
        fx.push_one_day_skip_sundays();
        let retry = fx.rescheduler.close_day(fx.operator_id, saturday).unwrap();
        assert_eq!(retry.jobs_closed, 0); // already INCOMPLETE
        assert_eq!(retry.successors_created, 1);
        assert!(retry.failures.is_empty());
    }

    #[test]
    fn operator_lock_blocks_a_second_concurrent_run() {
        let locks = Arc::new(OperatorLocks::default());
        let guard = locks.acquire(7).unwrap();
        assert!(locks.acquire(7).is_none());
        // Other operators are unaffected
        assert!(locks.acquire(8).is_some());
        drop(guard);
        assert!(locks.acquire(7).is_some());
    }
}
