//! Read-only period aggregation over open jobs.
//!
//! Counts use the exact same qualifying predicate as the End-of-Day batch,
//! so "remaining" here always agrees with what a close-day run would pick up.

use crate::job_store::OpsStore;
use anyhow::{bail, Result};
use chrono::{Datelike, Days, NaiveDate};
use std::sync::Arc;

pub struct PeriodAggregator {
    store: Arc<dyn OpsStore>,
}

impl PeriodAggregator {
    pub fn new(store: Arc<dyn OpsStore>) -> Self {
        Self { store }
    }

    /// Count of open jobs scheduled in the inclusive window. A best-effort
    /// snapshot, not a lock.
    pub fn jobs_remaining(&self, from: NaiveDate, to: NaiveDate) -> Result<usize> {
        if from > to {
            bail!("Invalid window: {} is after {}", from, to);
        }
        self.store.count_jobs_remaining(from, to)
    }

    /// Per-day open-job counts for one calendar month. Days with no open
    /// jobs are omitted.
    pub fn remaining_by_day(&self, year: i32, month: u32) -> Result<Vec<(NaiveDate, usize)>> {
        let from = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow::anyhow!("Invalid month {}-{}", year, month))?;
        let to = last_day_of_month(from);
        self.store.count_jobs_remaining_by_day(from, to)
    }
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    // Every month has a first day, so the subtraction cannot fail
    next_month
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(first)
}
