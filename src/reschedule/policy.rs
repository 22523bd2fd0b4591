//! Successor-date computation for the End-of-Day batch.
//!
//! Pure date arithmetic; rules come from the store, the decision of when to
//! run and which jobs qualify lives in the rescheduler.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// How many days the forward adjustment will scan before giving up. A skip
/// set covering every weekday is unsatisfiable and must not loop.
const MAX_FORWARD_SCAN: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOffset {
    /// Push the date forward by a fixed number of calendar days.
    PushDays(u32),
    /// Advance at least one day to the next Monday-Friday.
    NextWeekday,
    /// Rescheduling switched off; the policy yields no date.
    Disabled,
}

/// An inclusive month-day window. `start` may be later in the year than
/// `end`, in which case the window wraps the year boundary (e.g. Nov-Mar).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonWindow {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl SeasonWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = (date.month(), date.day());
        if self.start <= self.end {
            self.start <= md && md <= self.end
        } else {
            md >= self.start || md <= self.end
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleRule {
    pub id: i64,
    /// None = applies to every operator.
    pub operator_id: Option<i64>,
    pub name: String,
    pub offset: RuleOffset,
    /// Weekdays the successor date must not fall on.
    pub skip_weekdays: Vec<Weekday>,
    pub season: Option<SeasonWindow>,
}

/// Computes the date a successor for a job scheduled on `scheduled_date`
/// should get, or `None` when no rule applies (callers treat that as
/// not-configured and never guess a default).
pub fn next_occurrence(scheduled_date: NaiveDate, rules: &[RescheduleRule]) -> Option<NaiveDate> {
    let rule = select_rule(scheduled_date, rules)?;

    let candidate = match rule.offset {
        RuleOffset::Disabled => return None,
        RuleOffset::PushDays(n) => scheduled_date.checked_add_days(Days::new(n as u64))?,
        RuleOffset::NextWeekday => {
            let mut date = scheduled_date.checked_add_days(Days::new(1))?;
            while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                date = date.checked_add_days(Days::new(1))?;
            }
            date
        }
    };

    adjust_forward(candidate, &rule.skip_weekdays)
}

/// First rule whose season window contains the date, else the first
/// season-less rule. Rules arrive operator-specific first, so a specific
/// rule always beats a global one.
fn select_rule(date: NaiveDate, rules: &[RescheduleRule]) -> Option<&RescheduleRule> {
    rules
        .iter()
        .find(|r| r.season.is_some_and(|s| s.contains(date)))
        .or_else(|| rules.iter().find(|r| r.season.is_none()))
}

/// Advances one day at a time while the date falls on a skipped weekday.
/// Idempotent on dates that are already valid.
fn adjust_forward(mut date: NaiveDate, skip: &[Weekday]) -> Option<NaiveDate> {
    for _ in 0..=MAX_FORWARD_SCAN {
        if !skip.contains(&date.weekday()) {
            return Some(date);
        }
        date = date.checked_add_days(Days::new(1))?;
    }
    None
}
