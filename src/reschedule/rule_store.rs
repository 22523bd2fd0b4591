use super::policy::{RescheduleRule, RuleOffset, SeasonWindow};
use crate::job_store::SqliteOpsStore;
use anyhow::{bail, Context, Result};
use chrono::Weekday;
use rusqlite::params;

pub trait RuleStore: Send + Sync {
    /// An operator's active rule set: operator-specific rows first, then the
    /// global rows (NULL operator_id), each group ascending by id. An empty
    /// result means rescheduling is not configured for this operator.
    fn active_rules(&self, operator_id: i64) -> Result<Vec<RescheduleRule>>;

    fn insert_rule(&self, rule: NewRescheduleRule) -> Result<i64>;
}

#[derive(Debug, Clone)]
pub struct NewRescheduleRule {
    pub operator_id: Option<i64>,
    pub name: String,
    pub offset: RuleOffset,
    pub skip_weekdays: Vec<Weekday>,
    pub season: Option<SeasonWindow>,
}

fn offset_kind(offset: &RuleOffset) -> &'static str {
    match offset {
        RuleOffset::PushDays(_) => "push_days",
        RuleOffset::NextWeekday => "next_weekday",
        RuleOffset::Disabled => "disabled",
    }
}

fn parse_offset(kind: &str, days: Option<i64>) -> Result<RuleOffset> {
    match kind {
        "push_days" => {
            let days = days.context("push_days rule has no offset_days")?;
            if days < 0 {
                bail!("push_days offset must be non-negative, got {}", days);
            }
            Ok(RuleOffset::PushDays(days as u32))
        }
        "next_weekday" => Ok(RuleOffset::NextWeekday),
        "disabled" => Ok(RuleOffset::Disabled),
        other => bail!("Unknown rule offset kind '{}'", other),
    }
}

fn weekday_token(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

fn parse_weekday(token: &str) -> Result<Weekday> {
    match token {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        other => bail!("Unknown weekday token '{}'", other),
    }
}

fn encode_weekdays(weekdays: &[Weekday]) -> Option<String> {
    if weekdays.is_empty() {
        return None;
    }
    Some(
        weekdays
            .iter()
            .map(|w| weekday_token(*w))
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn parse_weekdays(encoded: Option<&str>) -> Result<Vec<Weekday>> {
    match encoded {
        None => Ok(vec![]),
        Some(s) => s
            .split(',')
            .filter(|t| !t.is_empty())
            .map(|t| parse_weekday(t.trim()))
            .collect(),
    }
}

fn encode_month_day(md: (u32, u32)) -> String {
    format!("{:02}-{:02}", md.0, md.1)
}

fn parse_month_day(s: &str) -> Result<(u32, u32)> {
    let (month, day) = s
        .split_once('-')
        .with_context(|| format!("Invalid month-day '{}'", s))?;
    let month: u32 = month.parse().with_context(|| format!("Invalid month in '{}'", s))?;
    let day: u32 = day.parse().with_context(|| format!("Invalid day in '{}'", s))?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        bail!("Month-day '{}' out of range", s);
    }
    Ok((month, day))
}

impl RuleStore for SqliteOpsStore {
    fn active_rules(&self, operator_id: i64) -> Result<Vec<RescheduleRule>> {
        let conn = self.connection().lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT id, operator_id, name, offset_kind, offset_days,
                      skip_weekdays, season_start, season_end
               FROM reschedule_rule
               WHERE operator_id = ?1 OR operator_id IS NULL
               ORDER BY (operator_id IS NULL) ASC, id ASC"#,
        )?;
        let rows = stmt
            .query_map([operator_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rules = Vec::with_capacity(rows.len());
        for (id, operator_id, name, kind, days, skip, season_start, season_end) in rows {
            let season = match (season_start, season_end) {
                (Some(start), Some(end)) => Some(SeasonWindow {
                    start: parse_month_day(&start)?,
                    end: parse_month_day(&end)?,
                }),
                (None, None) => None,
                _ => bail!("Rule {} has a half-open season window", id),
            };
            rules.push(RescheduleRule {
                id,
                operator_id,
                name,
                offset: parse_offset(&kind, days)?,
                skip_weekdays: parse_weekdays(skip.as_deref())?,
                season,
            });
        }
        Ok(rules)
    }

    fn insert_rule(&self, rule: NewRescheduleRule) -> Result<i64> {
        let offset_days = match rule.offset {
            RuleOffset::PushDays(n) => Some(n as i64),
            _ => None,
        };
        let conn = self.connection().lock().unwrap();
        conn.execute(
            r#"INSERT INTO reschedule_rule (
                operator_id, name, offset_kind, offset_days,
                skip_weekdays, season_start, season_end
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                rule.operator_id,
                rule.name,
                offset_kind(&rule.offset),
                offset_days,
                encode_weekdays(&rule.skip_weekdays),
                rule.season.map(|s| encode_month_day(s.start)),
                rule.season.map(|s| encode_month_day(s.end)),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
