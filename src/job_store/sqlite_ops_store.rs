//! SQLite-backed operations store.
//!
//! One database file holds jobs, the operator/customer registries and the
//! rescheduling rules. Fresh databases are created at the latest schema
//! version; existing ones are version-checked, validated and migrated.

use super::models::*;
use super::schema::OPS_VERSIONED_SCHEMAS;
use super::{DirectoryStore, JobStore, QUALIFYING_JOB_PREDICATE};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::sqlite_persistence::BASE_DB_VERSION;

const DATE_FMT: &str = "%Y-%m-%d";

pub struct SqliteOpsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOpsStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open dispatch database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        if is_new_db {
            info!("Creating new dispatch database at {:?}", path);
            OPS_VERSIONED_SCHEMAS
                .last()
                .context("No schemas defined")?
                .create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;

            if db_version < 1 {
                bail!("Dispatch database version {} is invalid (expected >= 1)", db_version);
            }

            let latest = OPS_VERSIONED_SCHEMAS.last().context("No schemas defined")?;
            if db_version > latest.version as i64 {
                bail!(
                    "Dispatch database version {} is too new (max supported: {})",
                    db_version,
                    latest.version
                );
            }

            OPS_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown dispatch database version {}", db_version))?
                .validate(&conn)
                .with_context(|| {
                    format!("Dispatch database schema validation failed for version {}", db_version)
                })?;

            Self::migrate_if_needed(&conn, db_version as usize)?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        OPS_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, current_version: usize) -> Result<()> {
        let target_version = OPS_VERSIONED_SCHEMAS.last().map(|s| s.version).unwrap_or(1);
        if current_version >= target_version {
            return Ok(());
        }

        info!(
            "Migrating dispatch database from version {} to {}",
            current_version, target_version
        );
        for schema in OPS_VERSIONED_SCHEMAS.iter().filter(|s| s.version > current_version) {
            if let Some(migration_fn) = schema.migration {
                info!("Running dispatch migration to version {}", schema.version);
                migration_fn(conn)
                    .with_context(|| format!("Failed migration to version {}", schema.version))?;
            }
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + target_version),
            [],
        )?;
        Ok(())
    }

    pub(crate) fn connection(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let state_str: String = row.get("state")?;
        let state = JobState::parse(&state_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown job state '{}'", state_str).into(),
            )
        })?;

        let date_str: String = row.get("scheduled_date")?;
        let scheduled_date = NaiveDate::parse_from_str(&date_str, DATE_FMT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(Job {
            id: row.get("id")?,
            operator_id: row.get("operator_id")?,
            customer_id: row.get("customer_id")?,
            address: row.get("address")?,
            state,
            scheduled_date,
            start_time: row.get("start_time")?,
            stop_time: row.get("stop_time")?,
            photo_url: row.get("photo_url")?,
            notes: row.get("notes")?,
            predecessor_id: row.get("predecessor_id")?,
            created_at: row.get("created")?,
            updated_at: row.get("updated")?,
        })
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }
}

impl JobStore for SqliteOpsStore {
    fn insert_job(&self, new_job: NewJob) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        let now = Self::now();
        conn.execute(
            r#"INSERT INTO job (
                operator_id, customer_id, address, state, scheduled_date,
                notes, predecessor_id, created, updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)"#,
            params![
                new_job.operator_id,
                new_job.customer_id,
                new_job.address,
                new_job.state.as_str(),
                new_job.scheduled_date.format(DATE_FMT).to_string(),
                new_job.notes,
                new_job.predecessor_id,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Job {
            id,
            operator_id: new_job.operator_id,
            customer_id: new_job.customer_id,
            address: new_job.address,
            state: new_job.state,
            scheduled_date: new_job.scheduled_date,
            start_time: None,
            stop_time: None,
            photo_url: None,
            notes: new_job.notes,
            predecessor_id: new_job.predecessor_id,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM job WHERE id = ?1")?;
        let job = stmt.query_row([id], Self::row_to_job).optional()?;
        Ok(job)
    }

    fn update_job_state(&self, update: JobStateUpdate) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        // COALESCE keeps an already-set stamp: times are never overwritten
        let affected = conn.execute(
            r#"UPDATE job SET
                state = ?1,
                start_time = COALESCE(start_time, ?2),
                stop_time = COALESCE(stop_time, ?3),
                photo_url = COALESCE(photo_url, ?4),
                updated = ?5
            WHERE id = ?6 AND state = ?7"#,
            params![
                update.new_state.as_str(),
                update.set_start_time,
                update.set_stop_time,
                update.set_photo_url,
                Self::now(),
                update.job_id,
                update.expected_state.as_str(),
            ],
        )?;

        if affected == 0 {
            return Ok(None);
        }

        let mut stmt = conn.prepare("SELECT * FROM job WHERE id = ?1")?;
        let job = stmt
            .query_row([update.job_id], Self::row_to_job)
            .context("Updated job row disappeared")?;
        Ok(Some(job))
    }

    fn get_open_jobs(&self, operator_id: i64, through: NaiveDate) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM job WHERE operator_id = ?1 AND scheduled_date <= ?2 AND {} ORDER BY id ASC",
            QUALIFYING_JOB_PREDICATE
        ))?;
        let jobs = stmt
            .query_map(
                params![operator_id, through.format(DATE_FMT).to_string()],
                Self::row_to_job,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn get_jobs_in_range(
        &self,
        operator_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT * FROM job
               WHERE operator_id = ?1 AND scheduled_date >= ?2 AND scheduled_date <= ?3
               ORDER BY scheduled_date ASC, id ASC"#,
        )?;
        let jobs = stmt
            .query_map(
                params![
                    operator_id,
                    from.format(DATE_FMT).to_string(),
                    to.format(DATE_FMT).to_string()
                ],
                Self::row_to_job,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn count_jobs_remaining(&self, from: NaiveDate, to: NaiveDate) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM job WHERE scheduled_date >= ?1 AND scheduled_date <= ?2 AND {}",
                QUALIFYING_JOB_PREDICATE
            ),
            params![
                from.format(DATE_FMT).to_string(),
                to.format(DATE_FMT).to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_jobs_remaining_by_day(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, usize)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"SELECT scheduled_date, COUNT(*) FROM job
               WHERE scheduled_date >= ?1 AND scheduled_date <= ?2 AND {}
               GROUP BY scheduled_date ORDER BY scheduled_date ASC"#,
            QUALIFYING_JOB_PREDICATE
        ))?;
        let rows = stmt
            .query_map(
                params![
                    from.format(DATE_FMT).to_string(),
                    to.format(DATE_FMT).to_string()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts = Vec::with_capacity(rows.len());
        for (date_str, count) in rows {
            let date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
                .with_context(|| format!("Invalid scheduled_date in database: {}", date_str))?;
            counts.push((date, count as usize));
        }
        Ok(counts)
    }

    fn get_customer_photos(&self, customer_id: i64) -> Result<Vec<CustomerPhoto>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT id, photo_url, stop_time, updated FROM job
               WHERE customer_id = ?1 AND photo_url IS NOT NULL
               ORDER BY updated DESC"#,
        )?;
        let photos = stmt
            .query_map([customer_id], |row| {
                let stop_time: Option<i64> = row.get(2)?;
                let updated: i64 = row.get(3)?;
                Ok(CustomerPhoto {
                    job_id: row.get(0)?,
                    photo_url: row.get(1)?,
                    taken_at: stop_time.unwrap_or(updated),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }
}

impl DirectoryStore for SqliteOpsStore {
    fn insert_operator(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO operator (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_customer(&self, name: &str, address: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO customer (name, address) VALUES (?1, ?2)",
            params![name, address],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn operator_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row("SELECT 1 FROM operator WHERE id = ?1", [id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    fn customer_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row("SELECT 1 FROM customer WHERE id = ?1", [id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }
}
