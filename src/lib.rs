pub mod calendar;
pub mod config;
pub mod job_store;
pub mod lifecycle;
pub mod reschedule;
pub mod server;
pub mod sqlite_persistence;
