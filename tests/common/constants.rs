//! Shared constants for the e2e harness

pub const REQUEST_TIMEOUT_SECS: u64 = 5;
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Address every fixture job is scheduled at.
pub const TEST_ADDRESS: &str = "12 Canal Street";
