//! Lease and failure cool-down timing.
//!
//! Leases are never released explicitly: a lease is active while
//! `now - created <= lease_timeout` and garbage afterwards. Failure records
//! work the same way with their own, independent window.

use chrono::Duration;

use crate::types::Timestamp;

/// Default time a factory may hold a job before others can claim it.
pub const DEFAULT_LEASE_TIMEOUT_SECS: i64 = 180;

/// Default time a failed (job, browser) pair is kept out of matching.
pub const DEFAULT_FAILURE_TIMEOUT_SECS: i64 = 600;

/// The two time windows the dispatch protocol depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub lease: Duration,
    pub failure: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_secs(DEFAULT_LEASE_TIMEOUT_SECS, DEFAULT_FAILURE_TIMEOUT_SECS)
    }
}

impl Timeouts {
    pub fn from_secs(lease_secs: i64, failure_secs: i64) -> Self {
        Self {
            lease: Duration::seconds(lease_secs),
            failure: Duration::seconds(failure_secs),
        }
    }

    /// Leases created at or after this instant are still active at `now`.
    pub fn lease_cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.lease
    }

    /// Failures created at or after this instant are still cooling down at `now`.
    pub fn failure_cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.failure
    }

    pub fn is_lease_active(&self, locked_at: Timestamp, now: Timestamp) -> bool {
        locked_at >= self.lease_cutoff(now)
    }

    pub fn is_cooling_down(&self, failed_at: Timestamp, now: Timestamp) -> bool {
        failed_at >= self.failure_cutoff(now)
    }
}
