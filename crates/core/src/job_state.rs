//! Derived job lifecycle state.
//!
//! State is never stored; it follows from the job's timestamps, its result
//! reference and any cooling-down failure at a given instant.

use serde::Serialize;

use crate::lease::Timeouts;
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Unclaimed, or the last lease ran out.
    Pending,
    /// Claimed by a factory that has not started loading the page.
    Leased,
    /// The factory's browser is loading the page.
    InProgress,
    /// A result has been attached.
    Completed,
    /// A recent failure keeps the job out of matching for the leasing browser.
    Failed,
}

/// The columns of a job row that state depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobClock {
    pub locked_at: Option<Timestamp>,
    pub redirected_at: Option<Timestamp>,
    pub has_result: bool,
    pub last_failure_at: Option<Timestamp>,
}

impl JobState {
    pub fn derive(clock: &JobClock, timeouts: &Timeouts, now: Timestamp) -> Self {
        if clock.has_result {
            return JobState::Completed;
        }
        if let Some(failed_at) = clock.last_failure_at {
            // A failure only counts against the lease it ended.
            let ended_lease = clock.locked_at.map_or(true, |locked| failed_at >= locked);
            if ended_lease && timeouts.is_cooling_down(failed_at, now) {
                return JobState::Failed;
            }
        }
        match clock.locked_at {
            Some(locked) if timeouts.is_lease_active(locked, now) => {
                let redirected = clock.redirected_at.is_some_and(|r| r >= locked);
                if redirected {
                    JobState::InProgress
                } else {
                    JobState::Leased
                }
            }
            _ => JobState::Pending,
        }
    }

    /// Short label shown next to a queued browser.
    pub fn label(self) -> &'static str {
        match self {
            JobState::Pending => "",
            JobState::Leased => "starting",
            JobState::InProgress => "loading",
            JobState::Completed => "uploaded",
            JobState::Failed => "failed",
        }
    }
}
