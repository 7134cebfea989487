//! The factory-facing dispatch protocol.
//!
//! [`auth`] verifies challenge-response credentials; [`coordinator`] drives
//! a poll from authentication through the atomic claim, and handles the
//! result path (redirect, result upload, failure report).
//!
//! Every operation takes `now` explicitly so callers (and tests) control the
//! clock that lease and cool-down windows are measured against.

pub mod auth;
pub mod coordinator;

use shotserver_core::crypt::CredentialHasher;
use shotserver_core::error::CoreError;
use shotserver_core::lease::Timeouts;
use shotserver_core::poll::AuthRejection;

use crate::config::DispatchConfig;

pub use coordinator::{
    challenge, poll, redirect, report_failure, submit_result, FailureInput, PollInput,
    PollOutcome, ResultInput,
};

/// Settings shared by every dispatch operation.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext {
    pub timeouts: Timeouts,
    pub hasher: &'static dyn CredentialHasher,
}

impl DispatchContext {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            timeouts: config.timeouts(),
            hasher: config.credential_hash.hasher(),
        }
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

/// Errors from the result path.
///
/// Polls never fail with `Rejected`; they report it as a status instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{}", .0.message())]
    Rejected(AuthRejection),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<AuthRejection> for DispatchError {
    fn from(reason: AuthRejection) -> Self {
        DispatchError::Rejected(reason)
    }
}
