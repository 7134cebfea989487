//! Lease and failure records.

use serde::Serialize;
use shotserver_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `leases` table: one granted claim.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lease {
    pub id: DbId,
    pub job_id: DbId,
    pub factory_id: DbId,
    pub browser_id: DbId,
    pub created_at: Timestamp,
}

/// The lease currently recorded on a job row, with the holder's name.
#[derive(Debug, Clone, FromRow)]
pub struct CurrentLease {
    pub job_id: DbId,
    pub factory_id: Option<DbId>,
    pub factory_name: Option<String>,
    pub browser_id: Option<DbId>,
    pub locked_at: Option<Timestamp>,
}

/// Result of a conditional claim.
#[derive(Debug, Clone)]
pub enum LeaseOutcome {
    Granted(Lease),
    /// Someone else holds an active lease, or the job already has a result.
    Denied { holder: Option<DbId> },
}

/// A row from the `failures` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Failure {
    pub id: DbId,
    pub job_id: DbId,
    pub browser_id: DbId,
    pub factory_id: DbId,
    pub message: Option<String>,
    pub created_at: Timestamp,
}
