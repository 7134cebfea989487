//! Repository for job leases.
//!
//! The job row holds the current lease and is the compare-and-swap target of
//! every claim; the `leases` table is the append-only history of grants.
//! Leases are never released. They lapse once `lease_timeout` has passed.

use shotserver_core::error::CoreError;
use shotserver_core::lease::Timeouts;
use shotserver_core::types::{DbId, Timestamp};
use sqlx::{PgPool, Postgres};

use crate::models::lease::{CurrentLease, Lease, LeaseOutcome};

/// Column list for `leases` queries.
const COLUMNS: &str = "id, job_id, factory_id, browser_id, created_at";

pub struct LeaseRepo;

impl LeaseRepo {
    /// Claim `job_id` for `(factory_id, browser_id)` if nobody holds an
    /// active lease and the job has no result.
    ///
    /// Call inside the transaction that located the job; the conditional
    /// update is what makes the claim exclusive.
    pub async fn try_lease(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        job_id: DbId,
        factory_id: DbId,
        browser_id: DbId,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<LeaseOutcome, sqlx::Error> {
        let claimed = sqlx::query(
            "UPDATE jobs \
             SET factory_id = $2, browser_id = $3, locked_at = $4, redirected_at = NULL \
             WHERE id = $1 AND result_ref IS NULL \
               AND (locked_at IS NULL OR locked_at < $5)",
        )
        .bind(job_id)
        .bind(factory_id)
        .bind(browser_id)
        .bind(now)
        .bind(timeouts.lease_cutoff(now))
        .execute(&mut **tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let holder: Option<Option<DbId>> =
                sqlx::query_scalar("SELECT factory_id FROM jobs WHERE id = $1")
                    .bind(job_id)
                    .fetch_optional(&mut **tx)
                    .await?;
            let holder = holder.flatten();
            tracing::debug!(job_id, factory_id, ?holder, "Lease denied");
            return Ok(LeaseOutcome::Denied { holder });
        }

        let query = format!(
            "INSERT INTO leases (job_id, factory_id, browser_id, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let lease = sqlx::query_as::<_, Lease>(&query)
            .bind(job_id)
            .bind(factory_id)
            .bind(browser_id)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
        Ok(LeaseOutcome::Granted(lease))
    }

    /// True iff `factory_id` holds an active lease on the job.
    pub async fn is_lease_valid(
        pool: &PgPool,
        job_id: DbId,
        factory_id: DbId,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM jobs WHERE id = $1 AND factory_id = $2 AND locked_at >= $3 \
             )",
        )
        .bind(job_id)
        .bind(factory_id)
        .bind(timeouts.lease_cutoff(now))
        .fetch_one(pool)
        .await
    }

    /// The lease currently recorded on the job row, active or not.
    pub async fn current(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Option<CurrentLease>, sqlx::Error> {
        sqlx::query_as::<_, CurrentLease>(
            "SELECT j.id AS job_id, j.factory_id, f.name AS factory_name, \
                    j.browser_id, j.locked_at \
             FROM jobs j LEFT JOIN factories f ON f.id = j.factory_id \
             WHERE j.id = $1",
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await
    }

    /// Like [`is_lease_valid`](Self::is_lease_valid), but explains a refusal.
    ///
    /// Returns the active lease on success, `NotFound` for an unknown job,
    /// `NotLocked` if the job was never leased, and `LeaseConflict` (naming
    /// the holder when another factory's lease is still active) otherwise.
    pub async fn check_lease(
        pool: &PgPool,
        job_id: DbId,
        factory_id: DbId,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<Result<CurrentLease, CoreError>, sqlx::Error> {
        let Some(current) = Self::current(pool, job_id).await? else {
            return Ok(Err(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            }));
        };
        Ok(classify(current, factory_id, timeouts, now))
    }

    /// Accept the caller if it holds the job's most recent lease, active or
    /// expired, provided no other factory has claimed the job since.
    ///
    /// Used for failure reports, which may arrive after the lease ran out.
    pub async fn check_last_holder(
        pool: &PgPool,
        job_id: DbId,
        factory_id: DbId,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<Result<CurrentLease, CoreError>, sqlx::Error> {
        let Some(current) = Self::current(pool, job_id).await? else {
            return Ok(Err(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            }));
        };
        Ok(classify_last_holder(current, factory_id, timeouts, now))
    }

    /// Grant history for a job, newest first.
    pub async fn list_for_job(pool: &PgPool, job_id: DbId) -> Result<Vec<Lease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM leases WHERE job_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Lease>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}

fn classify(
    current: CurrentLease,
    factory_id: DbId,
    timeouts: &Timeouts,
    now: Timestamp,
) -> Result<CurrentLease, CoreError> {
    let (Some(holder_id), Some(locked_at)) = (current.factory_id, current.locked_at) else {
        return Err(CoreError::NotLocked {
            job_id: current.job_id,
        });
    };
    let active = timeouts.is_lease_active(locked_at, now);
    if holder_id == factory_id && active {
        return Ok(current);
    }
    let holder = if active && holder_id != factory_id {
        current.factory_name.clone()
    } else {
        None
    };
    Err(CoreError::LeaseConflict {
        job_id: current.job_id,
        holder,
    })
}

fn classify_last_holder(
    current: CurrentLease,
    factory_id: DbId,
    timeouts: &Timeouts,
    now: Timestamp,
) -> Result<CurrentLease, CoreError> {
    if current.factory_id == Some(factory_id) && current.locked_at.is_some() {
        return Ok(current);
    }
    classify(current, factory_id, timeouts, now)
}
