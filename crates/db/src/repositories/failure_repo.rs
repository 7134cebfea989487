//! Repository for the `failures` table.
//!
//! A failure keeps one (job, factory browser) pair out of matching until
//! `failure_timeout` has passed. Other browsers may still take the job.

use shotserver_core::lease::Timeouts;
use shotserver_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::lease::Failure;

/// Column list for `failures` queries.
const COLUMNS: &str = "id, job_id, browser_id, factory_id, message, created_at";

pub struct FailureRepo;

impl FailureRepo {
    pub async fn record(
        pool: &PgPool,
        job_id: DbId,
        browser_id: DbId,
        factory_id: DbId,
        message: Option<&str>,
        now: Timestamp,
    ) -> Result<Failure, sqlx::Error> {
        let query = format!(
            "INSERT INTO failures (job_id, browser_id, factory_id, message, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Failure>(&query)
            .bind(job_id)
            .bind(browser_id)
            .bind(factory_id)
            .bind(message)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    pub async fn is_cooling_down(
        pool: &PgPool,
        job_id: DbId,
        browser_id: DbId,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM failures \
                 WHERE job_id = $1 AND browser_id = $2 AND created_at >= $3 \
             )",
        )
        .bind(job_id)
        .bind(browser_id)
        .bind(timeouts.failure_cutoff(now))
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_job(pool: &PgPool, job_id: DbId) -> Result<Vec<Failure>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM failures WHERE job_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Failure>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
