//! Repository for the `jobs` table.
//!
//! A job's lease lives on its own row (`factory_id`, `browser_id`,
//! `locked_at`). Every write that depends on the lease is a conditional
//! `UPDATE`, so a stale caller never overwrites a newer claim.

use shotserver_core::job_state::JobClock;
use shotserver_core::lease::Timeouts;
use shotserver_core::matching::EligibilityPredicate;
use shotserver_core::options::JobOptions;
use shotserver_core::types::{DbId, Timestamp};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::job::{CreateJob, EligibleJob, Job, JobRequirementsRow};
use crate::query;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, request_group_id, platform, browser_group, major, minor, \
    factory_id, browser_id, locked_at, redirected_at, result_ref, created_at";

/// A job joined with its group's options (`j` = jobs, `g` = request_groups).
const REQUIREMENT_COLUMNS: &str = "\
    j.id AS job_id, g.website_url, j.platform, j.browser_group, j.major, j.minor, \
    g.width, g.bits_per_pixel, g.javascript, g.java, g.flash, g.media, g.submitted_at";

pub struct JobRepo;

impl JobRepo {
    pub async fn create(
        pool: &PgPool,
        request_group_id: DbId,
        input: &CreateJob,
        now: Timestamp,
    ) -> Result<Job, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let job = Self::create_in(&mut tx, request_group_id, input, now).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Insert a job inside an existing transaction.
    pub async fn create_in(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        request_group_id: DbId,
        input: &CreateJob,
        now: Timestamp,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (request_group_id, platform, browser_group, major, minor, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(request_group_id)
            .bind(&input.platform)
            .bind(&input.browser_group)
            .bind(input.major)
            .bind(input.minor)
            .bind(now)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_group(pool: &PgPool, group_id: DbId) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE request_group_id = $1 ORDER BY id");
        sqlx::query_as::<_, Job>(&query)
            .bind(group_id)
            .fetch_all(pool)
            .await
    }

    /// The job together with its group's requested options.
    pub async fn find_requirements(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Option<JobRequirementsRow>, sqlx::Error> {
        let query = format!(
            "SELECT {REQUIREMENT_COLUMNS} \
             FROM jobs j JOIN request_groups g ON g.id = j.request_group_id \
             WHERE j.id = $1"
        );
        sqlx::query_as::<_, JobRequirementsRow>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// The configuration map a factory receives for this job.
    pub async fn find_options(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Option<JobOptions>, sqlx::Error> {
        let row = Self::find_requirements(pool, job_id).await?;
        Ok(row.map(|r| JobOptions::project(&r.requirements())))
    }

    /// Find and row-lock the oldest job the predicate's factory can take.
    ///
    /// A job qualifies when its group is unexpired, it has no result, its
    /// lease (if any) has run out, one of the factory's browsers matches it,
    /// and that (job, browser) pair is not cooling down from a failure.
    /// Ordered by group submission time, then job id, then browser id.
    ///
    /// Rows locked by a concurrent claim are skipped, never waited on. The
    /// returned job stays locked until `tx` ends.
    pub async fn find_oldest_eligible(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        predicate: &EligibilityPredicate,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<Option<EligibleJob>, sqlx::Error> {
        if predicate.browsers.is_empty() {
            return Ok(None);
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT b.id AS browser_id, {REQUIREMENT_COLUMNS} \
             FROM jobs j \
             JOIN request_groups g ON g.id = j.request_group_id \
             JOIN factory_browsers b ON b.factory_id = "
        ));
        qb.push_bind(predicate.factory_id);
        qb.push(" AND b.id = ANY(");
        qb.push_bind(predicate.browser_ids());
        qb.push(
            ") AND b.is_active \
             AND b.browser_group = j.browser_group \
             AND (j.major IS NULL OR j.major = b.major) \
             AND (j.minor IS NULL OR j.minor = b.minor) \
             AND (g.javascript IS NULL OR g.javascript = b.javascript) \
             AND (g.java IS NULL OR g.java = b.java) \
             AND (g.flash IS NULL OR g.flash = b.flash) \
             WHERE g.expires_at >= ",
        );
        qb.push_bind(now);
        qb.push(" AND j.result_ref IS NULL AND (j.locked_at IS NULL OR j.locked_at < ");
        qb.push_bind(timeouts.lease_cutoff(now));
        qb.push(
            ") AND NOT EXISTS ( \
                 SELECT 1 FROM failures f \
                 WHERE f.job_id = j.id AND f.browser_id = b.id AND f.created_at >= ",
        );
        qb.push_bind(timeouts.failure_cutoff(now));
        qb.push(")");
        query::push_conditions(&mut qb, predicate);
        query::push_exclusions(&mut qb, predicate);
        qb.push(
            " ORDER BY g.submitted_at ASC, j.id ASC, b.id ASC \
             LIMIT 1 \
             FOR UPDATE OF j SKIP LOCKED",
        );

        qb.build_query_as::<EligibleJob>()
            .fetch_optional(&mut **tx)
            .await
    }

    /// Record that the leasing factory's browser started loading the page.
    ///
    /// Returns `false` if `factory_id` does not hold an active lease.
    pub async fn mark_redirected(
        pool: &PgPool,
        job_id: DbId,
        factory_id: DbId,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET redirected_at = $3 \
             WHERE id = $1 AND factory_id = $2 AND locked_at >= $4 AND result_ref IS NULL",
        )
        .bind(job_id)
        .bind(factory_id)
        .bind(now)
        .bind(timeouts.lease_cutoff(now))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Attach the uploaded screenshot reference.
    ///
    /// Conditional on `factory_id` still holding an active lease and no
    /// result being present. Returns `false` when the condition fails.
    pub async fn attach_result(
        pool: &PgPool,
        job_id: DbId,
        factory_id: DbId,
        result_ref: &str,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET result_ref = $3 \
             WHERE id = $1 AND factory_id = $2 AND locked_at >= $4 AND result_ref IS NULL",
        )
        .bind(job_id)
        .bind(factory_id)
        .bind(result_ref)
        .bind(timeouts.lease_cutoff(now))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The timestamps job state is derived from.
    ///
    /// `last_failure_at` is the newest failure for the browser that holds
    /// (or last held) the lease.
    pub async fn clock(pool: &PgPool, job_id: DbId) -> Result<Option<JobClock>, sqlx::Error> {
        let row: Option<(Option<Timestamp>, Option<Timestamp>, bool, Option<Timestamp>)> =
            sqlx::query_as(
                "SELECT j.locked_at, j.redirected_at, j.result_ref IS NOT NULL, \
                     (SELECT MAX(f.created_at) FROM failures f \
                      WHERE f.job_id = j.id AND f.browser_id = j.browser_id) \
                 FROM jobs j WHERE j.id = $1",
            )
            .bind(job_id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(|(locked_at, redirected_at, has_result, last_failure_at)| JobClock {
            locked_at,
            redirected_at,
            has_result,
            last_failure_at,
        }))
    }
}
