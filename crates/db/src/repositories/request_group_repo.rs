//! Repository for the `request_groups` table.
//!
//! Groups are the unit of submission. They are inserted once, together with
//! one job per requested browser, and never mutated afterwards.

use shotserver_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{CreateJob, Job};
use crate::models::request_group::{CreateRequestGroup, RequestGroup, RequestGroupSummary};
use crate::repositories::JobRepo;

/// Column list for `request_groups` queries.
const COLUMNS: &str = "\
    id, website_url, width, height, bits_per_pixel, javascript, java, flash, media, \
    submitted_by, submitter_ip, submitted_at, expires_at";

/// Same columns, qualified for joins.
const QUALIFIED_COLUMNS: &str = "\
    g.id, g.website_url, g.width, g.height, g.bits_per_pixel, g.javascript, g.java, \
    g.flash, g.media, g.submitted_by, g.submitter_ip, g.submitted_at, g.expires_at";

pub struct RequestGroupRepo;

impl RequestGroupRepo {
    /// Insert a group submitted at `now`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRequestGroup,
        now: Timestamp,
    ) -> Result<RequestGroup, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let group = Self::insert(&mut tx, input, now).await?;
        tx.commit().await?;
        Ok(group)
    }

    /// Insert a group and all of its jobs in one transaction.
    ///
    /// Once this returns, every job is visible to the next poll.
    pub async fn create_with_jobs(
        pool: &PgPool,
        input: &CreateRequestGroup,
        jobs: &[CreateJob],
        now: Timestamp,
    ) -> Result<(RequestGroup, Vec<Job>), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let group = Self::insert(&mut tx, input, now).await?;
        let mut created = Vec::with_capacity(jobs.len());
        for job in jobs {
            created.push(JobRepo::create_in(&mut tx, group.id, job, now).await?);
        }
        tx.commit().await?;
        Ok((group, created))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RequestGroup>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM request_groups WHERE id = $1");
        sqlx::query_as::<_, RequestGroup>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Unexpired groups for a website, newest first, with job counts.
    pub async fn list_by_website(
        pool: &PgPool,
        website_url: &str,
        now: Timestamp,
    ) -> Result<Vec<RequestGroupSummary>, sqlx::Error> {
        let query = format!(
            "SELECT {QUALIFIED_COLUMNS}, \
                 COUNT(j.id) AS job_count, \
                 COUNT(j.result_ref) AS completed_count \
             FROM request_groups g \
             LEFT JOIN jobs j ON j.request_group_id = g.id \
             WHERE g.website_url = $1 AND g.expires_at >= $2 \
             GROUP BY g.id \
             ORDER BY g.submitted_at DESC, g.id DESC"
        );
        sqlx::query_as::<_, RequestGroupSummary>(&query)
            .bind(website_url)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// True while the group is unexpired and at least one job has no result.
    pub async fn is_pending(
        pool: &PgPool,
        group_id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM request_groups g \
                 JOIN jobs j ON j.request_group_id = g.id \
                 WHERE g.id = $1 AND g.expires_at >= $2 AND j.result_ref IS NULL \
             )",
        )
        .bind(group_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreateRequestGroup,
        now: Timestamp,
    ) -> Result<RequestGroup, sqlx::Error> {
        let query = format!(
            "INSERT INTO request_groups \
                 (website_url, width, height, bits_per_pixel, javascript, java, flash, media, \
                  submitted_by, submitter_ip, submitted_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RequestGroup>(&query)
            .bind(&input.website_url)
            .bind(input.width)
            .bind(input.height)
            .bind(input.bits_per_pixel)
            .bind(&input.javascript)
            .bind(&input.java)
            .bind(&input.flash)
            .bind(&input.media)
            .bind(input.submitted_by)
            .bind(&input.submitter_ip)
            .bind(now)
            .bind(input.expires_at)
            .fetch_one(&mut **tx)
            .await
    }
}
