//! Repository for one-time challenge nonces.
//!
//! A nonce is active while unconsumed and younger than the lease timeout.
//! Job-bound nonces are additionally accepted for uploads until spent.
//! Spending one is a conditional update, so it succeeds at most once. A
//! nonce recorded with the caller's address is only accepted from it.

use shotserver_core::crypt::generate_nonce;
use shotserver_core::lease::Timeouts;
use shotserver_core::types::{DbId, Timestamp};
use sqlx::{PgPool, Postgres};

use crate::models::nonce::Nonce;

/// Column list for `nonces` queries.
const COLUMNS: &str = "id, factory_id, job_id, nonce, ip_address, created_at, consumed_at";

/// A nonce issued to a known address only verifies from that address.
/// Either side being unknown (`NULL`) does not restrict.
const IP_MATCHES: &str = "($IP::text IS NULL OR ip_address IS NULL OR ip_address = $IP)";

pub struct NonceRepo;

impl NonceRepo {
    /// Unbound nonces a factory may hold at once.
    pub const MAX_BOOTSTRAP_NONCES: i64 = 3;

    /// Issue a bootstrap nonce not bound to any job.
    ///
    /// At most [`Self::MAX_BOOTSTRAP_NONCES`] unbound nonces stay outstanding per
    /// factory; older ones are consumed in the same transaction.
    pub async fn create(
        pool: &PgPool,
        factory_id: DbId,
        ip_address: Option<&str>,
        now: Timestamp,
    ) -> Result<Nonce, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO nonces (factory_id, job_id, nonce, ip_address, created_at) \
             VALUES ($1, NULL, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let nonce = sqlx::query_as::<_, Nonce>(&query)
            .bind(factory_id)
            .bind(generate_nonce())
            .bind(ip_address)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let superseded = sqlx::query(
            "UPDATE nonces SET consumed_at = $2 \
             WHERE id IN ( \
                 SELECT id FROM nonces \
                 WHERE factory_id = $1 AND job_id IS NULL AND consumed_at IS NULL \
                 ORDER BY created_at DESC, id DESC \
                 OFFSET $3 \
             )",
        )
        .bind(factory_id)
        .bind(now)
        .bind(Self::MAX_BOOTSTRAP_NONCES)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if superseded.rows_affected() > 0 {
            tracing::debug!(
                factory_id,
                superseded = superseded.rows_affected(),
                "Superseded bootstrap nonces"
            );
        }
        Ok(nonce)
    }

    /// Issue the upload nonce for a freshly leased job.
    ///
    /// Older unconsumed job-bound nonces of the same factory are consumed
    /// first, so at most one of them is ever outstanding.
    pub async fn mint_for_job(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        factory_id: DbId,
        job_id: DbId,
        ip_address: Option<&str>,
        now: Timestamp,
    ) -> Result<Nonce, sqlx::Error> {
        sqlx::query(
            "UPDATE nonces SET consumed_at = $2 \
             WHERE factory_id = $1 AND job_id IS NOT NULL AND consumed_at IS NULL",
        )
        .bind(factory_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        let query = format!(
            "INSERT INTO nonces (factory_id, job_id, nonce, ip_address, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Nonce>(&query)
            .bind(factory_id)
            .bind(job_id)
            .bind(generate_nonce())
            .bind(ip_address)
            .bind(now)
            .fetch_one(&mut **tx)
            .await
    }

    /// Every active nonce issued to the factory for `ip_address`, newest first.
    pub async fn list_active(
        pool: &PgPool,
        factory_id: DbId,
        ip_address: Option<&str>,
        timeouts: &Timeouts,
        now: Timestamp,
    ) -> Result<Vec<Nonce>, sqlx::Error> {
        let ip_matches = IP_MATCHES.replace("$IP", "$3");
        let query = format!(
            "SELECT {COLUMNS} FROM nonces \
             WHERE factory_id = $1 AND consumed_at IS NULL AND created_at >= $2 \
             AND {ip_matches} \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Nonce>(&query)
            .bind(factory_id)
            .bind(timeouts.lease_cutoff(now))
            .bind(ip_address)
            .fetch_all(pool)
            .await
    }

    /// Unspent nonces bound to one job, usable from `ip_address`.
    ///
    /// These do not age out here: the lease on the job bounds how long they
    /// are useful, and callers check it separately.
    pub async fn list_unspent_for_job(
        pool: &PgPool,
        factory_id: DbId,
        job_id: DbId,
        ip_address: Option<&str>,
    ) -> Result<Vec<Nonce>, sqlx::Error> {
        let ip_matches = IP_MATCHES.replace("$IP", "$3");
        let query = format!(
            "SELECT {COLUMNS} FROM nonces \
             WHERE factory_id = $1 AND job_id = $2 AND consumed_at IS NULL \
             AND {ip_matches} \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Nonce>(&query)
            .bind(factory_id)
            .bind(job_id)
            .bind(ip_address)
            .fetch_all(pool)
            .await
    }

    /// Spend a nonce. Returns `false` if it was already spent.
    pub async fn consume(
        pool: &PgPool,
        nonce_id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE nonces SET consumed_at = $2 WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(nonce_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
