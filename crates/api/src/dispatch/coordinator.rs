//! Poll coordination and the result path.
//!
//! A poll authenticates the factory, then locates, leases and describes the
//! oldest eligible job inside one transaction:
//!
//! ```text
//! BEGIN
//!   find_oldest_eligible   (row locked, SKIP LOCKED)
//!   try_lease              (conditional UPDATE on the job row)
//!   mint_for_job           (upload nonce)
//! COMMIT
//! ```
//!
//! A factory only ever receives a job it holds the lease for.

use shotserver_core::crypt;
use shotserver_core::error::CoreError;
use shotserver_core::matching::EligibilityPredicate;
use shotserver_core::options::JobOptions;
use shotserver_core::poll::PollStatus;
use shotserver_core::types::{DbId, Timestamp};
use shotserver_core::validation::truncate_failure_message;
use shotserver_db::models::factory::Factory;
use shotserver_db::models::lease::{CurrentLease, LeaseOutcome};
use shotserver_db::repositories::{FactoryRepo, FailureRepo, JobRepo, LeaseRepo, NonceRepo};
use sqlx::PgPool;

use super::auth::{self, AuthOutcome, NonceScope};
use super::{DispatchContext, DispatchError};

/// Claim attempts per poll. A lost race excludes that job and tries once more.
const CLAIM_ATTEMPTS: usize = 2;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PollInput {
    pub factory: String,
    pub crypt: String,
    pub ip: Option<String>,
}

/// What a poll hands back. `job_id`, `challenge` and `options` are only set
/// when `status` is [`PollStatus::Ok`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: PollStatus,
    pub job_id: Option<DbId>,
    pub challenge: Option<String>,
    pub options: Option<JobOptions>,
}

impl PollOutcome {
    fn empty(status: PollStatus) -> Self {
        Self {
            status,
            job_id: None,
            challenge: None,
            options: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultInput {
    pub factory: String,
    pub crypt: String,
    pub ip: Option<String>,
    pub result_ref: String,
}

#[derive(Debug, Clone)]
pub struct FailureInput {
    pub factory: String,
    pub crypt: String,
    pub ip: Option<String>,
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// Authenticate a factory and hand it the oldest job it can render.
///
/// Rejections and "no match" are returned as statuses, not errors. Only
/// store failures produce `Err`, and then nothing has been committed.
pub async fn poll(
    pool: &PgPool,
    ctx: &DispatchContext,
    input: &PollInput,
    now: Timestamp,
) -> Result<PollOutcome, sqlx::Error> {
    let outcome = auth::authenticate(
        pool,
        ctx,
        &input.factory,
        &input.crypt,
        input.ip.as_deref(),
        NonceScope::Active,
        now,
    )
    .await?;
    let factory = match outcome {
        AuthOutcome::Accepted(factory) => factory,
        AuthOutcome::Rejected(reason) => return Ok(PollOutcome::empty(reason.into())),
    };

    FactoryRepo::touch_last_poll(pool, factory.id, now).await?;

    let caps = FactoryRepo::capabilities(pool, &factory).await?;
    let mut predicate = EligibilityPredicate::for_factory(&caps);

    for _ in 0..CLAIM_ATTEMPTS {
        if let Some(outcome) = try_claim(pool, ctx, &factory, &mut predicate, input, now).await? {
            return Ok(outcome);
        }
        if predicate.excluded_jobs.is_empty() {
            break;
        }
    }

    tracing::debug!(factory_id = factory.id, "No matching request");
    Ok(PollOutcome::empty(PollStatus::NoMatch))
}

/// One locate-and-lease round.
///
/// Returns `None` when nothing is eligible (leaving `predicate` unchanged)
/// or when the lease was lost (adding the job to the exclusion set).
async fn try_claim(
    pool: &PgPool,
    ctx: &DispatchContext,
    factory: &Factory,
    predicate: &mut EligibilityPredicate,
    input: &PollInput,
    now: Timestamp,
) -> Result<Option<PollOutcome>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(found) = JobRepo::find_oldest_eligible(&mut tx, predicate, &ctx.timeouts, now).await?
    else {
        return Ok(None);
    };
    let job_id = found.job.job_id;

    let outcome = LeaseRepo::try_lease(
        &mut tx,
        job_id,
        factory.id,
        found.browser_id,
        &ctx.timeouts,
        now,
    )
    .await?;

    match outcome {
        LeaseOutcome::Granted(lease) => {
            let nonce =
                NonceRepo::mint_for_job(&mut tx, factory.id, job_id, input.ip.as_deref(), now)
                    .await?;
            tx.commit().await?;

            tracing::info!(
                job_id,
                factory_id = factory.id,
                browser_id = lease.browser_id,
                lease_id = lease.id,
                "Job leased",
            );

            Ok(Some(PollOutcome {
                status: PollStatus::Ok,
                job_id: Some(job_id),
                challenge: Some(crypt::challenge(&factory.salt, &nonce.nonce)),
                options: Some(JobOptions::project(&found.job.requirements())),
            }))
        }
        LeaseOutcome::Denied { holder } => {
            tracing::warn!(job_id, factory_id = factory.id, ?holder, "Lost lease race");
            predicate.exclude(job_id);
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap challenge
// ---------------------------------------------------------------------------

/// Issue a first-contact challenge for a factory that holds no nonce yet.
pub async fn challenge(
    pool: &PgPool,
    factory: &str,
    ip: Option<&str>,
    now: Timestamp,
) -> Result<String, DispatchError> {
    Ok(auth::issue_challenge(pool, factory, ip, now).await??)
}

// ---------------------------------------------------------------------------
// Result path
// ---------------------------------------------------------------------------

/// The factory's browser started loading the page. Returns the website URL.
///
/// Requires the caller's lease to be active.
pub async fn redirect(
    pool: &PgPool,
    ctx: &DispatchContext,
    factory: &str,
    job_id: DbId,
    now: Timestamp,
) -> Result<String, DispatchError> {
    let factory = auth::find_active_factory(pool, factory).await??;
    require_lease(pool, ctx, job_id, factory.id, now).await?;

    if !JobRepo::mark_redirected(pool, job_id, factory.id, &ctx.timeouts, now).await? {
        return Err(lease_error(pool, ctx, job_id, factory.id, now).await);
    }

    let job = JobRepo::find_requirements(pool, job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;

    tracing::info!(job_id, factory_id = factory.id, "Job redirected");
    Ok(job.website_url)
}

/// Attach an uploaded screenshot to a job the caller holds the lease for.
pub async fn submit_result(
    pool: &PgPool,
    ctx: &DispatchContext,
    job_id: DbId,
    input: &ResultInput,
    now: Timestamp,
) -> Result<(), DispatchError> {
    let factory = authenticate_for_job(
        pool,
        ctx,
        &input.factory,
        &input.crypt,
        input.ip.as_deref(),
        job_id,
        now,
    )
    .await?;
    require_lease(pool, ctx, job_id, factory.id, now).await?;

    let attached =
        JobRepo::attach_result(pool, job_id, factory.id, &input.result_ref, &ctx.timeouts, now)
            .await?;
    if !attached {
        return Err(lease_error(pool, ctx, job_id, factory.id, now).await);
    }

    tracing::info!(job_id, factory_id = factory.id, "Result attached");
    Ok(())
}

/// Record that the caller's leased browser could not render the job.
///
/// The (job, browser) pair is kept out of matching for the failure timeout.
/// A report arriving after the lease ran out is still accepted from the
/// last holder, as long as no other factory has claimed the job since.
pub async fn report_failure(
    pool: &PgPool,
    ctx: &DispatchContext,
    job_id: DbId,
    input: &FailureInput,
    now: Timestamp,
) -> Result<(), DispatchError> {
    let factory = authenticate_for_job(
        pool,
        ctx,
        &input.factory,
        &input.crypt,
        input.ip.as_deref(),
        job_id,
        now,
    )
    .await?;
    let lease =
        match LeaseRepo::check_last_holder(pool, job_id, factory.id, &ctx.timeouts, now).await? {
            Ok(lease) => lease,
            Err(err) => {
                tracing::warn!(
                    job_id,
                    factory_id = factory.id,
                    error = %err,
                    "Failure report refused",
                );
                return Err(err.into());
            }
        };
    let browser_id = lease.browser_id.ok_or(CoreError::NotLocked { job_id })?;

    let message = input.message.as_deref().map(truncate_failure_message);
    let failure = FailureRepo::record(
        pool,
        job_id,
        browser_id,
        factory.id,
        message.as_deref(),
        now,
    )
    .await?;

    tracing::info!(
        job_id,
        factory_id = factory.id,
        browser_id,
        failure_id = failure.id,
        "Failure recorded",
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn authenticate_for_job(
    pool: &PgPool,
    ctx: &DispatchContext,
    factory: &str,
    crypt: &str,
    ip: Option<&str>,
    job_id: DbId,
    now: Timestamp,
) -> Result<Factory, DispatchError> {
    match auth::authenticate(pool, ctx, factory, crypt, ip, NonceScope::Job(job_id), now).await? {
        AuthOutcome::Accepted(factory) => Ok(factory),
        AuthOutcome::Rejected(reason) => Err(DispatchError::Rejected(reason)),
    }
}

async fn require_lease(
    pool: &PgPool,
    ctx: &DispatchContext,
    job_id: DbId,
    factory_id: DbId,
    now: Timestamp,
) -> Result<CurrentLease, DispatchError> {
    match LeaseRepo::check_lease(pool, job_id, factory_id, &ctx.timeouts, now).await? {
        Ok(lease) => Ok(lease),
        Err(err) => {
            tracing::warn!(job_id, factory_id, error = %err, "Lease check failed");
            Err(err.into())
        }
    }
}

/// Explain why a conditional update on the job did not apply.
async fn lease_error(
    pool: &PgPool,
    ctx: &DispatchContext,
    job_id: DbId,
    factory_id: DbId,
    now: Timestamp,
) -> DispatchError {
    match require_lease(pool, ctx, job_id, factory_id, now).await {
        Err(err) => err,
        // Still leased by the caller, so the job already has a result.
        Ok(_) => CoreError::Conflict(format!("Job {job_id} already has a result")).into(),
    }
}
