//! Challenge-response authentication of factories.

use shotserver_core::crypt::{self, verify_crypt};
use shotserver_core::poll::AuthRejection;
use shotserver_core::types::{DbId, Timestamp};
use shotserver_core::validation::{validate_crypt, validate_factory_name};
use shotserver_db::models::factory::Factory;
use shotserver_db::models::nonce::Nonce;
use shotserver_db::repositories::{FactoryRepo, NonceRepo};
use sqlx::PgPool;

use super::DispatchContext;

/// Which outstanding nonces a credential may be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceScope {
    /// Any active nonce issued to the factory (polls).
    Active,
    /// Only unspent nonces minted when this job was leased (uploads).
    Job(DbId),
}

/// Result of checking a factory's credentials.
#[derive(Debug)]
pub enum AuthOutcome {
    Accepted(Factory),
    Rejected(AuthRejection),
}

/// Verify `crypt = H(password_hash + nonce)` for one of the factory's
/// nonces and spend that nonce.
///
/// Only nonces issued to `ip` (or to an unknown address) are candidates.
/// Each candidate is compared in constant time. The matching nonce is
/// consumed with a conditional update; if a concurrent request spent it
/// first, this request is rejected.
pub async fn authenticate(
    pool: &PgPool,
    ctx: &DispatchContext,
    name: &str,
    crypt: &str,
    ip: Option<&str>,
    scope: NonceScope,
    now: Timestamp,
) -> Result<AuthOutcome, sqlx::Error> {
    if validate_factory_name(name).is_err() || validate_crypt(crypt).is_err() {
        return Ok(reject(name, AuthRejection::MalformedRequest));
    }

    let factory = match find_active_factory(pool, name).await? {
        Ok(factory) => factory,
        Err(reason) => return Ok(reject(name, reason)),
    };

    let nonces: Vec<Nonce> = match scope {
        NonceScope::Active => {
            NonceRepo::list_active(pool, factory.id, ip, &ctx.timeouts, now).await?
        }
        NonceScope::Job(job_id) => {
            NonceRepo::list_unspent_for_job(pool, factory.id, job_id, ip).await?
        }
    };
    if nonces.is_empty() {
        return Ok(reject(name, AuthRejection::NoActiveNonce));
    }

    let matched = nonces
        .iter()
        .find(|n| verify_crypt(ctx.hasher, &factory.password_hash, &n.nonce, crypt));
    let Some(nonce) = matched else {
        return Ok(reject(name, AuthRejection::PasswordMismatch));
    };

    if !NonceRepo::consume(pool, nonce.id, now).await? {
        return Ok(reject(name, AuthRejection::NoActiveNonce));
    }

    tracing::debug!(factory_id = factory.id, nonce_id = nonce.id, "Factory authenticated");
    Ok(AuthOutcome::Accepted(factory))
}

/// Issue a bootstrap challenge (`salt + nonce`) not bound to any job.
pub async fn issue_challenge(
    pool: &PgPool,
    name: &str,
    ip: Option<&str>,
    now: Timestamp,
) -> Result<Result<String, AuthRejection>, sqlx::Error> {
    if validate_factory_name(name).is_err() {
        return Ok(Err(AuthRejection::MalformedRequest));
    }
    let factory = match find_active_factory(pool, name).await? {
        Ok(factory) => factory,
        Err(reason) => return Ok(Err(reason)),
    };
    let nonce = NonceRepo::create(pool, factory.id, ip, now).await?;
    tracing::info!(factory_id = factory.id, "Challenge issued");
    Ok(Ok(crypt::challenge(&factory.salt, &nonce.nonce)))
}

/// Resolve a factory by name, refusing unknown and deactivated ones.
pub async fn find_active_factory(
    pool: &PgPool,
    name: &str,
) -> Result<Result<Factory, AuthRejection>, sqlx::Error> {
    match FactoryRepo::find_by_name(pool, name).await? {
        None => Ok(Err(AuthRejection::UnknownFactory)),
        Some(factory) if !factory.is_active => Ok(Err(AuthRejection::FactoryInactive)),
        Some(factory) => Ok(Ok(factory)),
    }
}

fn reject(name: &str, reason: AuthRejection) -> AuthOutcome {
    tracing::warn!(factory = %name, code = reason.code(), "Factory credentials rejected");
    AuthOutcome::Rejected(reason)
}
