#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use shotserver_core::crypt::{password_hash, HashAlgorithm};
use shotserver_core::lease::Timeouts;
use shotserver_core::matching::EligibilityPredicate;
use shotserver_core::types::Timestamp;
use shotserver_db::models::factory::{CreateFactory, CreateFactoryBrowser, Factory, FactoryBrowser};
use shotserver_db::models::job::{CreateJob, EligibleJob, Job};
use shotserver_db::models::lease::LeaseOutcome;
use shotserver_db::models::request_group::{CreateRequestGroup, RequestGroup};
use shotserver_db::repositories::{FactoryRepo, JobRepo, LeaseRepo, RequestGroupRepo};
use sqlx::PgPool;

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// A Linux factory with one Firefox 2.0 browser, 1024x768 at 24 bpp.
pub async fn linux_factory(pool: &PgPool, name: &str) -> (Factory, FactoryBrowser) {
    let hasher = HashAlgorithm::Md5.hasher();
    let factory = FactoryRepo::create(
        pool,
        &CreateFactory {
            name: name.to_string(),
            salt: "abcd".to_string(),
            password_hash: password_hash(hasher, "abcd", "secret"),
            platform: "Linux".to_string(),
        },
    )
    .await
    .unwrap();
    let browser = FactoryRepo::add_browser(pool, factory.id, &firefox(2, 0)).await.unwrap();
    FactoryRepo::add_screen_size(pool, factory.id, 1024, 768).await.unwrap();
    FactoryRepo::add_color_depth(pool, factory.id, 24).await.unwrap();
    (factory, browser)
}

pub fn firefox(major: i32, minor: i32) -> CreateFactoryBrowser {
    CreateFactoryBrowser {
        browser_group: "Firefox".to_string(),
        major: Some(major),
        minor: Some(minor),
        javascript: Some("1.7".to_string()),
        ..Default::default()
    }
}

pub fn group(url: &str, expires_at: Timestamp) -> CreateRequestGroup {
    CreateRequestGroup {
        website_url: url.to_string(),
        expires_at,
        ..Default::default()
    }
}

pub fn job(browser_group: &str) -> CreateJob {
    CreateJob {
        browser_group: browser_group.to_string(),
        ..Default::default()
    }
}

/// Submit a one-job group for `browser_group` at `submitted_at`.
pub async fn submit(
    pool: &PgPool,
    url: &str,
    browser_group: &str,
    submitted_at: Timestamp,
) -> (RequestGroup, Job) {
    let (group, mut jobs) = RequestGroupRepo::create_with_jobs(
        pool,
        &group(url, submitted_at + Duration::minutes(30)),
        &[job(browser_group)],
        submitted_at,
    )
    .await
    .unwrap();
    (group, jobs.remove(0))
}

pub async fn predicate(pool: &PgPool, factory: &Factory) -> EligibilityPredicate {
    let caps = FactoryRepo::capabilities(pool, factory).await.unwrap();
    EligibilityPredicate::for_factory(&caps)
}

/// Locate and lease the oldest eligible job in one transaction.
pub async fn claim(
    pool: &PgPool,
    factory: &Factory,
    timeouts: &Timeouts,
    now: Timestamp,
) -> Option<EligibleJob> {
    let predicate = predicate(pool, factory).await;
    let mut tx = pool.begin().await.unwrap();
    let found = JobRepo::find_oldest_eligible(&mut tx, &predicate, timeouts, now)
        .await
        .unwrap()?;
    let outcome = LeaseRepo::try_lease(
        &mut tx,
        found.job.job_id,
        factory.id,
        found.browser_id,
        timeouts,
        now,
    )
    .await
    .unwrap();
    match outcome {
        LeaseOutcome::Granted(_) => {
            tx.commit().await.unwrap();
            Some(found)
        }
        LeaseOutcome::Denied { .. } => None,
    }
}
