//! Integration tests for locating and leasing jobs.

mod common;

use assert_matches::assert_matches;
use common::*;
use shotserver_core::lease::Timeouts;
use shotserver_core::matching::{Condition, IntColumn};
use shotserver_db::models::job::CreateJob;
use shotserver_db::models::lease::LeaseOutcome;
use shotserver_db::models::request_group::CreateRequestGroup;
use shotserver_db::repositories::{FactoryRepo, JobRepo, LeaseRepo, RequestGroupRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn oldest_group_is_claimed_first(pool: PgPool) {
    let (factory, _) = linux_factory(&pool, "linux-1").await;
    let (_, newer) = submit(&pool, "http://b.example/", "Firefox", t0() + secs(10)).await;
    let (_, older) = submit(&pool, "http://a.example/", "Firefox", t0()).await;

    let now = t0() + secs(20);
    let first = claim(&pool, &factory, &Timeouts::default(), now).await.unwrap();
    assert_eq!(first.job.job_id, older.id);
    assert_eq!(first.job.website_url, "http://a.example/");

    let second = claim(&pool, &factory, &Timeouts::default(), now).await.unwrap();
    assert_eq!(second.job.job_id, newer.id);

    assert!(claim(&pool, &factory, &Timeouts::default(), now).await.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn equal_submission_times_break_ties_by_job_id(pool: PgPool) {
    let (factory, _) = linux_factory(&pool, "linux-1").await;
    let (_, jobs) = RequestGroupRepo::create_with_jobs(
        &pool,
        &group("http://a.example/", t0() + secs(600)),
        &[job("Firefox"), job("Firefox")],
        t0(),
    )
    .await
    .unwrap();

    let first = claim(&pool, &factory, &Timeouts::default(), t0()).await.unwrap();
    assert_eq!(first.job.job_id, jobs[0].id.min(jobs[1].id));
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn committed_job_is_immediately_visible(pool: PgPool) {
    let (factory, browser) = linux_factory(&pool, "linux-1").await;
    assert!(claim(&pool, &factory, &Timeouts::default(), t0()).await.is_none());

    let (_, job) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let claimed = claim(&pool, &factory, &Timeouts::default(), t0()).await.unwrap();
    assert_eq!(claimed.job.job_id, job.id);
    assert_eq!(claimed.browser_id, browser.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unsupported_options_do_not_match(pool: PgPool) {
    let (factory, _) = linux_factory(&pool, "linux-1").await;
    let timeouts = Timeouts::default();

    let wide = CreateRequestGroup {
        width: Some(1600),
        ..group("http://wide.example/", t0() + secs(600))
    };
    RequestGroupRepo::create_with_jobs(&pool, &wide, &[job("Firefox")], t0())
        .await
        .unwrap();

    let mac = CreateJob {
        platform: Some("Mac OS".into()),
        ..job("Firefox")
    };
    let mac_group = group("http://mac.example/", t0() + secs(600));
    RequestGroupRepo::create_with_jobs(&pool, &mac_group, &[mac], t0())
        .await
        .unwrap();

    let old_firefox = CreateJob {
        major: Some(1),
        ..job("Firefox")
    };
    RequestGroupRepo::create_with_jobs(
        &pool,
        &group("http://old.example/", t0() + secs(600)),
        &[old_firefox, job("Opera")],
        t0(),
    )
    .await
    .unwrap();

    assert!(claim(&pool, &factory, &timeouts, t0()).await.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn supported_options_match(pool: PgPool) {
    let (factory, _) = linux_factory(&pool, "linux-1").await;
    let input = CreateRequestGroup {
        width: Some(1024),
        bits_per_pixel: Some(24),
        javascript: Some("1.7".into()),
        ..group("http://a.example/", t0() + secs(600))
    };
    let linux_ff2 = CreateJob {
        platform: Some("Linux".into()),
        major: Some(2),
        minor: Some(0),
        ..job("Firefox")
    };
    RequestGroupRepo::create_with_jobs(&pool, &input, &[linux_ff2], t0())
        .await
        .unwrap();

    let claimed = claim(&pool, &factory, &Timeouts::default(), t0()).await.unwrap();
    let options = JobRepo::find_options(&pool, claimed.job.job_id).await.unwrap().unwrap();
    assert_eq!(options.browser, "Firefox 2.0");
    assert_eq!(options.width, 1024);
    assert_eq!(options.bpp, 24);
    assert_eq!(options.js, "1.7");
    assert_eq!(options.flash, "");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn media_player_must_be_installed(pool: PgPool) {
    let (factory, _) = linux_factory(&pool, "linux-1").await;
    let with_media = CreateRequestGroup {
        media: Some("vlc".into()),
        ..group("http://video.example/", t0() + secs(600))
    };
    RequestGroupRepo::create_with_jobs(&pool, &with_media, &[job("Firefox")], t0())
        .await
        .unwrap();

    assert!(claim(&pool, &factory, &Timeouts::default(), t0()).await.is_none());

    FactoryRepo::add_media(&pool, factory.id, "vlc").await.unwrap();
    FactoryRepo::add_media(&pool, factory.id, "vlc").await.unwrap();

    let claimed = claim(&pool, &factory, &Timeouts::default(), t0()).await.unwrap();
    let options = JobRepo::find_options(&pool, claimed.job.job_id).await.unwrap().unwrap();
    assert_eq!(options.media, "vlc");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn extra_conditions_narrow_the_predicate(pool: PgPool) {
    let (factory, _) = linux_factory(&pool, "linux-1").await;
    let input = CreateRequestGroup {
        width: Some(1024),
        ..group("http://a.example/", t0() + secs(600))
    };
    RequestGroupRepo::create_with_jobs(&pool, &input, &[job("Firefox")], t0())
        .await
        .unwrap();

    let predicate = predicate(&pool, &factory).await.with(Condition::IntIn {
        column: IntColumn::Width,
        values: vec![800],
    });
    let mut tx = pool.begin().await.unwrap();
    let found = JobRepo::find_oldest_eligible(&mut tx, &predicate, &Timeouts::default(), t0())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_groups_are_never_dispatched(pool: PgPool) {
    let (factory, _) = linux_factory(&pool, "linux-1").await;
    RequestGroupRepo::create_with_jobs(
        &pool,
        &group("http://a.example/", t0() + secs(60)),
        &[job("Firefox")],
        t0(),
    )
    .await
    .unwrap();

    let timeouts = Timeouts::default();
    assert!(claim(&pool, &factory, &timeouts, t0() + secs(61)).await.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn inactive_browsers_are_ignored(pool: PgPool) {
    let (factory, browser) = linux_factory(&pool, "linux-1").await;
    sqlx::query("UPDATE factory_browsers SET is_active = false WHERE id = $1")
        .bind(browser.id)
        .execute(&pool)
        .await
        .unwrap();
    submit(&pool, "http://a.example/", "Firefox", t0()).await;

    assert!(claim(&pool, &factory, &Timeouts::default(), t0()).await.is_none());
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn active_lease_excludes_other_factories_until_it_expires(pool: PgPool) {
    let (a, _) = linux_factory(&pool, "linux-a").await;
    let (b, _) = linux_factory(&pool, "linux-b").await;
    let (_, job) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let timeouts = Timeouts::default();

    assert!(claim(&pool, &a, &timeouts, t0()).await.is_some());
    assert!(claim(&pool, &b, &timeouts, t0() + secs(180)).await.is_none());

    let reclaimed = claim(&pool, &b, &timeouts, t0() + secs(181)).await.unwrap();
    assert_eq!(reclaimed.job.job_id, job.id);

    let history = LeaseRepo::list_for_job(&pool, job.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].factory_id, b.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn try_lease_is_denied_while_lease_is_active(pool: PgPool) {
    let (a, a_browser) = linux_factory(&pool, "linux-a").await;
    let (b, b_browser) = linux_factory(&pool, "linux-b").await;
    let (_, job) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let timeouts = Timeouts::default();

    let mut tx = pool.begin().await.unwrap();
    let first = LeaseRepo::try_lease(&mut tx, job.id, a.id, a_browser.id, &timeouts, t0())
        .await
        .unwrap();
    assert_matches!(first, LeaseOutcome::Granted(lease) if lease.factory_id == a.id);
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let later = t0() + secs(5);
    let second = LeaseRepo::try_lease(&mut tx, job.id, b.id, b_browser.id, &timeouts, later)
        .await
        .unwrap();
    assert_matches!(second, LeaseOutcome::Denied { holder: Some(id) } if id == a.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn lease_validity_follows_the_timeout(pool: PgPool) {
    let (a, _) = linux_factory(&pool, "linux-a").await;
    let (b, _) = linux_factory(&pool, "linux-b").await;
    let (_, job) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let timeouts = Timeouts::default();
    claim(&pool, &a, &timeouts, t0()).await.unwrap();

    let cases = [
        (a.id, t0() + secs(180), true),
        (a.id, t0() + secs(181), false),
        (b.id, t0(), false),
    ];
    for (factory_id, now, expected) in cases {
        let valid = LeaseRepo::is_lease_valid(&pool, job.id, factory_id, &timeouts, now)
            .await
            .unwrap();
        assert_eq!(valid, expected);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn check_lease_explains_refusals(pool: PgPool) {
    use shotserver_core::error::CoreError;

    let (a, _) = linux_factory(&pool, "linux-a").await;
    let (b, _) = linux_factory(&pool, "linux-b").await;
    let (_, job) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let timeouts = Timeouts::default();

    let never = LeaseRepo::check_lease(&pool, job.id, a.id, &timeouts, t0()).await.unwrap();
    assert_matches!(never, Err(CoreError::NotLocked { .. }));

    claim(&pool, &a, &timeouts, t0()).await.unwrap();
    let held = LeaseRepo::check_lease(&pool, job.id, a.id, &timeouts, t0()).await.unwrap();
    assert_matches!(held, Ok(_));

    let other = LeaseRepo::check_lease(&pool, job.id, b.id, &timeouts, t0()).await.unwrap();
    assert_matches!(
        other,
        Err(CoreError::LeaseConflict { holder: Some(name), .. }) if name == "linux-a"
    );

    let missing = LeaseRepo::check_lease(&pool, job.id + 1000, a.id, &timeouts, t0())
        .await
        .unwrap();
    assert_matches!(missing, Err(CoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_claim_skips_the_locked_job(pool: PgPool) {
    let (a, _) = linux_factory(&pool, "linux-a").await;
    let (b, _) = linux_factory(&pool, "linux-b").await;
    let (_, first) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let (_, second) = submit(&pool, "http://b.example/", "Firefox", t0() + secs(1)).await;
    let timeouts = Timeouts::default();

    let pred_a = predicate(&pool, &a).await;
    let pred_b = predicate(&pool, &b).await;

    let mut tx_a = pool.begin().await.unwrap();
    let found_a = JobRepo::find_oldest_eligible(&mut tx_a, &pred_a, &timeouts, t0())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found_a.job.job_id, first.id);

    // While A holds the row lock, B must move on instead of waiting.
    let mut tx_b = pool.begin().await.unwrap();
    let found_b = JobRepo::find_oldest_eligible(&mut tx_b, &pred_b, &timeouts, t0())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found_b.job.job_id, second.id);
}

// ---------------------------------------------------------------------------
// Results and redirects
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn result_requires_active_lease_and_removes_job_from_matching(pool: PgPool) {
    let (a, _) = linux_factory(&pool, "linux-a").await;
    let (b, _) = linux_factory(&pool, "linux-b").await;
    let (group, job) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let timeouts = Timeouts::default();
    claim(&pool, &a, &timeouts, t0()).await.unwrap();

    let by_other = JobRepo::attach_result(&pool, job.id, b.id, "shot-1", &timeouts, t0())
        .await
        .unwrap();
    assert!(!by_other);
    assert!(JobRepo::mark_redirected(&pool, job.id, a.id, &timeouts, t0() + secs(5))
        .await
        .unwrap());
    let first = JobRepo::attach_result(&pool, job.id, a.id, "shot-1", &timeouts, t0() + secs(10))
        .await
        .unwrap();
    assert!(first);
    let second = JobRepo::attach_result(&pool, job.id, a.id, "shot-2", &timeouts, t0() + secs(11))
        .await
        .unwrap();
    assert!(!second);

    let stored = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(stored.result_ref.as_deref(), Some("shot-1"));
    assert!(!RequestGroupRepo::is_pending(&pool, group.id, t0() + secs(20)).await.unwrap());

    // Even after the lease lapses a completed job is never handed out again.
    assert!(claim(&pool, &b, &timeouts, t0() + secs(600)).await.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn late_result_after_expiry_is_rejected(pool: PgPool) {
    let (a, _) = linux_factory(&pool, "linux-a").await;
    let (_, job) = submit(&pool, "http://a.example/", "Firefox", t0()).await;
    let timeouts = Timeouts::default();
    claim(&pool, &a, &timeouts, t0()).await.unwrap();

    let late = t0() + secs(181);
    assert!(!JobRepo::attach_result(&pool, job.id, a.id, "shot", &timeouts, late).await.unwrap());
    assert!(!JobRepo::mark_redirected(&pool, job.id, a.id, &timeouts, late).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn factory_provisioning_rejects_duplicate_names(pool: PgPool) {
    linux_factory(&pool, "linux-a").await;
    let err = FactoryRepo::create(
        &pool,
        &shotserver_db::models::factory::CreateFactory {
            name: "linux-a".into(),
            salt: "wxyz".into(),
            password_hash: "0".repeat(32),
            platform: "Linux".into(),
        },
    )
    .await
    .unwrap_err();
    let constraint = err.as_database_error().and_then(|e| e.constraint().map(str::to_string));
    assert_eq!(constraint.as_deref(), Some("uq_factories_name"));
}
