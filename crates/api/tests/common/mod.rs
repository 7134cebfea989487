#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use shotserver_api::config::{DispatchConfig, ServerConfig};
use shotserver_api::dispatch::{self, DispatchContext, PollInput, PollOutcome};
use shotserver_api::router::build_app_router;
use shotserver_api::state::AppState;
use shotserver_core::crypt::{expected_crypt, password_hash, HashAlgorithm, SALT_LENGTH};
use shotserver_core::types::Timestamp;
use shotserver_db::models::factory::{CreateFactory, CreateFactoryBrowser, Factory};
use shotserver_db::models::job::{CreateJob, Job};
use shotserver_db::models::request_group::{CreateRequestGroup, RequestGroup};
use shotserver_db::repositories::{FactoryRepo, NonceRepo, RequestGroupRepo};
use sqlx::PgPool;
use tower::ServiceExt;

/// Secret shared by every test factory.
pub const SECRET: &str = "s3cret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        dispatch: DispatchConfig::default(),
    }
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn post_ok(app: Router, uri: &str, body: Value) -> Value {
    let response = post_json(app, uri, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// A Linux factory with one Firefox 2.0 browser, 1024x768 at 24 bpp.
pub async fn provision_factory(pool: &PgPool, name: &str) -> Factory {
    let salt: String = name.chars().chain("xxxx".chars()).take(SALT_LENGTH).collect();
    let factory = FactoryRepo::create(
        pool,
        &CreateFactory {
            name: name.to_string(),
            password_hash: password_hash(HashAlgorithm::Md5.hasher(), &salt, SECRET),
            salt,
            platform: "Linux".to_string(),
        },
    )
    .await
    .unwrap();
    FactoryRepo::add_browser(
        pool,
        factory.id,
        &CreateFactoryBrowser {
            browser_group: "Firefox".to_string(),
            major: Some(2),
            minor: Some(0),
            javascript: Some("1.7".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    FactoryRepo::add_screen_size(pool, factory.id, 1024, 768).await.unwrap();
    FactoryRepo::add_color_depth(pool, factory.id, 24).await.unwrap();
    factory
}

/// Answer a `salt + nonce` challenge the way a factory client does.
pub fn answer(challenge: &str, secret: &str) -> String {
    let hasher = HashAlgorithm::Md5.hasher();
    let (salt, nonce) = challenge.split_at(SALT_LENGTH);
    expected_crypt(hasher, &password_hash(hasher, salt, secret), nonce)
}

/// Issue a bootstrap nonce at `now` and return the matching crypt.
pub async fn bootstrap_crypt(pool: &PgPool, factory: &Factory, now: Timestamp) -> String {
    let nonce = NonceRepo::create(pool, factory.id, None, now).await.unwrap();
    answer(&format!("{}{}", factory.salt, nonce.nonce), SECRET)
}

pub async fn submit_job(
    pool: &PgPool,
    url: &str,
    browser_group: &str,
    submitted_at: Timestamp,
) -> (RequestGroup, Job) {
    let (group, mut jobs) = RequestGroupRepo::create_with_jobs(
        pool,
        &CreateRequestGroup {
            website_url: url.to_string(),
            expires_at: submitted_at + Duration::minutes(30),
            ..Default::default()
        },
        &[CreateJob {
            browser_group: browser_group.to_string(),
            ..Default::default()
        }],
        submitted_at,
    )
    .await
    .unwrap();
    (group, jobs.remove(0))
}

/// Poll through the coordinator with a fresh bootstrap nonce.
pub async fn poll_at(pool: &PgPool, factory: &Factory, now: Timestamp) -> PollOutcome {
    let crypt = bootstrap_crypt(pool, factory, now).await;
    let input = PollInput {
        factory: factory.name.clone(),
        crypt,
        ip: Some("127.0.0.1".into()),
    };
    dispatch::poll(pool, &DispatchContext::default(), &input, now)
        .await
        .unwrap()
}
