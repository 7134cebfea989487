//! Handlers for the `/request-groups` resource.
//!
//! This is the submission side of the queue: a group carries the page and
//! its screen/plugin options, and one job per requested browser. Groups
//! are never edited; they simply expire.

use axum::extract::{Path, Query, State};
use axum::http::{Extensions, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use shotserver_core::error::CoreError;
use shotserver_core::job_state::JobState;
use shotserver_core::types::DbId;
use shotserver_db::models::job::{CreateJob, Job};
use shotserver_db::models::request_group::{CreateRequestGroup, RequestGroup};
use shotserver_db::repositories::{JobRepo, RequestGroupRepo};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::handlers::client_ip;
use crate::response::DataResponse;
use crate::state::AppState;

/// Lifetime of a group when the submitter does not ask for one.
const DEFAULT_EXPIRE_MINUTES: i64 = 30;

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequestGroup {
    #[validate(url)]
    pub website_url: String,
    #[validate(range(min = 1))]
    pub width: Option<i32>,
    #[validate(range(min = 1))]
    pub height: Option<i32>,
    #[validate(range(min = 1))]
    pub bits_per_pixel: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
    pub media: Option<String>,
    /// Minutes until the group stops being dispatched (default 30, max one day).
    #[validate(range(min = 1, max = 1440))]
    pub expire_minutes: Option<i64>,
    #[validate(length(min = 1, max = 100), nested)]
    pub browsers: Vec<RequestedBrowser>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RequestedBrowser {
    pub platform: Option<String>,
    #[validate(length(min = 1))]
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub website: String,
}

#[derive(Debug, Serialize)]
pub struct SubmittedGroup {
    pub group: RequestGroup,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub struct JobWithState {
    #[serde(flatten)]
    pub job: Job,
    pub state: JobState,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GroupDetail {
    pub group: RequestGroup,
    pub pending: bool,
    pub jobs: Vec<JobWithState>,
}

/// POST /api/v1/request-groups
///
/// Insert a group and its jobs atomically. Returns 201; the jobs are
/// dispatchable as soon as this returns.
pub async fn submit(
    State(state): State<AppState>,
    extensions: Extensions,
    Json(input): Json<SubmitRequestGroup>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    if input.browsers.iter().any(|b| b.minor.is_some() && b.major.is_none()) {
        return Err(AppError::Core(CoreError::Validation(
            "A minor version requires a major version".into(),
        )));
    }

    let now = chrono::Utc::now();
    let expire_minutes = input.expire_minutes.unwrap_or(DEFAULT_EXPIRE_MINUTES);
    let group = CreateRequestGroup {
        website_url: input.website_url,
        width: input.width,
        height: input.height,
        bits_per_pixel: input.bits_per_pixel,
        javascript: input.javascript,
        java: input.java,
        flash: input.flash,
        media: input.media,
        submitted_by: None,
        submitter_ip: client_ip(&extensions),
        expires_at: now + chrono::Duration::minutes(expire_minutes),
    };
    let jobs: Vec<CreateJob> = input
        .browsers
        .into_iter()
        .map(|b| CreateJob {
            platform: b.platform,
            browser_group: b.browser_group,
            major: b.major,
            minor: b.minor,
        })
        .collect();

    let (group, jobs) = RequestGroupRepo::create_with_jobs(&state.pool, &group, &jobs, now).await?;

    tracing::info!(
        request_group_id = group.id,
        website_url = %group.website_url,
        job_count = jobs.len(),
        "Request group submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedGroup { group, jobs },
        }),
    ))
}

/// GET /api/v1/request-groups?website=
///
/// Unexpired groups for one website, newest first.
pub async fn list_by_website(
    State(state): State<AppState>,
    Query(params): Query<QueueQuery>,
) -> AppResult<impl IntoResponse> {
    let groups =
        RequestGroupRepo::list_by_website(&state.pool, &params.website, chrono::Utc::now()).await?;
    Ok(Json(DataResponse { data: groups }))
}

/// GET /api/v1/request-groups/{id}
///
/// A group with each job's derived state.
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let group = RequestGroupRepo::find_by_id(&state.pool, group_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "RequestGroup",
            id: group_id,
        }))?;

    let now = chrono::Utc::now();
    let timeouts = state.config.dispatch.timeouts();
    let mut jobs = Vec::new();
    for job in JobRepo::list_by_group(&state.pool, group_id).await? {
        let clock = JobRepo::clock(&state.pool, job.id).await?.unwrap_or_default();
        let job_state = JobState::derive(&clock, &timeouts, now);
        jobs.push(JobWithState {
            job,
            state: job_state,
            label: job_state.label(),
        });
    }
    let pending = RequestGroupRepo::is_pending(&state.pool, group_id, now).await?;

    Ok(Json(DataResponse {
        data: GroupDetail {
            group,
            pending,
            jobs,
        },
    }))
}
