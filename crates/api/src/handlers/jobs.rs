//! Handlers for the result path under `/jobs/{id}`.
//!
//! Each call must come from the factory holding the job's active lease,
//! except that the last holder may still report a failure after the lease
//! ran out. Credentials are checked against the caller's address. Lease
//! problems answer 409 (`LEASE_CONFLICT` or `NOT_LOCKED`), credential
//! problems answer 401.

use axum::extract::{Path, State};
use axum::http::{Extensions, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use shotserver_core::types::DbId;
use validator::Validate;

use crate::dispatch::{self, FailureInput, ResultInput};
use crate::error::AppResult;
use crate::handlers::client_ip;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RedirectRequest {
    #[validate(length(min = 1, max = 20))]
    pub factory: String,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub website_url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResultRequest {
    #[validate(length(min = 1, max = 20))]
    pub factory: String,
    #[validate(length(equal = 32))]
    pub crypt: String,
    /// Reference into the screenshot store.
    #[validate(length(min = 1, max = 255))]
    pub result_ref: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FailureRequest {
    #[validate(length(min = 1, max = 20))]
    pub factory: String,
    #[validate(length(equal = 32))]
    pub crypt: String,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

/// POST /api/v1/jobs/{id}/redirect
///
/// Mark the job in progress and return the page to load.
pub async fn redirect(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<RedirectRequest>,
) -> AppResult<Json<DataResponse<RedirectResponse>>> {
    input.validate()?;
    let website_url = dispatch::redirect(
        &state.pool,
        &state.dispatch(),
        &input.factory,
        job_id,
        chrono::Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse {
        data: RedirectResponse { website_url },
    }))
}

/// POST /api/v1/jobs/{id}/result
///
/// Attach the uploaded screenshot. Returns 204 on success.
pub async fn submit_result(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    extensions: Extensions,
    Json(input): Json<ResultRequest>,
) -> AppResult<StatusCode> {
    input.validate()?;
    let input = ResultInput {
        factory: input.factory,
        crypt: input.crypt,
        ip: client_ip(&extensions),
        result_ref: input.result_ref,
    };
    dispatch::submit_result(&state.pool, &state.dispatch(), job_id, &input, chrono::Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/jobs/{id}/failure
///
/// Report that the leased browser could not render the job. Returns 204.
pub async fn report_failure(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    extensions: Extensions,
    Json(input): Json<FailureRequest>,
) -> AppResult<StatusCode> {
    input.validate()?;
    let input = FailureInput {
        factory: input.factory,
        crypt: input.crypt,
        ip: client_ip(&extensions),
        message: input.message,
    };
    dispatch::report_failure(&state.pool, &state.dispatch(), job_id, &input, chrono::Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
