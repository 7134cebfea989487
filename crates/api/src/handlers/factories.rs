//! Handlers for the factory-facing `/factories` endpoints.
//!
//! `poll` always answers 200 with a status object: credential rejections
//! and "no match" are normal outcomes for a factory, not HTTP errors.

use axum::extract::State;
use axum::http::Extensions;
use axum::Json;
use serde::{Deserialize, Serialize};
use shotserver_core::types::DbId;

use crate::dispatch::{self, PollInput};
use crate::error::{AppError, AppResult};
use crate::handlers::client_ip;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PollRequest {
    pub factory: String,
    pub crypt: String,
}

/// Flat poll answer. `challenge` is `""` and `options` is `{}` unless
/// `status` is `"OK"`.
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub status: &'static str,
    pub code: &'static str,
    pub job_id: Option<DbId>,
    pub challenge: String,
    pub options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    pub factory: String,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// POST /api/v1/factories/poll
pub async fn poll(
    State(state): State<AppState>,
    extensions: Extensions,
    Json(input): Json<PollRequest>,
) -> AppResult<Json<PollResponse>> {
    let input = PollInput {
        factory: input.factory,
        crypt: input.crypt,
        ip: client_ip(&extensions),
    };
    let outcome = dispatch::poll(&state.pool, &state.dispatch(), &input, chrono::Utc::now()).await?;

    let options = match &outcome.options {
        Some(options) => {
            serde_json::to_value(options).map_err(|e| AppError::InternalError(e.to_string()))?
        }
        None => serde_json::json!({}),
    };

    Ok(Json(PollResponse {
        status: outcome.status.message(),
        code: outcome.status.code(),
        job_id: outcome.job_id,
        challenge: outcome.challenge.unwrap_or_default(),
        options,
    }))
}

/// POST /api/v1/factories/challenge
///
/// First-contact challenge for a factory that holds no nonce yet.
pub async fn challenge(
    State(state): State<AppState>,
    extensions: Extensions,
    Json(input): Json<ChallengeRequest>,
) -> AppResult<Json<DataResponse<ChallengeResponse>>> {
    let ip = client_ip(&extensions);
    let challenge =
        dispatch::challenge(&state.pool, &input.factory, ip.as_deref(), chrono::Utc::now()).await?;
    Ok(Json(DataResponse {
        data: ChallengeResponse { challenge },
    }))
}
