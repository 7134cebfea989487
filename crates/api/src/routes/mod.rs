pub mod factories;
pub mod health;
pub mod jobs;
pub mod request_groups;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /factories/challenge                      bootstrap challenge (POST)
/// /factories/poll                           poll for a job (POST)
///
/// /jobs/{id}/redirect                       mark in progress (POST)
/// /jobs/{id}/result                         attach result (POST)
/// /jobs/{id}/failure                        report failure (POST)
///
/// /request-groups                           submit (POST), queue view (GET ?website=)
/// /request-groups/{id}                      group with job states (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/factories", factories::router())
        .nest("/jobs", jobs::router())
        .nest("/request-groups", request_groups::router())
}
