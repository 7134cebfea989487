//! Route definitions for the `/jobs` result path.

use axum::routing::post;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /{id}/redirect   -> redirect
/// POST   /{id}/result     -> submit_result
/// POST   /{id}/failure    -> report_failure
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/redirect", post(jobs::redirect))
        .route("/{id}/result", post(jobs::submit_result))
        .route("/{id}/failure", post(jobs::report_failure))
}
