//! Route definitions for the `/request-groups` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::request_groups;
use crate::state::AppState;

/// Routes mounted at `/request-groups`.
///
/// ```text
/// GET    /?website=       -> list_by_website
/// POST   /                -> submit
/// GET    /{id}            -> get_group
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(request_groups::list_by_website).post(request_groups::submit),
        )
        .route("/{id}", get(request_groups::get_group))
}
