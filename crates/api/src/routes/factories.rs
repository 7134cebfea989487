//! Route definitions for the factory-facing `/factories` endpoints.
//!
//! Factories authenticate per request with challenge-response credentials
//! carried in the body; there is no session.

use axum::routing::post;
use axum::Router;

use crate::handlers::factories;
use crate::state::AppState;

/// Routes mounted at `/factories`.
///
/// ```text
/// POST   /challenge       -> challenge
/// POST   /poll            -> poll
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/challenge", post(factories::challenge))
        .route("/poll", post(factories::poll))
}
